use crate::errors::ReelError;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Disk-backed store for uploaded profile pictures.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ReelError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `bytes` under a fresh randomized name and returns that name.
    ///
    /// The stored name is `<uuid-hex>_<original basename>`; the original name
    /// is kept so the file stays recognizable. No extension or content-type
    /// validation is performed.
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<String, ReelError> {
        let base = Path::new(original_name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload");
        let stored = format!("{}_{}", Uuid::new_v4().simple(), base);
        tokio::fs::write(self.dir.join(&stored), bytes).await?;
        Ok(stored)
    }
}
