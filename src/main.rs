use clap::Parser;
use miette::Result;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use reelmark::{identity, settings, storage, tokens, uploads, web};

#[derive(Parser, Debug)]
#[command(name = "reelmark", version, about = "Movie favorites API server")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = settings::Settings::load(&cli.config)?;
    tracing::info!(?settings, "Loaded configuration");

    // init storage (database, migrated on startup)
    let db = storage::init(&settings.database).await?;

    // token issuer (loads or generates the signing secret)
    let tokens = tokens::TokenIssuer::new(&settings.auth)?;

    // upload directory
    let files = uploads::FileStore::new(&settings.uploads.dir)?;

    // The shipped verifier matches username+email only; there is no password
    // in this system.
    let verifier = Arc::new(identity::UsernameMatch);

    // start web server
    web::serve(settings, db, tokens, verifier, files).await?;
    Ok(())
}
