use crate::errors::ReelError;
use crate::settings::Auth;
use base64ct::{Base64UrlUnpadded, Encoding};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;

/// Issues and verifies the bearer tokens handed out by /api/auth.
///
/// Tokens are HS256 JWTs whose subject is the user id. The signing secret
/// comes from configuration, or is generated once and persisted so tokens
/// survive restarts.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
    ttl_secs: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

impl TokenIssuer {
    pub fn new(cfg: &Auth) -> Result<Self, ReelError> {
        let secret = match &cfg.token_secret {
            Some(s) => s.clone(),
            None => load_or_generate_secret(cfg)?,
        };

        Ok(Self {
            encoding: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            ttl_secs: cfg.token_ttl_secs,
        })
    }

    pub fn issue(&self, user_id: i32) -> Result<String, ReelError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + self.ttl_secs,
        };
        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding)?;
        Ok(token)
    }

    /// Returns the user id the token was issued for. Fails on bad signatures,
    /// garbled claims, and expired tokens.
    pub fn verify(&self, token: &str) -> Result<i32, ReelError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::default())?;
        data.claims
            .sub
            .parse::<i32>()
            .map_err(|_| ReelError::Token("malformed subject claim".to_string()))
    }
}

fn load_or_generate_secret(cfg: &Auth) -> Result<String, ReelError> {
    if cfg.secret_path.exists() {
        let s = fs::read_to_string(&cfg.secret_path)?;
        return Ok(s.trim().to_string());
    }

    if let Some(parent) = cfg.secret_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let secret = Base64UrlUnpadded::encode_string(&bytes);
    fs::write(&cfg.secret_path, &secret)?;
    Ok(secret)
}
