use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ReelError {
    #[error("I/O error: {0}")]
    #[diagnostic(code(reelmark::io))]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    #[diagnostic(code(reelmark::config))]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    #[diagnostic(code(reelmark::db))]
    Db(#[from] sea_orm::DbErr),

    #[error("Token error: {0}")]
    #[diagnostic(code(reelmark::token))]
    Token(String),

    #[error("{0}")]
    #[diagnostic(code(reelmark::other))]
    Other(String),
}

impl From<jsonwebtoken::errors::Error> for ReelError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        ReelError::Token(value.to_string())
    }
}
