use crate::token::TokenError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("{resource} not found with id: '{id}'")]
    NotFound { resource: &'static str, id: i64 },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn reading_not_found(id: i64) -> Self {
        Error::NotFound {
            resource: "Reading",
            id,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
