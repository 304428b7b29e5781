// ShrimpScale Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShrimpScaleError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Password hash error: {0}")]
    PasswordHash(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for ShrimpScaleError {
    fn from(err: anyhow::Error) -> Self {
        ShrimpScaleError::Other(err.to_string())
    }
}

impl From<bcrypt::BcryptError> for ShrimpScaleError {
    fn from(err: bcrypt::BcryptError) -> Self {
        ShrimpScaleError::PasswordHash(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ShrimpScaleError>;
