//! Error types for GatiNav

use thiserror::Error;

/// GatiNav error type
#[derive(Error, Debug)]
pub enum GatiError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Policy error: {0}")]
    Policy(String),

    #[error("Thread error: {0}")]
    Thread(String),
}

impl From<toml::de::Error> for GatiError {
    fn from(e: toml::de::Error) -> Self {
        GatiError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GatiError>;
