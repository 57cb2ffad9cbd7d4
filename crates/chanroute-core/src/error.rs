//! Error types for ChanRoute Core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid channel: {0}")]
    InvalidChannel(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
