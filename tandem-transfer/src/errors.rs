//! Error types for transfer operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid remote: {0}")]
    InvalidRemote(String),

    #[error("Transfer engine exited with status {status}: {stderr}")]
    CommandFailed { status: i32, stderr: String },

    #[error("Failed to parse listing output: {0}")]
    ListingParse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Injected failure: {0}")]
    Injected(String),
}

pub type Result<T> = std::result::Result<T, TransferError>;
