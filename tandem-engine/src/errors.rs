//! Error types for the reconciliation engine

use thiserror::Error;

use tandem_transfer::TransferError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Cannot access {endpoint}: {reason}")]
    Access { endpoint: String, reason: String },

    #[error("Access marker {marker:?} not found under {endpoint}; tree may not be mounted")]
    AccessMarkerMissing { marker: String, endpoint: String },

    #[error("Duplicate path in listing for {endpoint}: {path}")]
    DuplicatePath { endpoint: String, path: String },

    #[error("No baseline for this pair; run with first-sync to establish one")]
    BaselineMissing,

    #[error(
        "Excessive deletions: {deletes} of {total} baseline entries \
         ({percent:.1}% > {max_percent:.1}%); rerun with force to override"
    )]
    ExcessiveDeletions {
        deletes: usize,
        total: usize,
        percent: f64,
        max_percent: f64,
    },

    #[error("{failed} of {total} transfer actions failed")]
    ApplyFailed { failed: usize, total: usize },

    #[error("Lock error: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
