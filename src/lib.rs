//! Tandem workspace root
//!
//! This crate serves as the root of the tandem workspace and carries the
//! integration tests that exercise the reconciliation engine end to end
//! through the transfer boundary.

pub use tandem_engine as engine;
pub use tandem_transfer as transfer;
