//! Transfer engine boundary for tandem
//!
//! This crate defines the seam between the reconciliation engine and the
//! external transfer engine that actually moves bytes:
//! - Listing records ([`Entry`]) and tree roots ([`Endpoint`])
//! - The validated remote identifier ([`RemoteSpec`])
//! - The [`TransferProvider`] capability (list/copy/delete)
//! - A subprocess adapter for an rclone-compatible binary
//! - An in-memory provider for tests

pub mod command;
pub mod entry;
pub mod errors;
pub mod memory;
pub mod provider;
pub mod remote;

pub use command::CommandProvider;
pub use entry::{Entry, EntryKind};
pub use errors::{Result, TransferError};
pub use memory::MemoryProvider;
pub use provider::{Endpoint, TransferProvider};
pub use remote::RemoteSpec;
