//! The transfer capability the reconciliation engine drives
//!
//! All data movement goes through [`TransferProvider`], so the engine can
//! be exercised against an in-memory implementation with no network or
//! filesystem access, and the real external engine stays a black box.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::entry::Entry;
use crate::errors::Result;
use crate::remote::RemoteSpec;

/// A tree root addressable by provider operations
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// A directory on the local filesystem
    Local(PathBuf),
    /// A root on a configured remote
    Remote(RemoteSpec),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Local(path) => write!(f, "{}", path.display()),
            Endpoint::Remote(spec) => write!(f, "{spec}"),
        }
    }
}

/// Operations the external transfer engine performs on our behalf.
///
/// Implementations must keep `copy` metadata-preserving (size and mtime
/// survive the transfer) and `delete` idempotent: deleting a path that is
/// already gone is success, so a re-applied action never errors.
#[async_trait]
pub trait TransferProvider: Send + Sync {
    /// Enumerate every entry under the root, recursively
    async fn list(&self, root: &Endpoint) -> Result<Vec<Entry>>;

    /// Copy the file at tree-relative `path` from `src` to `dst`,
    /// creating parent directories and overwriting any existing file
    async fn copy(&self, src: &Endpoint, dst: &Endpoint, path: &str) -> Result<()>;

    /// Delete the file at tree-relative `path` under `root`
    async fn delete(&self, root: &Endpoint, path: &str) -> Result<()>;
}
