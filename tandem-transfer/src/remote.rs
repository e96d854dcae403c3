//! Validated remote identifier
//!
//! A remote root is written `name:` or `name:some/path`. The name must
//! refer to a remote the transfer engine knows about; the path part is
//! relative to that remote's root. Parsing happens once at the boundary
//! so malformed input is rejected before any tree is touched.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, TransferError};

/// A parsed `name:path` remote root
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteSpec {
    name: String,
    path: String,
}

impl RemoteSpec {
    /// Parse a `name:` or `name:path` string.
    ///
    /// The name may contain alphanumerics, `_`, and `-`. The path part is
    /// stored without leading or trailing slashes.
    pub fn parse(input: &str) -> Result<Self> {
        let (name, path) = input
            .split_once(':')
            .ok_or_else(|| TransferError::InvalidRemote(format!("missing ':' in {input:?}")))?;

        if name.is_empty() {
            return Err(TransferError::InvalidRemote(format!(
                "empty remote name in {input:?}"
            )));
        }
        if let Some(bad) = name
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '_' && *c != '-')
        {
            return Err(TransferError::InvalidRemote(format!(
                "invalid character {bad:?} in remote name {name:?}"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            path: path.trim_matches('/').to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Root string understood by the transfer engine, e.g. `gdrive:backup`
    pub fn root(&self) -> String {
        format!("{}:{}", self.name, self.path)
    }

    /// Join a tree-relative path onto this root
    pub fn join(&self, rel: &str) -> String {
        if self.path.is_empty() {
            format!("{}:{}", self.name, rel)
        } else {
            format!("{}:{}/{}", self.name, self.path, rel)
        }
    }
}

impl fmt::Display for RemoteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root())
    }
}
