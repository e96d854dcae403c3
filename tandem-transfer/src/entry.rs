//! Listing records produced by enumerating a tree

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a listed entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
}

/// A single entry in a tree listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Tree-relative path, `/`-separated
    pub path: String,
    /// Size in bytes (0 for directories)
    pub size: u64,
    /// Modification time
    pub modified_at: DateTime<Utc>,
    /// File or directory
    pub kind: EntryKind,
}

impl Entry {
    /// Create a file entry
    pub fn file(path: impl Into<String>, size: u64, modified_at: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            size,
            modified_at,
            kind: EntryKind::File,
        }
    }

    /// Create a directory entry
    pub fn directory(path: impl Into<String>, modified_at: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            size: 0,
            modified_at,
            kind: EntryKind::Directory,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Final path component
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Metadata equality used for change detection: size, mtime, and kind.
    /// No content hashing is assumed.
    pub fn same_metadata(&self, other: &Entry) -> bool {
        self.kind == other.kind && self.size == other.size && self.modified_at == other.modified_at
    }
}
