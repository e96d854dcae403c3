//! Tree listings
//!
//! A [`Listing`] is the point-in-time snapshot one snapshotter pass
//! produces: relative path mapped to entry metadata, with deterministic
//! iteration order. It is immutable once a run's diff has consumed it,
//! except for the copy written back as the new baseline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use tandem_transfer::Entry;

/// Point-in-time snapshot of a tree's entries, keyed by relative path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    entries: BTreeMap<String, Entry>,
}

impl Listing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, returning any entry previously stored at its path
    pub fn insert(&mut self, entry: Entry) -> Option<Entry> {
        self.entries.insert(entry.path.clone(), entry)
    }

    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.entries.get(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<Entry> {
        self.entries.remove(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Entry)> {
        self.entries.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Number of file entries (directories are bookkeeping only)
    pub fn file_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_file()).count()
    }

    /// Whether any file entry's final path component equals `name`
    pub fn has_file_named(&self, name: &str) -> bool {
        self.entries
            .values()
            .any(|e| e.is_file() && e.file_name() == name)
    }
}

impl FromIterator<Entry> for Listing {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        let mut listing = Listing::new();
        for entry in iter {
            listing.insert(entry);
        }
        listing
    }
}
