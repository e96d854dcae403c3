//! Tree snapshotting
//!
//! Turns a provider listing into a [`Listing`], applying exclusion
//! patterns and, when asked, verifying the liveness marker. A tree that
//! failed to mount looks exactly like a tree where everything was
//! deleted; the marker check is what tells them apart.

use std::sync::Arc;

use tracing::{debug, trace};

use tandem_transfer::{Endpoint, TransferProvider};

use crate::errors::{EngineError, Result};
use crate::listing::Listing;

/// Default liveness marker file name for access-checked runs
pub const DEFAULT_ACCESS_MARKER: &str = "TANDEM_TEST";

/// Builds a [`Listing`] for one tree root
pub struct Snapshotter {
    provider: Arc<dyn TransferProvider>,
    exclude_patterns: Vec<String>,
    check_access: bool,
    access_marker: String,
}

impl Snapshotter {
    pub fn new(
        provider: Arc<dyn TransferProvider>,
        exclude_patterns: Vec<String>,
        check_access: bool,
        access_marker: String,
    ) -> Self {
        Self {
            provider,
            exclude_patterns,
            check_access,
            access_marker,
        }
    }

    /// Enumerate `root` into a listing.
    ///
    /// Fails when the root is unreachable, when the provider reports the
    /// same path twice, or when access checking finds no marker file.
    pub async fn snapshot(&self, root: &Endpoint) -> Result<Listing> {
        let raw = self
            .provider
            .list(root)
            .await
            .map_err(|e| EngineError::Access {
                endpoint: root.to_string(),
                reason: e.to_string(),
            })?;

        let mut listing = Listing::new();
        for entry in raw {
            if self.is_excluded(&entry.path) {
                trace!("excluded {}", entry.path);
                continue;
            }
            let path = entry.path.clone();
            if listing.insert(entry).is_some() {
                return Err(EngineError::DuplicatePath {
                    endpoint: root.to_string(),
                    path,
                });
            }
        }

        if self.check_access && !listing.has_file_named(&self.access_marker) {
            return Err(EngineError::AccessMarkerMissing {
                marker: self.access_marker.clone(),
                endpoint: root.to_string(),
            });
        }

        debug!(
            "snapshot of {root}: {} entries ({} files)",
            listing.len(),
            listing.file_count()
        );
        Ok(listing)
    }

    /// Check a path against the exclusion patterns; patterns match the
    /// whole relative path or just the file name
    fn is_excluded(&self, path: &str) -> bool {
        let name = path.rsplit('/').next().unwrap_or(path);
        for pattern in &self.exclude_patterns {
            if pattern.contains('*') {
                if glob_match(pattern, path) || glob_match(pattern, name) {
                    return true;
                }
            } else if path == pattern || name == pattern {
                return true;
            }
        }
        false
    }
}

/// Simple glob pattern matching for exclusion patterns
fn glob_match(pattern: &str, name: &str) -> bool {
    if let Some(suffix) = pattern.strip_prefix('*') {
        return name.ends_with(suffix);
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return name.starts_with(prefix);
    }
    pattern == name
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;
    use tandem_transfer::{Entry, MemoryProvider};

    fn entry(path: &str) -> Entry {
        Entry::file(path, 8, Utc.timestamp_opt(1_700_000_000, 0).unwrap())
    }

    fn local() -> Endpoint {
        Endpoint::Local(PathBuf::from("/data"))
    }

    async fn provider_with(entries: Vec<Entry>) -> Arc<MemoryProvider> {
        let provider = Arc::new(MemoryProvider::new());
        provider.seed(&local(), entries).await;
        provider
    }

    #[tokio::test]
    async fn test_snapshot_applies_exclusions() {
        let provider =
            provider_with(vec![entry("keep.txt"), entry("skip.tmp"), entry(".git")]).await;
        let snapshotter = Snapshotter::new(
            provider,
            vec!["*.tmp".to_string(), ".git".to_string()],
            false,
            DEFAULT_ACCESS_MARKER.to_string(),
        );

        let listing = snapshotter.snapshot(&local()).await.unwrap();
        assert_eq!(listing.len(), 1);
        assert!(listing.contains("keep.txt"));
    }

    #[tokio::test]
    async fn test_exclusion_matches_file_name_anywhere() {
        let provider = provider_with(vec![entry("src/thumbs.db"), entry("src/main.rs")]).await;
        let snapshotter = Snapshotter::new(
            provider,
            vec!["thumbs.db".to_string()],
            false,
            DEFAULT_ACCESS_MARKER.to_string(),
        );

        let listing = snapshotter.snapshot(&local()).await.unwrap();
        assert_eq!(listing.len(), 1);
        assert!(listing.contains("src/main.rs"));
    }

    #[tokio::test]
    async fn test_access_marker_enforced() {
        let provider = provider_with(vec![entry("file.txt")]).await;
        let snapshotter = Snapshotter::new(
            provider.clone(),
            Vec::new(),
            true,
            DEFAULT_ACCESS_MARKER.to_string(),
        );

        let err = snapshotter.snapshot(&local()).await;
        assert!(matches!(err, Err(EngineError::AccessMarkerMissing { .. })));

        provider.insert(&local(), entry("sub/TANDEM_TEST")).await;
        assert!(snapshotter.snapshot(&local()).await.is_ok());
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*.tmp", "x.tmp"));
        assert!(glob_match("cache*", "cache-2024"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("*.tmp", "x.txt"));
    }
}
