//! Baseline persistence
//!
//! The baseline is the listing pair accepted at the end of the last
//! successful run, the reference point for three-way diffing. It lives
//! as one JSON file per side under the state directory, keyed by the
//! normalized (remote, local) pair, and is only ever written after a
//! fully successful apply. On a critical failure the files are renamed
//! with an error suffix instead of deleted, so the evidence survives and
//! the next run cannot silently continue from a bad reference.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};

use tandem_transfer::RemoteSpec;

use crate::errors::Result;
use crate::listing::Listing;

/// Suffix appended to quarantined baseline files
const QUARANTINE_SUFFIX: &str = ".error";

/// The last successfully reconciled listing pair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub local: Listing,
    pub remote: Listing,
}

impl Baseline {
    /// Number of distinct paths across both sides
    pub fn entry_count(&self) -> usize {
        let mut paths: std::collections::BTreeSet<&String> = self.local.paths().collect();
        paths.extend(self.remote.paths());
        paths.len()
    }
}

/// Deterministic file-name key for a (remote, local) pair.
///
/// Separators and the remote's colon are flattened to underscores, the
/// same way the listing files of the original lock-file era were named.
pub fn pair_key(remote: &RemoteSpec, local: &Path) -> String {
    let raw = format!("{}__{}", remote, local.display());
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Loads, commits, and quarantines the baseline pair for one key
pub struct BaselineStore {
    local_path: PathBuf,
    remote_path: PathBuf,
}

impl BaselineStore {
    pub fn new(state_dir: &Path, key: &str) -> Self {
        Self {
            local_path: state_dir.join(format!("{key}.local.json")),
            remote_path: state_dir.join(format!("{key}.remote.json")),
        }
    }

    /// Load the baseline, or `None` when this pair has never completed a
    /// run. A present-but-unparsable file is an error, not `None`.
    pub async fn load(&self) -> Result<Option<Baseline>> {
        if !exists(&self.local_path).await || !exists(&self.remote_path).await {
            return Ok(None);
        }

        let local = read_listing(&self.local_path).await?;
        let remote = read_listing(&self.remote_path).await?;
        debug!(
            "loaded baseline: {} local entries, {} remote entries",
            local.len(),
            remote.len()
        );
        Ok(Some(Baseline { local, remote }))
    }

    /// Persist a new baseline. Each side is written to a temp file and
    /// renamed into place.
    pub async fn commit(&self, baseline: &Baseline) -> Result<()> {
        if let Some(dir) = self.local_path.parent() {
            fs::create_dir_all(dir).await?;
        }
        write_listing(&self.local_path, &baseline.local).await?;
        write_listing(&self.remote_path, &baseline.remote).await?;
        info!(
            "committed baseline: {} local entries, {} remote entries",
            baseline.local.len(),
            baseline.remote.len()
        );
        Ok(())
    }

    /// Rename any existing baseline files with the error suffix
    pub async fn quarantine(&self) {
        for path in [&self.local_path, &self.remote_path] {
            if exists(path).await {
                let mut quarantined = path.as_os_str().to_owned();
                quarantined.push(QUARANTINE_SUFFIX);
                match fs::rename(path, &quarantined).await {
                    Ok(()) => warn!(
                        "quarantined baseline file {} -> {}",
                        path.display(),
                        PathBuf::from(&quarantined).display()
                    ),
                    Err(e) => warn!("failed to quarantine {}: {e}", path.display()),
                }
            }
        }
    }
}

async fn exists(path: &Path) -> bool {
    fs::metadata(path).await.is_ok()
}

async fn read_listing(path: &Path) -> Result<Listing> {
    let bytes = fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn write_listing(path: &Path, listing: &Listing) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(listing)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &bytes).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}
