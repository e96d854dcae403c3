//! Run configuration
//!
//! Every knob is threaded explicitly into the components that need it;
//! there is no process-wide mutable configuration.

use std::path::PathBuf;
use std::time::Duration;

use tandem_transfer::RemoteSpec;

use crate::snapshot::DEFAULT_ACCESS_MARKER;

/// Configuration for one reconciliation run over a (remote, local) pair
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Remote tree root
    pub remote_root: RemoteSpec,
    /// Local tree root
    pub local_root: PathBuf,
    /// Exclusion patterns applied to both snapshots
    pub exclude_patterns: Vec<String>,
    /// Walk the full pipeline but apply nothing
    pub dry_run: bool,
    /// Establish the baseline from the union of both trees; no deletions
    /// are inferred
    pub first_run: bool,
    /// Require the access marker file in both listings before trusting
    /// deletions
    pub check_access: bool,
    /// Bypass the deletion-volume safety check
    pub force: bool,
    /// Deletion-volume threshold, as a percentage of baseline entries
    pub max_delete_percent: f64,
    /// Suppress delete actions targeting the local side
    pub no_local_delete: bool,
    /// Directory holding baseline listings and the run lock
    pub state_dir: PathBuf,
    /// Worker bound for concurrent transfer actions
    pub max_concurrent_transfers: usize,
    /// Timeout for a single transfer action; expiry is an action failure
    pub action_timeout: Duration,
    /// Age past which a leftover lock is reclaimed
    pub lock_max_age: Duration,
    /// File name of the liveness marker checked by `check_access`
    pub access_marker: String,
}

impl RunConfig {
    /// Configuration with engine defaults for the given pair
    pub fn new(remote_root: RemoteSpec, local_root: PathBuf) -> Self {
        Self {
            remote_root,
            local_root,
            exclude_patterns: Vec::new(),
            dry_run: false,
            first_run: false,
            check_access: false,
            force: false,
            max_delete_percent: 10.0,
            no_local_delete: false,
            state_dir: default_state_dir(),
            max_concurrent_transfers: 4,
            action_timeout: Duration::from_secs(300),
            lock_max_age: Duration::from_secs(24 * 60 * 60),
            access_marker: DEFAULT_ACCESS_MARKER.to_string(),
        }
    }
}

/// Default state directory, `~/.tandem`
pub fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".tandem"))
        .unwrap_or_else(|| PathBuf::from(".tandem"))
}
