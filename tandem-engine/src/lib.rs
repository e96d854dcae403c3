//! Three-way reconciliation engine for tandem
//!
//! This crate keeps two independently-mutable trees in agreement:
//! - Snapshotting both trees through the transfer provider
//! - Three-way diffing against the persisted baseline
//! - Conflict classification (flag and skip, never auto-resolved)
//! - Safety gating of excessive deletions
//! - Bounded-concurrency change application with dry-run
//! - Run sequencing, outcome classification, and baseline commit

pub mod baseline;
pub mod config;
pub mod controller;
pub mod diff;
pub mod errors;
pub mod gate;
pub mod listing;
pub mod lock;
pub mod orchestrator;
pub mod snapshot;

pub use baseline::{pair_key, Baseline, BaselineStore};
pub use config::{default_state_dir, RunConfig};
pub use controller::{Reconciler, RunOutcome, RunPhase, RunReport};
pub use diff::{
    ChangeAction, ChangeKind, Conflict, DiffResult, DiffStats, Direction, SideStatus,
};
pub use errors::{EngineError, Result};
pub use gate::{GateDecision, GateRejection};
pub use listing::Listing;
pub use lock::{LockHandle, LockManager};
pub use orchestrator::{ActionOutcome, ActionResult, ChangeOrchestrator};
pub use snapshot::{Snapshotter, DEFAULT_ACCESS_MARKER};
