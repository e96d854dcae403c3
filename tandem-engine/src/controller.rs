//! Run controller
//!
//! Sequences one reconciliation run: lock, snapshot both trees, diff
//! against the baseline, gate, apply, commit. The controller is the only
//! place internal failures become terminal outcomes; everything below it
//! returns structured results.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use tandem_transfer::{Endpoint, TransferProvider};

use crate::baseline::{pair_key, Baseline, BaselineStore};
use crate::config::RunConfig;
use crate::diff::{self, ChangeAction, ChangeKind, Conflict, DiffStats, Direction};
use crate::errors::EngineError;
use crate::gate::{self, GateDecision, GateRejection};
use crate::listing::Listing;
use crate::lock::LockManager;
use crate::orchestrator::{ActionResult, ChangeOrchestrator};
use crate::snapshot::Snapshotter;

/// Terminal status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Reconciled; baseline committed (conflicts, if any, were reported)
    Success,
    /// Another run holds the lock; nothing was touched
    SkippedLocked,
    /// Transient failure; trees and baseline untouched, safe to rerun
    Abort,
    /// Baseline may no longer reflect reality; it was quarantined and a
    /// first-sync rerun is required
    Critical,
}

impl RunOutcome {
    /// Shell return code: 0 success, 1 abort, 2 critical
    pub fn exit_code(self) -> u8 {
        match self {
            RunOutcome::Success | RunOutcome::SkippedLocked => 0,
            RunOutcome::Abort => 1,
            RunOutcome::Critical => 2,
        }
    }
}

/// Phase of the run state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Locking,
    Snapshotting,
    Diffing,
    GateCheck,
    Applying,
    Committing,
    Done,
}

/// What a run did
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub actions: Vec<ActionResult>,
    pub conflicts: Vec<Conflict>,
    pub stats: DiffStats,
}

impl RunReport {
    fn terminal(outcome: RunOutcome) -> Self {
        Self {
            outcome,
            actions: Vec::new(),
            conflicts: Vec::new(),
            stats: DiffStats::default(),
        }
    }
}

/// Internal failure, tagged with the outcome it escalates to
enum RunError {
    Abort(EngineError),
    Critical(EngineError),
}

/// Drives one reconciliation run over a (remote, local) pair
pub struct Reconciler {
    config: RunConfig,
    provider: Arc<dyn TransferProvider>,
}

impl Reconciler {
    pub fn new(config: RunConfig, provider: Arc<dyn TransferProvider>) -> Self {
        Self { config, provider }
    }

    /// Run to a terminal outcome. Never panics, never returns an error:
    /// every failure is folded into the report.
    pub async fn run(&self) -> RunReport {
        let key = pair_key(&self.config.remote_root, &self.config.local_root);
        let locks = LockManager::new(self.config.state_dir.clone(), self.config.lock_max_age);

        enter(RunPhase::Locking);
        let handle = match locks.acquire(&key).await {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                warn!("prior lock for this pair is in place; skipping run");
                return RunReport::terminal(RunOutcome::SkippedLocked);
            }
            Err(e) => {
                error!("could not acquire lock: {e}; aborting, safe to rerun");
                return RunReport::terminal(RunOutcome::Abort);
            }
        };

        let store = BaselineStore::new(&self.config.state_dir, &key);
        let report = match self.execute(&store).await {
            Ok(report) => report,
            Err(RunError::Abort(e)) => {
                error!("run aborted: {e}; trees and baseline untouched, safe to rerun");
                RunReport::terminal(RunOutcome::Abort)
            }
            Err(RunError::Critical(e)) => {
                error!("critical failure: {e}; quarantining baseline, rerun with first-sync");
                store.quarantine().await;
                RunReport::terminal(RunOutcome::Critical)
            }
        };

        if let Err(e) = locks.release(handle).await {
            warn!("failed to release lock: {e}");
        }
        report
    }

    async fn execute(&self, store: &BaselineStore) -> Result<RunReport, RunError> {
        let local_root = Endpoint::Local(self.config.local_root.clone());
        let remote_root = Endpoint::Remote(self.config.remote_root.clone());

        enter(RunPhase::Snapshotting);
        let snapshotter = Snapshotter::new(
            self.provider.clone(),
            self.config.exclude_patterns.clone(),
            self.config.check_access,
            self.config.access_marker.clone(),
        );
        let (local, remote) = tokio::try_join!(
            snapshotter.snapshot(&local_root),
            snapshotter.snapshot(&remote_root)
        )
        .map_err(RunError::Abort)?;

        enter(RunPhase::Diffing);
        let (diff_result, prior) = if self.config.first_run {
            info!("first sync: establishing the baseline from the union of both trees");
            (diff::bootstrap(&local, &remote), None)
        } else {
            match store.load().await {
                Ok(Some(baseline)) => {
                    let result = diff::diff(&baseline, &local, &remote);
                    (result, Some(baseline))
                }
                Ok(None) => return Err(RunError::Critical(EngineError::BaselineMissing)),
                Err(e) => return Err(RunError::Critical(e)),
            }
        };

        let mut actions = diff_result.actions;
        let conflicts = diff_result.conflicts;
        let stats = diff_result.stats;
        for conflict in &conflicts {
            warn!(
                "conflict on {}: local {:?}, remote {:?}; leaving both sides as they are",
                conflict.path, conflict.local, conflict.remote
            );
        }

        if self.config.no_local_delete {
            let before = actions.len();
            actions.retain(|a| !(a.kind == ChangeKind::Delete && a.direction == Direction::ToLocal));
            let suppressed = before - actions.len();
            if suppressed > 0 {
                info!("suppressed {suppressed} local deletion(s)");
            }
        }

        enter(RunPhase::GateCheck);
        let total = prior.as_ref().map_or(0, Baseline::entry_count);
        if let GateDecision::Reject(rejection) = gate::evaluate(
            &actions,
            total,
            self.config.max_delete_percent,
            self.config.force,
        ) {
            let GateRejection::ExcessiveDeletions {
                deletes,
                total,
                percent,
                max_percent,
            } = rejection;
            return Err(RunError::Abort(EngineError::ExcessiveDeletions {
                deletes,
                total,
                percent,
                max_percent,
            }));
        }

        enter(RunPhase::Applying);
        let orchestrator = ChangeOrchestrator::new(
            self.provider.clone(),
            local_root,
            remote_root,
            self.config.max_concurrent_transfers,
            self.config.action_timeout,
            self.config.dry_run,
        );
        let results = orchestrator.apply(&actions).await;

        let failed_deletes = results
            .iter()
            .filter(|r| r.is_failure() && r.action.kind == ChangeKind::Delete)
            .count();
        let failed_total = results.iter().filter(|r| r.is_failure()).count();
        if failed_total > 0 {
            let err = EngineError::ApplyFailed {
                failed: failed_total,
                total: results.len(),
            };
            // A failed delete means the baseline would record a removal
            // that never happened
            return if failed_deletes > 0 {
                Err(RunError::Critical(err))
            } else {
                Err(RunError::Abort(err))
            };
        }

        if self.config.dry_run {
            info!("dry run complete: nothing applied, baseline unchanged");
        } else {
            enter(RunPhase::Committing);
            let next = synthesize_baseline(&local, &remote, &actions, prior.as_ref(), &conflicts);
            store.commit(&next).await.map_err(RunError::Critical)?;
        }

        enter(RunPhase::Done);
        summarize(&results, &conflicts);
        Ok(RunReport {
            outcome: RunOutcome::Success,
            actions: results,
            conflicts,
            stats,
        })
    }
}

fn enter(phase: RunPhase) {
    debug!("run phase: {phase:?}");
}

/// The new baseline is the run's listings with the applied change set
/// folded in: the changed side keeps its current entry and the target
/// side receives the source side's entry (or loses the deleted one).
/// Conflicted paths are rewritten back to their prior baseline state so
/// the next run re-evaluates them.
fn synthesize_baseline(
    local: &Listing,
    remote: &Listing,
    actions: &[ChangeAction],
    prior: Option<&Baseline>,
    conflicts: &[Conflict],
) -> Baseline {
    let mut next = Baseline {
        local: local.clone(),
        remote: remote.clone(),
    };

    for action in actions {
        let (source, target) = match action.direction {
            Direction::ToRemote => (local, &mut next.remote),
            Direction::ToLocal => (remote, &mut next.local),
        };
        match action.kind {
            ChangeKind::Create | ChangeKind::Modify => {
                if let Some(entry) = source.get(&action.path) {
                    target.insert(entry.clone());
                }
            }
            ChangeKind::Delete => {
                target.remove(&action.path);
            }
        }
    }

    if let Some(prior) = prior {
        for conflict in conflicts {
            restore(&mut next.local, &prior.local, &conflict.path);
            restore(&mut next.remote, &prior.remote, &conflict.path);
        }
    }

    next
}

fn restore(side: &mut Listing, prior: &Listing, path: &str) {
    match prior.get(path) {
        Some(entry) => {
            side.insert(entry.clone());
        }
        None => {
            side.remove(path);
        }
    }
}

fn summarize(results: &[ActionResult], conflicts: &[Conflict]) {
    let mut to_remote = 0usize;
    let mut to_local = 0usize;
    let mut deletes = 0usize;
    for result in results {
        match (result.action.kind, result.action.direction) {
            (ChangeKind::Delete, _) => deletes += 1,
            (_, Direction::ToRemote) => to_remote += 1,
            (_, Direction::ToLocal) => to_local += 1,
        }
    }
    info!(
        "run complete: {to_remote} copied to remote, {to_local} copied to local, \
         {deletes} deleted, {} conflict(s)",
        conflicts.len()
    );
}
