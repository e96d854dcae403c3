//! Change application
//!
//! Applies the approved change set through the transfer provider.
//! Copies dispatch before deletes so an interrupted run can only leave
//! extra data behind, never a hole. Actions run concurrently up to the
//! worker bound; each provider call is wrapped in a timeout and its
//! outcome recorded per action. Failures are data here; escalation is
//! the run controller's call.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use tandem_transfer::{Endpoint, TransferProvider};

use crate::diff::{ChangeAction, ChangeKind, Direction};

/// Outcome of applying one change action
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Applied,
    /// Dry run: the action was logged, nothing was touched
    WouldApply,
    Failed(String),
}

/// One action paired with what happened to it
#[derive(Debug, Clone)]
pub struct ActionResult {
    pub action: ChangeAction,
    pub outcome: ActionOutcome,
}

impl ActionResult {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, ActionOutcome::Failed(_))
    }
}

/// Applies change actions through the provider
pub struct ChangeOrchestrator {
    provider: Arc<dyn TransferProvider>,
    local: Endpoint,
    remote: Endpoint,
    max_concurrent: usize,
    action_timeout: Duration,
    dry_run: bool,
}

impl ChangeOrchestrator {
    pub fn new(
        provider: Arc<dyn TransferProvider>,
        local: Endpoint,
        remote: Endpoint,
        max_concurrent: usize,
        action_timeout: Duration,
        dry_run: bool,
    ) -> Self {
        Self {
            provider,
            local,
            remote,
            max_concurrent: max_concurrent.max(1),
            action_timeout,
            dry_run,
        }
    }

    /// Apply the change set, copies first, and report every outcome
    pub async fn apply(&self, actions: &[ChangeAction]) -> Vec<ActionResult> {
        let (copies, deletes): (Vec<_>, Vec<_>) = actions
            .iter()
            .cloned()
            .partition(|a| a.kind != ChangeKind::Delete);

        let mut results = self.apply_batch(copies).await;
        results.extend(self.apply_batch(deletes).await);
        results
    }

    async fn apply_batch(&self, batch: Vec<ChangeAction>) -> Vec<ActionResult> {
        if self.dry_run {
            return batch
                .into_iter()
                .map(|action| {
                    info!(
                        "dry run: would {} {} ({})",
                        verb(action.kind),
                        action.path,
                        describe(action.direction)
                    );
                    ActionResult {
                        action,
                        outcome: ActionOutcome::WouldApply,
                    }
                })
                .collect();
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(batch.len());

        for action in batch {
            let semaphore = semaphore.clone();
            let provider = self.provider.clone();
            let local = self.local.clone();
            let remote = self.remote.clone();
            let action_timeout = self.action_timeout;
            let task_action = action.clone();

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return ActionOutcome::Failed("worker pool closed".to_string()),
                };
                apply_one(provider.as_ref(), &local, &remote, &task_action, action_timeout).await
            });
            handles.push((action, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (action, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => ActionOutcome::Failed(format!("worker panicked: {e}")),
            };
            if let ActionOutcome::Failed(reason) = &outcome {
                warn!("failed to {} {}: {reason}", verb(action.kind), action.path);
            }
            results.push(ActionResult { action, outcome });
        }
        results
    }
}

async fn apply_one(
    provider: &dyn TransferProvider,
    local: &Endpoint,
    remote: &Endpoint,
    action: &ChangeAction,
    action_timeout: Duration,
) -> ActionOutcome {
    // The direction names the side being changed
    let (source, target) = match action.direction {
        Direction::ToRemote => (local, remote),
        Direction::ToLocal => (remote, local),
    };

    let call = async {
        match action.kind {
            ChangeKind::Create | ChangeKind::Modify => {
                provider.copy(source, target, &action.path).await
            }
            ChangeKind::Delete => provider.delete(target, &action.path).await,
        }
    };

    match timeout(action_timeout, call).await {
        Ok(Ok(())) => {
            debug!(
                "{} {} ({})",
                verb(action.kind),
                action.path,
                describe(action.direction)
            );
            ActionOutcome::Applied
        }
        Ok(Err(e)) => ActionOutcome::Failed(e.to_string()),
        Err(_) => ActionOutcome::Failed(format!("timed out after {action_timeout:?}")),
    }
}

fn verb(kind: ChangeKind) -> &'static str {
    match kind {
        ChangeKind::Create => "create",
        ChangeKind::Modify => "update",
        ChangeKind::Delete => "delete",
    }
}

fn describe(direction: Direction) -> &'static str {
    match direction {
        Direction::ToLocal => "to local",
        Direction::ToRemote => "to remote",
    }
}
