//! Deletion-volume safety gate
//!
//! A burst of inferred deletions usually means something went wrong
//! upstream (a tree wiped by mistake, a listing that lost half its
//! entries), not that the user really deleted that much. The gate
//! rejects the run before anything is applied; both trees and the
//! baseline stay untouched, so a rerun is always safe.

use std::fmt;

use tracing::warn;

use crate::diff::{ChangeAction, ChangeKind};

/// Whether the change set may be applied
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Allow,
    Reject(GateRejection),
}

/// Why the gate rejected the change set
#[derive(Debug, Clone, PartialEq)]
pub enum GateRejection {
    ExcessiveDeletions {
        deletes: usize,
        total: usize,
        percent: f64,
        max_percent: f64,
    },
}

impl fmt::Display for GateRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateRejection::ExcessiveDeletions {
                deletes,
                total,
                percent,
                max_percent,
            } => write!(
                f,
                "{deletes} deletions over {total} baseline entries \
                 ({percent:.1}% > {max_percent:.1}%)"
            ),
        }
    }
}

/// Evaluate the change set against the deletion threshold.
///
/// `total_entries` is the baseline union size: deletions are only ever
/// inferred from baseline-tracked paths. `force` bypasses the threshold
/// with a warning.
pub fn evaluate(
    actions: &[ChangeAction],
    total_entries: usize,
    max_delete_percent: f64,
    force: bool,
) -> GateDecision {
    let deletes = actions
        .iter()
        .filter(|a| a.kind == ChangeKind::Delete)
        .count();
    if deletes == 0 {
        return GateDecision::Allow;
    }

    let percent = if total_entries == 0 {
        100.0
    } else {
        deletes as f64 * 100.0 / total_entries as f64
    };

    if percent > max_delete_percent {
        if force {
            warn!(
                "deletion threshold exceeded ({deletes} of {total_entries}, {percent:.1}%) \
                 but force is set; proceeding"
            );
            return GateDecision::Allow;
        }
        return GateDecision::Reject(GateRejection::ExcessiveDeletions {
            deletes,
            total: total_entries,
            percent,
            max_percent: max_delete_percent,
        });
    }

    GateDecision::Allow
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::Direction;

    fn deletes(n: usize) -> Vec<ChangeAction> {
        (0..n)
            .map(|i| ChangeAction {
                path: format!("f{i}"),
                kind: ChangeKind::Delete,
                direction: Direction::ToRemote,
                size: 0,
            })
            .collect()
    }

    #[test]
    fn test_under_threshold_allows() {
        let actions = deletes(1);
        assert_eq!(evaluate(&actions, 100, 10.0, false), GateDecision::Allow);
    }

    #[test]
    fn test_over_threshold_rejects() {
        let actions = deletes(11);
        match evaluate(&actions, 100, 10.0, false) {
            GateDecision::Reject(GateRejection::ExcessiveDeletions {
                deletes, total, ..
            }) => {
                assert_eq!(deletes, 11);
                assert_eq!(total, 100);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_exactly_at_threshold_allows() {
        let actions = deletes(10);
        assert_eq!(evaluate(&actions, 100, 10.0, false), GateDecision::Allow);
    }

    #[test]
    fn test_force_overrides() {
        let actions = deletes(50);
        assert_eq!(evaluate(&actions, 100, 10.0, true), GateDecision::Allow);
    }

    #[test]
    fn test_no_deletes_always_allows() {
        assert_eq!(evaluate(&[], 0, 10.0, false), GateDecision::Allow);
    }
}
