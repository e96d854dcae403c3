//! Three-way diff computation
//!
//! For every path seen by the baseline or either current listing, work
//! out what changed on each side since the baseline and classify the
//! result into a propagating action or a conflict. A change on exactly
//! one side is mirrored to the other; a change on both sides is either
//! already converged (both deleted, or both ended up with equal
//! metadata) or a conflict that no action may touch.
//!
//! Equality is path + size + modification time; no content hashing is
//! assumed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use tandem_transfer::Entry;

use crate::baseline::Baseline;
use crate::listing::Listing;

/// What a change action does on its target side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Create,
    Modify,
    Delete,
}

/// The side that must be made to match the other side's newer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    ToLocal,
    ToRemote,
}

/// A single propagate-this-change instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeAction {
    pub path: String,
    pub kind: ChangeKind,
    pub direction: Direction,
    /// Size of the entry being propagated (0 for deletes)
    pub size: u64,
}

/// State of a path on one side relative to the baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SideStatus {
    Unchanged,
    Added,
    Modified,
    Deleted,
}

impl SideStatus {
    fn is_changed(self) -> bool {
        self != SideStatus::Unchanged
    }
}

/// A path that changed incompatibly on both sides since the baseline.
/// Never auto-applied; the path keeps its prior baseline entry so it is
/// re-evaluated next run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub path: String,
    pub local: SideStatus,
    pub remote: SideStatus,
}

/// Statistics about a diff
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffStats {
    pub creates: usize,
    pub modifies: usize,
    pub deletes: usize,
    pub conflicts: usize,
    pub unchanged: usize,
    pub bytes_to_copy: u64,
}

/// Result of one diff pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    pub actions: Vec<ChangeAction>,
    pub conflicts: Vec<Conflict>,
    pub stats: DiffStats,
}

impl DiffResult {
    pub fn has_changes(&self) -> bool {
        !self.actions.is_empty()
    }

    pub fn delete_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| a.kind == ChangeKind::Delete)
            .count()
    }

    fn push_action(&mut self, path: &str, kind: ChangeKind, direction: Direction, size: u64) {
        match kind {
            ChangeKind::Create => self.stats.creates += 1,
            ChangeKind::Modify => self.stats.modifies += 1,
            ChangeKind::Delete => self.stats.deletes += 1,
        }
        if kind != ChangeKind::Delete {
            self.stats.bytes_to_copy += size;
        }
        self.actions.push(ChangeAction {
            path: path.to_string(),
            kind,
            direction,
            size,
        });
    }

    fn push_conflict(&mut self, path: &str, local: SideStatus, remote: SideStatus) {
        self.stats.conflicts += 1;
        self.conflicts.push(Conflict {
            path: path.to_string(),
            local,
            remote,
        });
    }
}

/// Compute the bidirectional change set against a baseline
pub fn diff(baseline: &Baseline, local: &Listing, remote: &Listing) -> DiffResult {
    let mut result = DiffResult::default();

    let mut paths: BTreeSet<&String> = BTreeSet::new();
    paths.extend(baseline.local.paths());
    paths.extend(baseline.remote.paths());
    paths.extend(local.paths());
    paths.extend(remote.paths());

    for path in paths {
        let cur_local = local.get(path);
        let cur_remote = remote.get(path);

        // A path that is a file on one side and a directory on the other
        // cannot be propagated in either direction
        if let (Some(l), Some(r)) = (cur_local, cur_remote) {
            if l.kind != r.kind {
                result.push_conflict(path, SideStatus::Modified, SideStatus::Modified);
                continue;
            }
        }

        // Directories are bookkeeping: copies create parents implicitly
        // and deletes only target files
        let cur_local = file_only(cur_local);
        let cur_remote = file_only(cur_remote);
        let base_local = file_only(baseline.local.get(path));
        let base_remote = file_only(baseline.remote.get(path));
        if cur_local.is_none()
            && cur_remote.is_none()
            && base_local.is_none()
            && base_remote.is_none()
        {
            continue;
        }

        let local_status = side_status(base_local, cur_local);
        let remote_status = side_status(base_remote, cur_remote);

        match (local_status.is_changed(), remote_status.is_changed()) {
            (false, false) => result.stats.unchanged += 1,
            (true, false) => {
                let (kind, size) = action_for(local_status, cur_local);
                result.push_action(path, kind, Direction::ToRemote, size);
            }
            (false, true) => {
                let (kind, size) = action_for(remote_status, cur_remote);
                result.push_action(path, kind, Direction::ToLocal, size);
            }
            (true, true) => {
                let converged = match (cur_local, cur_remote) {
                    // Both sides deleted it
                    (None, None) => true,
                    // Both sides ended up with the same metadata
                    (Some(l), Some(r)) => l.same_metadata(r),
                    _ => false,
                };
                if converged {
                    result.stats.unchanged += 1;
                } else {
                    result.push_conflict(path, local_status, remote_status);
                }
            }
        }
    }

    debug!(
        "diff: {} creates, {} modifies, {} deletes, {} conflicts, {} unchanged",
        result.stats.creates,
        result.stats.modifies,
        result.stats.deletes,
        result.stats.conflicts,
        result.stats.unchanged
    );
    result
}

/// First-run change set: reconcile the union of both trees with no
/// delete inference. Entries present on one side are copied to the
/// other; matching entries are left alone; where both sides differ the
/// local version overwrites the remote one.
pub fn bootstrap(local: &Listing, remote: &Listing) -> DiffResult {
    let mut result = DiffResult::default();

    let mut paths: BTreeSet<&String> = BTreeSet::new();
    paths.extend(local.paths());
    paths.extend(remote.paths());

    for path in paths {
        let cur_local = local.get(path);
        let cur_remote = remote.get(path);

        if let (Some(l), Some(r)) = (cur_local, cur_remote) {
            if l.kind != r.kind {
                result.push_conflict(path, SideStatus::Modified, SideStatus::Modified);
                continue;
            }
        }

        match (file_only(cur_local), file_only(cur_remote)) {
            (Some(l), None) => result.push_action(path, ChangeKind::Create, Direction::ToRemote, l.size),
            (None, Some(r)) => result.push_action(path, ChangeKind::Create, Direction::ToLocal, r.size),
            (Some(l), Some(r)) => {
                if l.same_metadata(r) {
                    result.stats.unchanged += 1;
                } else {
                    result.push_action(path, ChangeKind::Modify, Direction::ToRemote, l.size);
                }
            }
            (None, None) => {}
        }
    }

    debug!(
        "bootstrap diff: {} creates, {} modifies, {} unchanged",
        result.stats.creates, result.stats.modifies, result.stats.unchanged
    );
    result
}

fn file_only(entry: Option<&Entry>) -> Option<&Entry> {
    entry.filter(|e| e.is_file())
}

fn side_status(base: Option<&Entry>, current: Option<&Entry>) -> SideStatus {
    match (base, current) {
        (None, None) => SideStatus::Unchanged,
        (None, Some(_)) => SideStatus::Added,
        (Some(_), None) => SideStatus::Deleted,
        (Some(b), Some(c)) => {
            if b.same_metadata(c) {
                SideStatus::Unchanged
            } else {
                SideStatus::Modified
            }
        }
    }
}

fn action_for(status: SideStatus, current: Option<&Entry>) -> (ChangeKind, u64) {
    match status {
        SideStatus::Added => (ChangeKind::Create, current.map_or(0, |e| e.size)),
        SideStatus::Modified => (ChangeKind::Modify, current.map_or(0, |e| e.size)),
        SideStatus::Deleted => (ChangeKind::Delete, 0),
        // Callers only ask for changed statuses
        SideStatus::Unchanged => (ChangeKind::Modify, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use tandem_transfer::Entry;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn file(path: &str, size: u64, mtime: i64) -> Entry {
        Entry::file(path, size, ts(mtime))
    }

    fn listing(entries: Vec<Entry>) -> Listing {
        entries.into_iter().collect()
    }

    fn both_sides(entries: Vec<Entry>) -> Baseline {
        Baseline {
            local: listing(entries.clone()),
            remote: listing(entries),
        }
    }

    #[test]
    fn test_no_changes_is_empty() {
        let baseline = both_sides(vec![file("a.txt", 1, 1000)]);
        let result = diff(
            &baseline,
            &baseline.local.clone(),
            &baseline.remote.clone(),
        );
        assert!(!result.has_changes());
        assert!(result.conflicts.is_empty());
        assert_eq!(result.stats.unchanged, 1);
    }

    #[test]
    fn test_local_add_propagates_to_remote() {
        let baseline = both_sides(vec![]);
        let local = listing(vec![file("new.txt", 5, 1000)]);
        let remote = listing(vec![]);

        let result = diff(&baseline, &local, &remote);
        assert_eq!(
            result.actions,
            vec![ChangeAction {
                path: "new.txt".to_string(),
                kind: ChangeKind::Create,
                direction: Direction::ToRemote,
                size: 5,
            }]
        );
    }

    #[test]
    fn test_remote_modify_propagates_to_local() {
        let baseline = both_sides(vec![file("doc.txt", 5, 1000)]);
        let local = listing(vec![file("doc.txt", 5, 1000)]);
        let remote = listing(vec![file("doc.txt", 9, 2000)]);

        let result = diff(&baseline, &local, &remote);
        assert_eq!(result.actions.len(), 1);
        assert_eq!(result.actions[0].kind, ChangeKind::Modify);
        assert_eq!(result.actions[0].direction, Direction::ToLocal);
    }

    #[test]
    fn test_local_delete_propagates_to_remote() {
        let baseline = both_sides(vec![file("old.txt", 5, 1000)]);
        let local = listing(vec![]);
        let remote = listing(vec![file("old.txt", 5, 1000)]);

        let result = diff(&baseline, &local, &remote);
        assert_eq!(result.actions.len(), 1);
        assert_eq!(result.actions[0].kind, ChangeKind::Delete);
        assert_eq!(result.actions[0].direction, Direction::ToRemote);
    }

    #[test]
    fn test_both_modified_differently_is_conflict() {
        let baseline = both_sides(vec![file("shared.txt", 5, 1000)]);
        let local = listing(vec![file("shared.txt", 6, 2000)]);
        let remote = listing(vec![file("shared.txt", 7, 3000)]);

        let result = diff(&baseline, &local, &remote);
        assert!(result.actions.is_empty());
        assert_eq!(
            result.conflicts,
            vec![Conflict {
                path: "shared.txt".to_string(),
                local: SideStatus::Modified,
                remote: SideStatus::Modified,
            }]
        );
    }

    #[test]
    fn test_modify_vs_delete_is_conflict() {
        let baseline = both_sides(vec![file("shared.txt", 5, 1000)]);
        let local = listing(vec![file("shared.txt", 6, 2000)]);
        let remote = listing(vec![]);

        let result = diff(&baseline, &local, &remote);
        assert!(result.actions.is_empty());
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].local, SideStatus::Modified);
        assert_eq!(result.conflicts[0].remote, SideStatus::Deleted);
    }

    #[test]
    fn test_both_deleted_is_converged() {
        let baseline = both_sides(vec![file("gone.txt", 5, 1000)]);
        let result = diff(&baseline, &listing(vec![]), &listing(vec![]));
        assert!(result.actions.is_empty());
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn test_both_modified_identically_is_converged() {
        let baseline = both_sides(vec![file("same.txt", 5, 1000)]);
        let local = listing(vec![file("same.txt", 8, 2000)]);
        let remote = listing(vec![file("same.txt", 8, 2000)]);

        let result = diff(&baseline, &local, &remote);
        assert!(result.actions.is_empty());
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn test_both_added_identically_is_converged() {
        let baseline = both_sides(vec![]);
        let local = listing(vec![file("new.txt", 8, 2000)]);
        let remote = listing(vec![file("new.txt", 8, 2000)]);

        let result = diff(&baseline, &local, &remote);
        assert!(result.actions.is_empty());
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn test_file_vs_directory_is_conflict() {
        let baseline = both_sides(vec![]);
        let local = listing(vec![Entry::directory("x", ts(1000))]);
        let remote = listing(vec![file("x", 3, 1000)]);

        let result = diff(&baseline, &local, &remote);
        assert!(result.actions.is_empty());
        assert_eq!(result.conflicts.len(), 1);
    }

    #[test]
    fn test_directories_are_skipped() {
        let baseline = both_sides(vec![]);
        let local = listing(vec![Entry::directory("only/here", ts(1000))]);
        let remote = listing(vec![]);

        let result = diff(&baseline, &local, &remote);
        assert!(result.actions.is_empty());
        assert!(result.conflicts.is_empty());
    }

    // The concrete scenario: local deletes a.txt, remote modifies b.txt
    #[test]
    fn test_mixed_single_sided_changes() {
        let baseline = both_sides(vec![file("a.txt", 1, 1000), file("b.txt", 2, 1000)]);
        let local = listing(vec![file("b.txt", 2, 1000)]);
        let remote = listing(vec![file("a.txt", 1, 1000), file("b.txt", 9, 2000)]);

        let result = diff(&baseline, &local, &remote);
        assert!(result.conflicts.is_empty());
        assert_eq!(result.actions.len(), 2);

        let delete = result.actions.iter().find(|a| a.path == "a.txt").unwrap();
        assert_eq!(delete.kind, ChangeKind::Delete);
        assert_eq!(delete.direction, Direction::ToRemote);

        let modify = result.actions.iter().find(|a| a.path == "b.txt").unwrap();
        assert_eq!(modify.kind, ChangeKind::Modify);
        assert_eq!(modify.direction, Direction::ToLocal);
    }

    #[test]
    fn test_bootstrap_copies_union_without_deletes() {
        let local = listing(vec![file("only-local.txt", 1, 1000), file("both.txt", 2, 1000)]);
        let remote = listing(vec![file("only-remote.txt", 3, 1000), file("both.txt", 2, 1000)]);

        let result = bootstrap(&local, &remote);
        assert_eq!(result.delete_count(), 0);
        assert_eq!(result.actions.len(), 2);

        let to_remote = result
            .actions
            .iter()
            .find(|a| a.path == "only-local.txt")
            .unwrap();
        assert_eq!(to_remote.direction, Direction::ToRemote);
        assert_eq!(to_remote.kind, ChangeKind::Create);

        let to_local = result
            .actions
            .iter()
            .find(|a| a.path == "only-remote.txt")
            .unwrap();
        assert_eq!(to_local.direction, Direction::ToLocal);
    }

    #[test]
    fn test_bootstrap_local_overwrites_differing_remote() {
        let local = listing(vec![file("both.txt", 5, 2000)]);
        let remote = listing(vec![file("both.txt", 4, 1000)]);

        let result = bootstrap(&local, &remote);
        assert_eq!(result.actions.len(), 1);
        assert_eq!(result.actions[0].kind, ChangeKind::Modify);
        assert_eq!(result.actions[0].direction, Direction::ToRemote);
    }
}
