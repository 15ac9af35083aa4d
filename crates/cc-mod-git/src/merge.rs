//! Merge rules for git status pushes.
//!
//! A status push never carries token counts; those arrive later on their own
//! channel. Merging keeps the incoming change list as the authority (entities
//! missing from it are dropped) and only back-fills `token_count` from the
//! previous snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use cc_base::types::GitStatusReport;

/// Back-fill missing token counts in `incoming` from `previous`.
///
/// Returns `incoming` itself (same allocation) when nothing was back-filled.
pub fn merge_token_counts_with_previous(
    incoming: Arc<GitStatusReport>,
    previous: &GitStatusReport,
) -> Arc<GitStatusReport> {
    let known: HashMap<&str, usize> =
        previous.results.iter().filter_map(|c| c.token_count.map(|t| (c.path.as_str(), t))).collect();

    let needs_fill = incoming.results.iter().any(|c| c.token_count.is_none() && known.contains_key(c.path.as_str()));
    if !needs_fill {
        return incoming;
    }

    let mut merged = (*incoming).clone();
    for change in &mut merged.results {
        if change.token_count.is_none() {
            change.token_count = known.get(change.path.as_str()).copied();
        }
    }
    Arc::new(merged)
}

/// Apply a `path -> tokens` push to the current report.
///
/// Only paths already in the report are touched. Returns `None` when no
/// count changed.
pub fn apply_token_counts(current: &GitStatusReport, counts: &HashMap<String, usize>) -> Option<GitStatusReport> {
    let changed = current.results.iter().any(|c| counts.get(&c.path).is_some_and(|t| c.token_count != Some(*t)));
    if !changed {
        return None;
    }
    let mut next = current.clone();
    for change in &mut next.results {
        if let Some(tokens) = counts.get(&change.path) {
            change.token_count = Some(*tokens);
        }
    }
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cc_base::types::{GitChange, GitChangeType};
    use pretty_assertions::assert_eq;

    fn change(path: &str, tokens: Option<usize>) -> GitChange {
        GitChange {
            path: path.to_string(),
            change_type: GitChangeType::Modified,
            lines_added: 3,
            lines_deleted: 1,
            token_count: tokens,
        }
    }

    fn report(changes: Vec<GitChange>) -> GitStatusReport {
        GitStatusReport { results: changes, truncated: false }
    }

    #[test]
    fn unchanged_merge_returns_same_allocation() {
        let previous = report(vec![change("a.py", None)]);
        let incoming = Arc::new(report(vec![change("a.py", None), change("b.py", None)]));
        let merged = merge_token_counts_with_previous(incoming.clone(), &previous);
        assert!(Arc::ptr_eq(&merged, &incoming));
    }

    #[test]
    fn incoming_counts_win_and_need_no_copy() {
        let previous = report(vec![change("a.py", Some(10))]);
        let incoming = Arc::new(report(vec![change("a.py", Some(12))]));
        let merged = merge_token_counts_with_previous(incoming.clone(), &previous);
        assert!(Arc::ptr_eq(&merged, &incoming));
        assert_eq!(merged.results[0].token_count, Some(12));
    }

    #[test]
    fn backfills_and_drops_vanished_entries() {
        let previous = report(vec![change("a.py", Some(45)), change("gone.py", Some(7))]);
        let incoming = Arc::new(report(vec![change("a.py", None), change("new.py", None)]));
        let merged = merge_token_counts_with_previous(incoming.clone(), &previous);
        assert!(!Arc::ptr_eq(&merged, &incoming));
        assert_eq!(merged.results, vec![change("a.py", Some(45)), change("new.py", None)]);
    }

    #[test]
    fn token_push_fills_count_only() {
        let current = report(vec![change("a.py", None)]);
        let counts = HashMap::from([("a.py".to_string(), 45), ("other.py".to_string(), 9)]);
        let next = apply_token_counts(&current, &counts).expect("changed");
        assert_eq!(next.results, vec![change("a.py", Some(45))]);
        assert!(apply_token_counts(&next, &counts).is_none());
    }
}
