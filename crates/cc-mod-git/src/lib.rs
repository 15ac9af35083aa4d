pub mod merge;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use cc_base::modules::Module;
use cc_base::selection::{preserve_selected, toggle_id};
use cc_base::state::State;
use cc_base::types::GitStatusReport;

pub use merge::{apply_token_counts, merge_token_counts_with_previous};
pub use types::{GitState, GitStatus};

pub struct GitModule;

impl Module for GitModule {
    fn id(&self) -> &'static str {
        "git"
    }
    fn name(&self) -> &'static str {
        "Git"
    }
    fn description(&self) -> &'static str {
        "Working tree changes selectable as diffs"
    }

    fn init_state(&self, state: &mut State) {
        state.set_ext(GitState::new());
    }

    fn token_subtotal(&self, state: &State) -> usize {
        git_subtotal(state)
    }
}

/// Install a status snapshot, whether fetched or pushed.
///
/// `None` means the directory is not a repository. A snapshot is merged with
/// the previous one so token counts that already arrived survive. Returns
/// true if the stored status changed.
pub fn install_status(state: &mut State, report: Option<GitStatusReport>) -> bool {
    let gs = GitState::get_mut(state);
    let next = match report {
        None => GitStatus::NotRepository,
        Some(report) => {
            let incoming = Arc::new(report);
            let merged = match gs.status.report() {
                Some(previous) => merge_token_counts_with_previous(incoming, previous),
                None => incoming,
            };
            let early = std::mem::take(&mut gs.early_counts);
            match apply_token_counts(&merged, &early) {
                Some(filled) => GitStatus::Changes(Arc::new(filled)),
                None => GitStatus::Changes(merged),
            }
        }
    };
    if next == gs.status {
        return false;
    }
    gs.status = next;
    prune_selection(gs);
    true
}

/// The status could not be determined; forget the previous snapshot.
pub fn mark_unknown(state: &mut State) {
    let gs = GitState::get_mut(state);
    gs.status = GitStatus::Unknown;
    gs.selected.clear();
}

/// Merge a per-file token count push. Paths not in the current report are
/// ignored; returns true if any count changed.
pub fn apply_token_push(state: &mut State, counts: &HashMap<String, usize>) -> bool {
    let gs = GitState::get_mut(state);
    let Some(current) = gs.status.report() else {
        debug!(files = counts.len(), "git token counts before any status; kept");
        gs.early_counts.extend(counts.iter().map(|(k, v)| (k.clone(), *v)));
        return false;
    };
    match apply_token_counts(current, counts) {
        Some(next) => {
            gs.status = GitStatus::Changes(Arc::new(next));
            true
        }
        None => false,
    }
}

fn prune_selection(gs: &mut GitState) {
    gs.selected = preserve_selected(gs.status.changes(), &gs.selected, |c| c.path.as_str());
}

/// Flip one diff path. Paths absent from the current status are refused.
pub fn toggle_diff(state: &mut State, path: &str) -> bool {
    let gs = GitState::get_mut(state);
    if !gs.status.changes().iter().any(|c| c.path == path) {
        return false;
    }
    toggle_id(&mut gs.selected, path);
    true
}

pub fn select_all(state: &mut State) {
    let gs = GitState::get_mut(state);
    gs.selected = gs.status.changes().iter().map(|c| c.path.clone()).collect();
}

pub fn deselect_all(state: &mut State) {
    GitState::get_mut(state).selected.clear();
}

/// Tokens of the selected diffs; counts not yet pushed contribute zero.
pub fn git_subtotal(state: &State) -> usize {
    let gs = GitState::get(state);
    gs.status.changes().iter().filter(|c| gs.selected.contains(&c.path)).filter_map(|c| c.token_count).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cc_base::types::{GitChange, GitChangeType};
    use pretty_assertions::assert_eq;

    fn state() -> State {
        let mut s = State::new(8);
        GitModule.init_state(&mut s);
        s
    }

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
    fn token_push_backfills_existing_change() {
        let mut s = state();
        install_status(&mut s, Some(report(vec![change("a.py", None)])));
        assert!(apply_token_push(&mut s, &HashMap::from([("a.py".to_string(), 45)])));
        let gs = GitState::get(&s);
        let a = &gs.status.changes()[0];
        assert_eq!(a.token_count, Some(45));
        assert_eq!((a.lines_added, a.lines_deleted), (3, 1));
    }

    #[test]
    fn counts_pushed_before_status_are_applied_on_arrival() {
        let mut s = state();
        assert!(!apply_token_push(&mut s, &HashMap::from([("a.py".to_string(), 12)])));
        install_status(&mut s, Some(report(vec![change("a.py", None)])));
        assert_eq!(GitState::get(&s).status.changes()[0].token_count, Some(12));
        assert!(GitState::get(&s).early_counts.is_empty());
    }

    #[test]
    fn later_status_keeps_known_counts() {
        let mut s = state();
        install_status(&mut s, Some(report(vec![change("a.py", Some(45))])));
        install_status(&mut s, Some(report(vec![change("a.py", None)])));
        assert_eq!(GitState::get(&s).status.changes()[0].token_count, Some(45));
    }

    #[test]
    fn not_repository_is_not_zero_changes() {
        let mut s = state();
        install_status(&mut s, None);
        assert_eq!(GitState::get(&s).status, GitStatus::NotRepository);
        install_status(&mut s, Some(report(vec![])));
        assert!(matches!(GitState::get(&s).status, GitStatus::Changes(_)));
    }

    #[test]
    fn vanished_diff_leaves_selection_and_total() {
        let mut s = state();
        install_status(&mut s, Some(report(vec![change("a.py", Some(10)), change("b.py", Some(5))])));
        select_all(&mut s);
        assert_eq!(git_subtotal(&s), 15);
        install_status(&mut s, Some(report(vec![change("b.py", None)])));
        let gs = GitState::get(&s);
        assert_eq!(gs.selected.iter().collect::<Vec<_>>(), vec!["b.py"]);
        assert_eq!(git_subtotal(&s), 5);
    }

    #[test]
    fn toggle_refuses_unknown_path() {
        let mut s = state();
        install_status(&mut s, Some(report(vec![change("a.py", Some(10))])));
        assert!(!toggle_diff(&mut s, "nope.py"));
        assert!(toggle_diff(&mut s, "a.py"));
        assert_eq!(git_subtotal(&s), 10);
        assert!(toggle_diff(&mut s, "a.py"));
        assert_eq!(git_subtotal(&s), 0);
    }

    #[test]
    fn unknown_clears_selection() {
        let mut s = state();
        install_status(&mut s, Some(report(vec![change("a.py", Some(10))])));
        select_all(&mut s);
        mark_unknown(&mut s);
        assert_eq!(GitState::get(&s).status, GitStatus::Unknown);
        assert_eq!(git_subtotal(&s), 0);
    }
}
