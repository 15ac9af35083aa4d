//! Selection helpers shared by every list-backed store.

use crate::types::IdSet;

/// Keep only the selected ids that still exist in `items`.
///
/// Called after every change that can shrink or reorder an authoritative
/// list. Idempotent, and the result is always a subset of the list's ids.
pub fn preserve_selected<T, F>(items: &[T], selected: &IdSet, id_of: F) -> IdSet
where
    F: Fn(&T) -> &str,
{
    let present: std::collections::HashSet<&str> = items.iter().map(&id_of).collect();
    selected.iter().filter(|id| present.contains(id.as_str())).cloned().collect()
}

/// Aggregate checkbox state of a list panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    None,
    Some,
    All,
}

pub fn group_state(selected: usize, total: usize) -> GroupState {
    if total == 0 || selected == 0 {
        GroupState::None
    } else if selected >= total {
        GroupState::All
    } else {
        GroupState::Some
    }
}

/// Flip membership of `id`; returns true if it is now selected.
pub fn toggle_id(selected: &mut IdSet, id: &str) -> bool {
    if selected.remove(id) {
        false
    } else {
        selected.insert(id.to_string());
        true
    }
}
