//! Tri-state selection over a [`TreeIndex`].
//!
//! The selection set holds both files and directories. A directory is in it
//! exactly when every file below it is; it is indeterminate when some but
//! not all are.

use cc_base::types::IdSet;

use crate::index::TreeIndex;

pub fn all_descendants_selected(id: &str, index: &TreeIndex, selected: &IdSet) -> bool {
    let Some(node) = index.get(id) else {
        return false;
    };
    if node.is_file() {
        return selected.contains(id);
    }
    node.child_ids.iter().all(|c| all_descendants_selected(c, index, selected))
}

pub fn any_descendant_selected(id: &str, index: &TreeIndex, selected: &IdSet) -> bool {
    let Some(node) = index.get(id) else {
        return false;
    };
    if node.is_file() {
        return selected.contains(id);
    }
    node.child_ids.iter().any(|c| any_descendant_selected(c, index, selected))
}

/// Recompute every ancestor of `id` bottom-up.
pub fn update_ancestors(id: &str, index: &TreeIndex, selected: &mut IdSet) {
    let mut cur = index.get(id).and_then(|n| n.parent.clone());
    while let Some(parent) = cur {
        if all_descendants_selected(&parent, index, selected) {
            selected.insert(parent.clone());
        } else {
            selected.remove(&parent);
        }
        cur = index.get(&parent).and_then(|n| n.parent.clone());
    }
}

pub fn compute_indeterminate(index: &TreeIndex, selected: &IdSet) -> IdSet {
    index
        .nodes
        .values()
        .filter(|n| !n.is_file())
        .filter(|n| {
            any_descendant_selected(&n.id, index, selected) && !all_descendants_selected(&n.id, index, selected)
        })
        .map(|n| n.id.clone())
        .collect()
}

/// Flip `node_id` and propagate. Toggling a directory selects its whole
/// subtree unless all of it is already selected, in which case it clears it.
///
/// Returns `(selected, indeterminate)`. An unknown node leaves the
/// selection as it was.
pub fn toggle(index: &TreeIndex, current: &IdSet, node_id: &str) -> (IdSet, IdSet) {
    let mut selected = current.clone();
    if index.get(node_id).is_some() {
        let mut targets = vec![node_id.to_string()];
        let mut stack = vec![node_id.to_string()];
        while let Some(cur) = stack.pop() {
            if let Some(node) = index.get(&cur) {
                targets.extend(node.child_ids.iter().cloned());
                stack.extend(node.child_ids.iter().cloned());
            }
        }

        let selecting = targets.iter().any(|t| !selected.contains(t));
        for t in targets {
            if selecting {
                selected.insert(t);
            } else {
                selected.remove(&t);
            }
        }
        update_ancestors(node_id, index, &mut selected);
    }
    let indeterminate = compute_indeterminate(index, &selected);
    (selected, indeterminate)
}

/// Selected ids that are files, in a stable order.
pub fn selected_file_ids(index: &TreeIndex, selected: &IdSet) -> Vec<String> {
    selected.iter().filter(|id| index.get(id).is_some_and(|n| n.is_file())).cloned().collect()
}
