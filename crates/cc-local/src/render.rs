use std::collections::HashSet;

use cc_base::types::{IdSet, TreeDisplayMode, TreeNode};

/// Render the tree as it appears in the composition for `mode`.
pub fn render_tree(mode: TreeDisplayMode, tree: &[TreeNode], selected: &IdSet) -> String {
    match mode {
        TreeDisplayMode::None => String::new(),
        TreeDisplayMode::Full => render_full_tree(tree, selected),
        TreeDisplayMode::Selected => render_selected_tree(tree, selected),
    }
}

/// Every node; selected ones are marked with an asterisk.
pub fn render_full_tree(tree: &[TreeNode], selected: &IdSet) -> String {
    let mut lines = Vec::new();
    render_nodes(tree, "", &mut lines, selected, &|_: &str| true);
    lines.join("\n")
}

/// Only selected nodes and the directories leading to them.
pub fn render_selected_tree(tree: &[TreeNode], selected: &IdSet) -> String {
    fn mark_kept(node: &TreeNode, selected: &IdSet, keep: &mut HashSet<String>) -> bool {
        let mut any_child_kept = false;
        for child in &node.children {
            if mark_kept(child, selected, keep) {
                any_child_kept = true;
            }
        }
        if selected.contains(&node.id) || any_child_kept {
            keep.insert(node.id.clone());
            true
        } else {
            false
        }
    }

    let mut keep = HashSet::new();
    for node in tree {
        mark_kept(node, selected, &mut keep);
    }
    let mut lines = Vec::new();
    render_nodes(tree, "", &mut lines, selected, &|id: &str| keep.contains(id));
    lines.join("\n")
}

fn render_nodes(
    nodes: &[TreeNode],
    prefix: &str,
    lines: &mut Vec<String>,
    selected: &IdSet,
    visible: &dyn Fn(&str) -> bool,
) {
    let shown: Vec<&TreeNode> = nodes.iter().filter(|n| visible(&n.id)).collect();
    for (i, node) in shown.iter().enumerate() {
        let is_last = i == shown.len() - 1;
        let connector = if is_last { "└── " } else { "├── " };
        let marker = if selected.contains(&node.id) { " *" } else { "" };
        lines.push(format!("{}{}{}{}", prefix, connector, node.title, marker));

        if node.is_dir() {
            let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
            render_nodes(&node.children, &child_prefix, lines, selected, visible);
        }
    }
}
