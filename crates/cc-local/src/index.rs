//! Flat index over a directory tree, keyed by node id (absolute path).
//!
//! Search, selection and rendering all work on this index; the nested
//! [`Tree`] shape only exists at the boundary.

use std::collections::HashMap;
use std::path::Path;

use ignore::WalkBuilder;
use tracing::debug;

use cc_base::error::{BackendError, BackendResult};
use cc_base::types::{NodeKind, Tree, TreeNode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNode {
    pub id: String,
    pub title: String,
    pub kind: NodeKind,
    pub parent: Option<String>,
    pub child_ids: Vec<String>,
}

impl IndexNode {
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }
}

#[derive(Debug, Clone, Default)]
pub struct TreeIndex {
    pub top_level: Vec<String>,
    pub nodes: HashMap<String, IndexNode>,
}

impl TreeIndex {
    /// Walk `root` honouring gitignore rules. The root itself is not a node.
    pub fn scan(root: &str) -> BackendResult<Self> {
        let root_path = Path::new(root);
        if !root_path.is_dir() {
            return Err(BackendError::NotFound(root.to_string()));
        }

        let walker = WalkBuilder::new(root_path)
            .hidden(false)
            .git_ignore(true)
            .filter_entry(|e| e.file_name() != ".git")
            .build();

        let mut index = TreeIndex::default();
        let mut links: Vec<(Option<String>, String)> = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }
            let path = entry.path();
            let id = path.to_string_lossy().to_string();
            let title = entry.file_name().to_string_lossy().to_string();
            let kind = if entry.file_type().is_some_and(|t| t.is_dir()) { NodeKind::Directory } else { NodeKind::File };
            let parent = path.parent().filter(|p| *p != root_path).map(|p| p.to_string_lossy().to_string());
            links.push((parent.clone(), id.clone()));
            index.nodes.insert(id.clone(), IndexNode { id, title, kind, parent, child_ids: vec![] });
        }

        for (parent, id) in links {
            match parent {
                Some(p) => {
                    if let Some(node) = index.nodes.get_mut(&p) {
                        node.child_ids.push(id);
                    }
                }
                None => index.top_level.push(id),
            }
        }
        index.sort_children();
        Ok(index)
    }

    /// Index an already materialized tree, keeping its order.
    pub fn from_tree(tree: &[TreeNode]) -> Self {
        fn walk(nodes: &[TreeNode], parent: Option<&str>, index: &mut TreeIndex) {
            for node in nodes {
                index.nodes.insert(
                    node.id.clone(),
                    IndexNode {
                        id: node.id.clone(),
                        title: node.title.clone(),
                        kind: node.kind,
                        parent: parent.map(|p| p.to_string()),
                        child_ids: node.children.iter().map(|c| c.id.clone()).collect(),
                    },
                );
                walk(&node.children, Some(&node.id), index);
            }
        }
        let mut index = TreeIndex { top_level: tree.iter().map(|n| n.id.clone()).collect(), nodes: HashMap::new() };
        walk(tree, None, &mut index);
        index
    }

    /// Directories first, then alphabetically.
    fn sort_children(&mut self) {
        let order: HashMap<String, (bool, String)> =
            self.nodes.iter().map(|(id, n)| (id.clone(), (n.is_file(), n.title.to_lowercase()))).collect();
        let key = |id: &String| order.get(id).cloned().unwrap_or((true, String::new()));
        self.top_level.sort_by_key(key);
        for node in self.nodes.values_mut() {
            node.child_ids.sort_by_key(key);
        }
    }

    pub fn get(&self, id: &str) -> Option<&IndexNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Materialize the subtree under `id`, keeping only ids accepted by `keep`.
    pub fn build_node(&self, id: &str, keep: &dyn Fn(&str) -> bool) -> Option<TreeNode> {
        if !keep(id) {
            return None;
        }
        let node = self.nodes.get(id)?;
        let children = node.child_ids.iter().filter_map(|c| self.build_node(c, keep)).collect();
        Some(TreeNode { id: node.id.clone(), title: node.title.clone(), kind: node.kind, children })
    }

    pub fn to_tree(&self) -> Tree {
        self.top_level.iter().filter_map(|id| self.build_node(id, &|_: &str| true)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scan_orders_dirs_first_and_respects_gitignore() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        fs::create_dir_all(root.join("src")).expect("mkdir");
        fs::write(root.join("src/main.rs"), "fn main() {}").expect("write");
        fs::write(root.join("a.txt"), "a").expect("write");
        fs::write(root.join("skip.log"), "x").expect("write");
        fs::write(root.join(".gitignore"), "*.log\n").expect("write");
        // gitignore files are only honoured inside a repository
        fs::create_dir_all(root.join(".git")).expect("mkdir");

        let index = TreeIndex::scan(&root.to_string_lossy()).expect("scan");
        let titles: Vec<&str> = index.top_level.iter().map(|id| index.nodes[id].title.as_str()).collect();
        assert_eq!(titles, vec!["src", ".gitignore", "a.txt"]);
        let src = &index.nodes[&root.join("src").to_string_lossy().to_string()];
        assert_eq!(src.child_ids.len(), 1);
        assert!(index.nodes.values().all(|n| n.title != "skip.log" && n.title != ".git"));
    }

    #[test]
    fn from_tree_roundtrips_shape() {
        let tree = vec![TreeNode::directory("/p/d", "d", vec![TreeNode::file("/p/d/x", "x")])];
        let index = TreeIndex::from_tree(&tree);
        assert_eq!(index.get("/p/d/x").and_then(|n| n.parent.clone()), Some("/p/d".to_string()));
        assert_eq!(index.to_tree(), tree);
    }

    #[test]
    fn missing_root_is_not_found() {
        let err = TreeIndex::scan("/definitely/not/here").expect_err("missing");
        assert!(matches!(err, BackendError::NotFound(_)));
    }
}
