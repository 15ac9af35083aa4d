//! Data shapes shared by the stores and the computation backend.
//!
//! Everything here crosses the backend boundary, so it serializes with the
//! camelCase field names the computation process speaks.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A set of entity identities (paths, urls, instruction ids).
pub type IdSet = BTreeSet<String>;

/// The directory every other entity belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryInfo {
    pub path: String,
    pub name: String,
}

impl DirectoryInfo {
    /// Build from a path, using its last component as the display name.
    pub fn from_path(path: &str) -> Self {
        let trimmed = path.trim_end_matches('/');
        let name = trimmed.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or(trimmed);
        Self { path: path.to_string(), name: name.to_string() }
    }
}

// =============================================================================
// File tree
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn file(id: &str, title: &str) -> Self {
        Self { id: id.to_string(), title: title.to_string(), kind: NodeKind::File, children: vec![] }
    }

    pub fn directory(id: &str, title: &str, children: Vec<TreeNode>) -> Self {
        Self { id: id.to_string(), title: title.to_string(), kind: NodeKind::Directory, children }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

pub type Tree = Vec<TreeNode>;

/// Collect every node id of a tree, depth first.
pub fn tree_ids(tree: &[TreeNode]) -> IdSet {
    fn walk(nodes: &[TreeNode], out: &mut IdSet) {
        for node in nodes {
            out.insert(node.id.clone());
            walk(&node.children, out);
        }
    }
    let mut out = IdSet::new();
    walk(tree, &mut out);
    out
}

/// How much of the directory tree is rendered into the composition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeDisplayMode {
    None,
    #[default]
    Selected,
    Full,
}

impl TreeDisplayMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "selected" => Some(Self::Selected),
            "full" => Some(Self::Full),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedFile {
    pub path: String,
    pub title: String,
    pub token_count: Option<usize>,
    #[serde(default)]
    pub token_percentage: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub results: Tree,
    pub match_count: usize,
}

/// Authoritative tri-state selection returned by toggle/clear.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResult {
    pub selected: IdSet,
    pub indeterminate: IdSet,
    pub selected_files: Vec<SelectedFile>,
}

#[derive(Debug, Clone)]
pub struct ToggleRequest {
    pub directory: String,
    pub current: IdSet,
    pub node_id: String,
    pub display_mode: TreeDisplayMode,
    pub tree: Arc<Tree>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTokenCount {
    pub id: String,
    pub token_count: usize,
    pub token_percentage: f32,
}

// =============================================================================
// Git
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitChangeType {
    Modified,
    Added,
    Deleted,
    Renamed,
    Untracked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitChange {
    pub path: String,
    pub change_type: GitChangeType,
    pub lines_added: u32,
    pub lines_deleted: u32,
    #[serde(default)]
    pub token_count: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitStatusReport {
    pub results: Vec<GitChange>,
    #[serde(default)]
    pub truncated: bool,
}

// =============================================================================
// Saved pages and instructions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedPage {
    pub url: String,
    pub title: String,
    pub token_count: usize,
    #[serde(default)]
    pub favicon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedInstruction {
    pub id: String,
    pub name: String,
    pub content: String,
    pub token_count: usize,
}

/// Unsaved instruction text; has no identity until saved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionDraft {
    pub name: String,
    pub content: String,
}

impl InstructionDraft {
    pub fn is_blank(&self) -> bool {
        self.name.trim().is_empty() && self.content.trim().is_empty()
    }
}

// =============================================================================
// Push events and the clipboard payload
// =============================================================================

/// Push channels a subscription can be opened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    GitStatus,
    GitTokenCounts,
    FileTokenCounts,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::GitStatus, Topic::GitTokenCounts, Topic::FileTokenCounts];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::GitStatus => "git-status-updated",
            Topic::GitTokenCounts => "git-token-counts",
            Topic::FileTokenCounts => "file-token-counts",
        }
    }
}

/// Unsolicited message from the computation process. Every variant is
/// scoped to the directory (`root`) it was computed for.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    GitStatusUpdated { root: String, report: GitStatusReport },
    GitTokenCounts { root: String, files: HashMap<String, usize> },
    FileTokenCounts { root: String, files: Vec<FileTokenCount>, total: usize },
}

impl PushEvent {
    pub fn root(&self) -> &str {
        match self {
            PushEvent::GitStatusUpdated { root, .. }
            | PushEvent::GitTokenCounts { root, .. }
            | PushEvent::FileTokenCounts { root, .. } => root,
        }
    }

    pub fn topic(&self) -> Topic {
        match self {
            PushEvent::GitStatusUpdated { .. } => Topic::GitStatus,
            PushEvent::GitTokenCounts { .. } => Topic::GitTokenCounts,
            PushEvent::FileTokenCounts { .. } => Topic::FileTokenCounts,
        }
    }
}

/// Everything the clipboard writer needs to render one composition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionRequest {
    pub root: String,
    pub display_mode: TreeDisplayMode,
    pub tree: Arc<Tree>,
    pub selected_nodes: IdSet,
    pub git_diff_paths: IdSet,
    pub urls: IdSet,
    pub instruction_ids: IdSet,
    pub draft: Option<InstructionDraft>,
}
