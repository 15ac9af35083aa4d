use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use cc_base::seq::LatestRequest;
use cc_base::state::State;
use cc_base::types::{FileTokenCount, IdSet, SelectedFile, Tree, TreeDisplayMode};

/// A queued selection round trip. Toggles wait for the outstanding one so
/// each is computed against the selection its predecessor produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOp {
    Toggle(String),
    Clear,
}

/// Module-owned state for the file tree and its selection.
#[derive(Debug, Default)]
pub struct FilesState {
    /// Canonical tree of the active directory.
    pub tree: Arc<Tree>,
    /// Tree as filtered by the current search query.
    pub filtered_tree: Tree,
    pub query: String,
    pub match_count: usize,
    pub selected: IdSet,
    /// Directories with some but not all descendants selected.
    pub indeterminate: IdSet,
    pub selected_files: Vec<SelectedFile>,
    pub display_mode: TreeDisplayMode,
    /// Tokens of the rendered tree (the composition's tree overhead).
    pub tree_token_count: usize,
    /// Last pushed count per file, kept for files whose selection has not
    /// been installed yet.
    pub pushed_counts: HashMap<String, FileTokenCount>,

    /// Loads of the canonical tree. Kept apart from `search_request` so a
    /// filter query never supersedes the tree a directory opened with.
    pub tree_request: LatestRequest,
    pub search_request: LatestRequest,
    pub selection_request: LatestRequest,
    pub recount_request: LatestRequest,
    pub pending_selection: VecDeque<SelectionOp>,
}

impl FilesState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(state: &State) -> &Self {
        state.get_ext::<Self>().expect("FilesState not initialized")
    }

    pub fn get_mut(state: &mut State) -> &mut Self {
        state.get_ext_mut::<Self>().expect("FilesState not initialized")
    }
}
