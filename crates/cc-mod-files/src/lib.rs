pub mod types;

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use cc_base::modules::Module;
use cc_base::selection::preserve_selected;
use cc_base::state::State;
use cc_base::types::{FileTokenCount, SearchResult, SelectedFile, SelectionResult, Tree, tree_ids};

pub use types::{FilesState, SelectionOp};

pub struct FilesModule;

impl Module for FilesModule {
    fn id(&self) -> &'static str {
        "files"
    }
    fn name(&self) -> &'static str {
        "Files"
    }
    fn description(&self) -> &'static str {
        "Directory tree with tri-state file selection"
    }

    fn init_state(&self, state: &mut State) {
        state.set_ext(FilesState::new());
    }

    fn token_subtotal(&self, state: &State) -> usize {
        files_subtotal(state)
    }
}

/// Install the canonical tree. The selection, its files and any
/// remembered token counts are pruned to the nodes it contains.
pub fn install_tree(state: &mut State, tree: Tree) {
    let fs = FilesState::get_mut(state);
    fs.tree = Arc::new(tree);
    let ids: Vec<String> = tree_ids(&fs.tree).into_iter().collect();
    fs.selected = preserve_selected(&ids, &fs.selected, |id| id.as_str());
    fs.indeterminate = preserve_selected(&ids, &fs.indeterminate, |id| id.as_str());
    let selected = &fs.selected;
    fs.selected_files.retain(|f| selected.contains(&f.path));
    let before = fs.pushed_counts.len();
    // `ids` comes out of a BTreeSet, already sorted.
    fs.pushed_counts.retain(|id, _| ids.binary_search(id).is_ok());
    debug!(nodes = ids.len(), pruned = before - fs.pushed_counts.len(), "canonical tree installed");
}

/// Install the filtered view for `query`. An empty query shows the whole tree.
pub fn install_search(state: &mut State, query: &str, result: SearchResult) {
    let fs = FilesState::get_mut(state);
    fs.query = query.to_string();
    fs.match_count = result.match_count;
    fs.filtered_tree = result.results;
}

/// Search failed: the filtered view becomes empty, the canonical tree stays.
pub fn clear_search_results(state: &mut State) {
    let fs = FilesState::get_mut(state);
    fs.filtered_tree.clear();
    fs.match_count = 0;
}

/// Install an authoritative tri-state selection in one step.
pub fn install_selection(state: &mut State, result: SelectionResult) {
    let fs = FilesState::get_mut(state);
    let SelectionResult { selected, mut indeterminate, selected_files } = result;
    // A node is either selected or indeterminate, never both.
    indeterminate.retain(|id| !selected.contains(id));
    fs.selected_files = selected_files
        .into_iter()
        .filter(|f| selected.contains(&f.path))
        .map(|mut f| {
            if f.token_count.is_none() {
                if let Some(count) = fs.pushed_counts.get(&f.path) {
                    f.token_count = Some(count.token_count);
                    f.token_percentage = Some(count.token_percentage);
                }
            }
            f
        })
        .collect();
    fs.selected = selected;
    fs.indeterminate = indeterminate;
}

/// Back-fill token counts pushed for the selected files.
///
/// Selected files are updated in place. Counts for files not (yet) in the
/// selection are remembered and applied when a selection containing them
/// is installed. Returns true if any selected file changed.
pub fn merge_file_token_counts(state: &mut State, counts: &[FileTokenCount]) -> bool {
    let fs = FilesState::get_mut(state);
    let mut changed = false;
    for count in counts {
        fs.pushed_counts.insert(count.id.clone(), count.clone());
        if let Some(file) = fs.selected_files.iter_mut().find(|f| f.path == count.id) {
            if file.token_count != Some(count.token_count) || file.token_percentage != Some(count.token_percentage) {
                file.token_count = Some(count.token_count);
                file.token_percentage = Some(count.token_percentage);
                changed = true;
            }
        } else {
            debug!(id = %count.id, "token count kept for unselected file");
        }
    }
    changed
}

/// Sum of the selected files' tokens; unknown counts contribute zero.
pub fn files_subtotal(state: &State) -> usize {
    let fs = FilesState::get(state);
    fs.selected_files.iter().filter(|f| fs.selected.contains(&f.path)).filter_map(|f| f.token_count).sum()
}

pub fn tree_overhead(state: &State) -> usize {
    FilesState::get(state).tree_token_count
}

/// Selected files, largest first; files without a count go last.
pub fn sorted_by_tokens(files: &[SelectedFile]) -> Vec<SelectedFile> {
    let mut out = files.to_vec();
    out.sort_by(|a, b| match (a.token_count, b.token_count) {
        (Some(x), Some(y)) => y.cmp(&x).then_with(|| a.path.cmp(&b.path)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.path.cmp(&b.path),
    });
    out
}
