//! Owned, consistent copy of everything one clipboard copy needs.

use std::sync::Arc;

use serde::Serialize;

use cc_base::state::State;
use cc_base::types::{
    CompositionRequest, DirectoryInfo, IdSet, InstructionDraft, SelectedFile, Tree, TreeDisplayMode,
};
use cc_mod_files::FilesState;
use cc_mod_git::GitState;
use cc_mod_instructions::InstructionsState;
use cc_mod_web::WebState;

use crate::aggregate::TokenBreakdown;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionSnapshot {
    pub directory: DirectoryInfo,
    pub display_mode: TreeDisplayMode,
    pub tree: Arc<Tree>,
    pub selected_nodes: IdSet,
    pub selected_files: Vec<SelectedFile>,
    pub git_diff_paths: IdSet,
    pub urls: IdSet,
    pub instruction_ids: IdSet,
    /// Present only while the draft counts toward the composition.
    pub draft: Option<InstructionDraft>,
    pub tokens: TokenBreakdown,
}

impl CompositionSnapshot {
    /// `None` without an active directory.
    pub fn capture(state: &State, tokens: TokenBreakdown) -> Option<Self> {
        let directory = state.directory.clone()?;
        let fs = FilesState::get(state);
        let is = InstructionsState::get(state);
        let draft = cc_mod_instructions::draft_counts(state).then(|| is.draft.clone());

        Some(Self {
            directory,
            display_mode: fs.display_mode,
            tree: fs.tree.clone(),
            selected_nodes: fs.selected.clone(),
            selected_files: fs.selected_files.clone(),
            git_diff_paths: GitState::get(state).selected.clone(),
            urls: WebState::get(state).selected.clone(),
            instruction_ids: is.selected.clone(),
            draft,
            tokens,
        })
    }

    pub fn to_request(&self) -> CompositionRequest {
        CompositionRequest {
            root: self.directory.path.clone(),
            display_mode: self.display_mode,
            tree: self.tree.clone(),
            selected_nodes: self.selected_nodes.clone(),
            git_diff_paths: self.git_diff_paths.clone(),
            urls: self.urls.clone(),
            instruction_ids: self.instruction_ids.clone(),
            draft: self.draft.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selected_nodes.is_empty()
            && self.git_diff_paths.is_empty()
            && self.urls.is_empty()
            && self.instruction_ids.is_empty()
            && self.draft.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::all_modules;
    use cc_base::config::EngineConfig;
    use cc_base::types::SavedInstruction;
    use std::time::Instant;

    fn state() -> State {
        let mut state = State::new(8);
        for m in all_modules(&EngineConfig::load()) {
            m.init_state(&mut state);
        }
        state
    }

    #[test]
    fn no_snapshot_without_directory() {
        assert!(CompositionSnapshot::capture(&state(), TokenBreakdown::default()).is_none());
    }

    #[test]
    fn draft_follows_inclusion_and_edit_mode() {
        let mut s = state();
        s.directory = Some(DirectoryInfo::from_path("/proj"));
        cc_mod_instructions::edit_draft(&mut s, "Task", "Explain the parser", Instant::now());

        let snap = CompositionSnapshot::capture(&s, TokenBreakdown::default()).expect("snapshot");
        assert!(cc_mod_instructions::draft_counts(&s));
        assert_eq!(snap.to_request().draft.map(|d| d.name), Some("Task".to_string()));
        assert!(!snap.is_empty());

        cc_mod_instructions::set_draft_included(&mut s, false);
        let snap = CompositionSnapshot::capture(&s, TokenBreakdown::default()).expect("snapshot");
        assert!(snap.draft.is_none());
        assert!(snap.is_empty());

        cc_mod_instructions::set_draft_included(&mut s, true);
        cc_mod_instructions::begin_edit(
            &mut s,
            SavedInstruction { id: "i1".into(), name: "n".into(), content: "c".into(), token_count: 1 },
        );
        assert!(CompositionSnapshot::capture(&s, TokenBreakdown::default()).expect("snapshot").draft.is_none());
    }
}
