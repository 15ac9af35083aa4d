use std::time::Duration;

use cc_base::debounce::Debouncer;
use cc_base::seq::LatestRequest;
use cc_base::state::State;
use cc_base::types::{IdSet, InstructionDraft, SavedInstruction};

// === Module-owned state ===

#[derive(Debug)]
pub struct InstructionsState {
    pub instructions: Vec<SavedInstruction>,
    /// Selected instruction ids.
    pub selected: IdSet,
    /// Unsaved text in the editor; has no identity until saved.
    pub draft: InstructionDraft,
    /// Whether the draft counts towards the composition.
    pub draft_included: bool,
    /// Tokens of the last settled draft content.
    pub draft_tokens: usize,
    pub draft_debounce: Debouncer<String>,
    /// Id of the saved instruction loaded into the editor, if any.
    pub editing: Option<String>,

    pub list_request: LatestRequest,
    pub load_request: LatestRequest,
}

impl InstructionsState {
    pub fn new(debounce: Duration) -> Self {
        Self {
            instructions: vec![],
            selected: IdSet::new(),
            draft: InstructionDraft::default(),
            draft_included: true,
            draft_tokens: 0,
            draft_debounce: Debouncer::new(debounce),
            editing: None,
            list_request: LatestRequest::default(),
            load_request: LatestRequest::default(),
        }
    }
    pub fn get(state: &State) -> &Self {
        state.get_ext::<Self>().expect("InstructionsState not initialized")
    }
    pub fn get_mut(state: &mut State) -> &mut Self {
        state.get_ext_mut::<Self>().expect("InstructionsState not initialized")
    }
}
