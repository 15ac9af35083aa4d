pub mod types;

use std::time::{Duration, Instant};

use tracing::debug;

use cc_base::modules::Module;
use cc_base::selection::{preserve_selected, toggle_id};
use cc_base::state::State;
use cc_base::types::{InstructionDraft, SavedInstruction};

pub use types::InstructionsState;

pub struct InstructionsModule {
    debounce: Duration,
}

impl InstructionsModule {
    pub fn new(debounce: Duration) -> Self {
        Self { debounce }
    }
}

impl Module for InstructionsModule {
    fn id(&self) -> &'static str {
        "instructions"
    }
    fn name(&self) -> &'static str {
        "Instructions"
    }
    fn description(&self) -> &'static str {
        "Saved instructions and the unsaved draft"
    }

    fn init_state(&self, state: &mut State) {
        state.set_ext(InstructionsState::new(self.debounce));
    }

    fn token_subtotal(&self, state: &State) -> usize {
        instructions_subtotal(state)
    }
}

/// Replace the instruction list and prune the selection against it.
pub fn install_instructions(state: &mut State, instructions: Vec<SavedInstruction>) {
    let is = InstructionsState::get_mut(state);
    is.selected = preserve_selected(&instructions, &is.selected, |i| i.id.as_str());
    let edited_gone = is.editing.as_ref().is_some_and(|id| !instructions.iter().any(|i| &i.id == id));
    if edited_gone {
        debug!(id = ?is.editing, "instruction under edit was removed");
        is.editing = None;
    }
    is.instructions = instructions;
}

pub fn toggle_instruction(state: &mut State, id: &str) -> bool {
    let is = InstructionsState::get_mut(state);
    if !is.instructions.iter().any(|i| i.id == id) {
        return false;
    }
    toggle_id(&mut is.selected, id);
    true
}

/// Select every saved instruction and include the draft.
pub fn select_all(state: &mut State) {
    let is = InstructionsState::get_mut(state);
    is.selected = is.instructions.iter().map(|i| i.id.clone()).collect();
    is.draft_included = true;
}

/// Deselect every saved instruction and exclude the draft.
pub fn deselect_all(state: &mut State) {
    let is = InstructionsState::get_mut(state);
    is.selected.clear();
    is.draft_included = false;
}

pub fn set_draft_included(state: &mut State, included: bool) {
    InstructionsState::get_mut(state).draft_included = included;
}

/// Update the draft text; content changes restart the count window.
pub fn edit_draft(state: &mut State, name: &str, content: &str, now: Instant) {
    let is = InstructionsState::get_mut(state);
    let content_changed = is.draft.content != content;
    is.draft = InstructionDraft { name: name.to_string(), content: content.to_string() };
    if content_changed {
        is.draft_debounce.push(content.to_string(), now);
    }
}

/// Fire the draft count once its window has elapsed.
///
/// Whitespace-only content settles to zero here and needs no round trip;
/// otherwise the revision and text to count are returned.
pub fn poll_draft(state: &mut State, now: Instant) -> Option<(u64, String)> {
    let is = InstructionsState::get_mut(state);
    let (revision, content) = is.draft_debounce.poll(now)?;
    if content.trim().is_empty() {
        is.draft_tokens = 0;
        return None;
    }
    Some((revision, content))
}

/// Install a draft count; dropped if the text moved on since it was issued.
pub fn install_draft_tokens(state: &mut State, revision: u64, tokens: usize) -> bool {
    let is = InstructionsState::get_mut(state);
    if !is.draft_debounce.is_latest(revision) {
        debug!(revision, "stale draft token count dropped");
        return false;
    }
    is.draft_tokens = tokens;
    true
}

pub fn draft_deadline(state: &State) -> Option<Instant> {
    InstructionsState::get(state).draft_debounce.deadline()
}

/// Empty the editor and invalidate any pending count.
pub fn clear_draft(state: &mut State) {
    let is = InstructionsState::get_mut(state);
    is.draft = InstructionDraft::default();
    is.draft_tokens = 0;
    is.editing = None;
    is.draft_debounce.cancel();
}

/// Load a saved instruction into the editor.
pub fn begin_edit(state: &mut State, instruction: SavedInstruction) {
    let is = InstructionsState::get_mut(state);
    is.draft_debounce.cancel();
    is.draft = InstructionDraft { name: instruction.name, content: instruction.content };
    is.draft_tokens = instruction.token_count;
    is.editing = Some(instruction.id);
}

pub fn cancel_edit(state: &mut State) {
    if InstructionsState::get(state).editing.is_some() {
        clear_draft(state);
    }
}

/// The draft is part of the composition only while included, non-empty,
/// and not standing in for a saved instruction under edit.
pub fn draft_counts(state: &State) -> bool {
    let is = InstructionsState::get(state);
    is.draft_included && is.editing.is_none() && !is.draft.is_blank()
}

pub fn draft_subtotal(state: &State) -> usize {
    if draft_counts(state) { InstructionsState::get(state).draft_tokens } else { 0 }
}

pub fn instructions_subtotal(state: &State) -> usize {
    let is = InstructionsState::get(state);
    let saved: usize =
        is.instructions.iter().filter(|i| is.selected.contains(&i.id)).map(|i| i.token_count).sum();
    saved + draft_subtotal(state)
}
