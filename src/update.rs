//! Results delivered back to the composer from background work.

use cc_base::error::BackendResult;
use cc_base::types::{GitStatusReport, PushEvent, SavedInstruction, SavedPage, SearchResult, SelectionResult};

/// Page call that produced a list reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAction {
    Reload,
    Save(String),
    Delete(String),
    Rename { url: String, title: String },
}

impl PageAction {
    pub fn failure_title(&self) -> &'static str {
        match self {
            PageAction::Reload => "Failed to load saved pages",
            PageAction::Save(_) => "Failed to save page",
            PageAction::Delete(_) => "Failed to delete page",
            PageAction::Rename { .. } => "Failed to rename page",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionAction {
    Reload,
    Upsert { id: Option<String>, name: String, content: String },
    Delete(Vec<String>),
}

impl InstructionAction {
    pub fn failure_title(&self) -> &'static str {
        match self {
            InstructionAction::Reload => "Failed to load instructions",
            InstructionAction::Upsert { .. } => "Failed to save instruction",
            InstructionAction::Delete(_) => "Failed to delete instructions",
        }
    }
}

/// Outcome of a list-changing call: the mutation's own result and the
/// list read back after it. The list is read even when the mutation failed,
/// so every round trip ends with the store's authoritative contents.
#[derive(Debug)]
pub struct ListOutcome<T> {
    pub mutation: BackendResult<()>,
    pub list: BackendResult<T>,
}

impl<T> ListOutcome<T> {
    pub fn after(mutation: BackendResult<()>, list: impl FnOnce() -> BackendResult<T>) -> Self {
        Self { mutation, list: list() }
    }
}

/// One completed round trip or forwarded push. Every response names the
/// directory it was issued for and the sequence tag of its request.
#[derive(Debug)]
pub enum Update {
    Search { root: String, seq: u64, query: String, result: BackendResult<SearchResult> },
    Selection { root: String, seq: u64, result: BackendResult<SelectionResult> },
    TreeTokens { root: String, seq: u64, result: BackendResult<usize> },
    GitStatus { root: String, seq: u64, result: BackendResult<Option<GitStatusReport>> },
    Pages { root: String, seq: u64, action: PageAction, outcome: ListOutcome<Vec<SavedPage>> },
    Instructions { root: String, seq: u64, action: InstructionAction, outcome: ListOutcome<Vec<SavedInstruction>> },
    InstructionLoaded { root: String, seq: u64, result: BackendResult<SavedInstruction> },
    DraftTokens { root: String, revision: u64, result: BackendResult<usize> },
    Copied { root: String, result: BackendResult<()> },
    Push(PushEvent),
}

impl Update {
    /// Pushes are not answers to a request.
    pub fn is_response(&self) -> bool {
        !matches!(self, Update::Push(_))
    }

    pub fn root(&self) -> &str {
        match self {
            Update::Search { root, .. }
            | Update::Selection { root, .. }
            | Update::TreeTokens { root, .. }
            | Update::GitStatus { root, .. }
            | Update::Pages { root, .. }
            | Update::Instructions { root, .. }
            | Update::InstructionLoaded { root, .. }
            | Update::DraftTokens { root, .. }
            | Update::Copied { root, .. } => root,
            Update::Push(event) => event.root(),
        }
    }
}
