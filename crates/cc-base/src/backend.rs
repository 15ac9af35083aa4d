//! Contract of the external computation process.
//!
//! Every call is blocking and is expected to run off the owning thread
//! (see the composer's dispatcher). Push updates are delivered through a
//! [`PushSink`] handed over when a [`Subscription`] is opened.

use std::fmt;
use std::sync::mpsc::Sender;

use crate::error::BackendResult;
use crate::types::{
    CompositionRequest, GitStatusReport, IdSet, PushEvent, SavedInstruction, SavedPage, SearchResult,
    SelectionResult, ToggleRequest, Topic, Tree, TreeDisplayMode,
};

/// Where a backend delivers push events.
pub type PushSink = Sender<PushEvent>;

pub trait Backend: Send + Sync {
    /// Filtered tree for `query`; `None` or an empty query returns the full canonical tree.
    fn search_tree(&self, directory: &str, query: Option<&str>) -> BackendResult<SearchResult>;

    /// Atomic tri-state transition for one node.
    fn toggle_selection(&self, request: &ToggleRequest) -> BackendResult<SelectionResult>;

    fn clear_selection(&self, directory: &str, mode: TreeDisplayMode, tree: &Tree) -> BackendResult<SelectionResult>;

    /// Tokens of the rendered directory tree for the given display mode.
    fn count_tree_tokens(&self, mode: TreeDisplayMode, tree: &Tree, selected: &IdSet) -> BackendResult<usize>;

    /// `Ok(None)` means the directory is not a repository.
    fn git_status(&self, directory: &str) -> BackendResult<Option<GitStatusReport>>;

    fn list_pages(&self, directory: &str) -> BackendResult<Vec<SavedPage>>;
    fn save_page(&self, directory: &str, url: &str) -> BackendResult<SavedPage>;
    fn delete_page(&self, directory: &str, url: &str) -> BackendResult<()>;
    fn rename_page(&self, directory: &str, url: &str, title: &str) -> BackendResult<()>;

    fn list_instructions(&self, directory: &str) -> BackendResult<Vec<SavedInstruction>>;
    fn get_instruction(&self, directory: &str, id: &str) -> BackendResult<SavedInstruction>;
    /// Returns the id of the created or updated instruction.
    fn upsert_instruction(&self, directory: &str, id: Option<&str>, name: &str, content: &str)
    -> BackendResult<String>;
    fn delete_instructions(&self, directory: &str, ids: &[String]) -> BackendResult<()>;

    fn count_tokens(&self, text: &str) -> BackendResult<usize>;

    /// Render the composition and place it on the system clipboard.
    fn copy_composition(&self, composition: &CompositionRequest) -> BackendResult<()>;

    /// Start delivering `topic` events for `directory` into `sink`.
    fn subscribe(&self, topic: Topic, directory: &str, sink: PushSink) -> BackendResult<Subscription>;
}

/// Live push subscription. Dropping it (or calling [`Subscription::unsubscribe`])
/// stops delivery.
pub struct Subscription {
    topic: Topic,
    directory: String,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(topic: Topic, directory: &str, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self { topic, directory: directory.to_string(), cancel: Some(Box::new(cancel)) }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("topic", &self.topic).field("directory", &self.directory).finish()
    }
}
