//! In-memory backend with scripted responses for composer tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use cc_base::backend::{Backend, PushSink, Subscription};
use cc_base::config::EngineConfig;
use cc_base::error::{BackendError, BackendResult};
use cc_base::types::{
    CompositionRequest, GitChange, GitChangeType, GitStatusReport, IdSet, PushEvent, SavedInstruction, SavedPage,
    SearchResult, SelectedFile, SelectionResult, ToggleRequest, Topic, Tree, TreeDisplayMode, TreeNode, tree_ids,
};
use composer::Composer;

pub const WAIT: Duration = Duration::from_secs(10);
pub const QUIET: Duration = Duration::from_millis(150);

#[derive(Default)]
pub struct Script {
    pub trees: HashMap<String, Tree>,
    /// Cached counts reported with selected files; absent means not yet counted.
    pub file_tokens: HashMap<String, usize>,
    pub git: HashMap<String, Option<GitStatusReport>>,
    pub git_error: Option<BackendError>,
    pub pages: HashMap<String, Vec<SavedPage>>,
    pub instructions: HashMap<String, Vec<SavedInstruction>>,
    pub save_page_error: Option<BackendError>,
}

struct Sink {
    topic: Topic,
    directory: String,
    tx: PushSink,
    live: Arc<AtomicBool>,
}

#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
    sinks: Mutex<Vec<Sink>>,
    counted: Mutex<Vec<String>>,
    copies: Mutex<Vec<CompositionRequest>>,
    next_id: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn words(text: &str) -> usize {
    text.split_whitespace().count()
}

fn find_file<'a>(tree: &'a [TreeNode], id: &str) -> Option<&'a TreeNode> {
    for node in tree {
        if node.id == id && !node.is_dir() {
            return Some(node);
        }
        if let Some(found) = find_file(&node.children, id) {
            return Some(found);
        }
    }
    None
}

impl ScriptedBackend {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self { script: Mutex::new(script), ..Default::default() })
    }

    pub fn script(&self) -> MutexGuard<'_, Script> {
        lock(&self.script)
    }

    /// Deliver to live subscribers of the event's directory.
    pub fn push(&self, event: PushEvent) {
        for sink in lock(&self.sinks).iter() {
            if sink.live.load(Ordering::SeqCst) && sink.topic == event.topic() && sink.directory == event.root() {
                let _ = sink.tx.send(event.clone());
            }
        }
    }

    /// Deliver through every sink ever handed out for the topic, live or not:
    /// a message that was already on its way when the subscription closed.
    pub fn push_in_flight(&self, event: PushEvent) {
        for sink in lock(&self.sinks).iter().filter(|s| s.topic == event.topic()) {
            let _ = sink.tx.send(event.clone());
        }
    }

    pub fn live_subscriptions(&self, directory: &str) -> usize {
        lock(&self.sinks).iter().filter(|s| s.directory == directory && s.live.load(Ordering::SeqCst)).count()
    }

    pub fn counted(&self) -> Vec<String> {
        lock(&self.counted).clone()
    }

    pub fn copies(&self) -> Vec<CompositionRequest> {
        lock(&self.copies).clone()
    }

    fn selection(&self, tree: &Tree, selected: IdSet) -> SelectionResult {
        let script = self.script();
        let selected_files = selected
            .iter()
            .filter_map(|id| find_file(tree, id))
            .map(|node| SelectedFile {
                path: node.id.clone(),
                title: node.title.clone(),
                token_count: script.file_tokens.get(&node.id).copied(),
                token_percentage: None,
            })
            .collect();
        SelectionResult { selected, indeterminate: IdSet::new(), selected_files }
    }
}

impl Backend for ScriptedBackend {
    fn search_tree(&self, directory: &str, query: Option<&str>) -> BackendResult<SearchResult> {
        let tree = self.script().trees.get(directory).cloned().unwrap_or_default();
        match query {
            Some(q) if !q.trim().is_empty() => {
                let results: Tree = tree.into_iter().filter(|n| n.title.contains(q)).collect();
                Ok(SearchResult { match_count: results.len(), results })
            }
            _ => Ok(SearchResult { match_count: tree_ids(&tree).len(), results: tree }),
        }
    }

    fn toggle_selection(&self, request: &ToggleRequest) -> BackendResult<SelectionResult> {
        let mut selected = request.current.clone();
        if !selected.remove(&request.node_id) {
            selected.insert(request.node_id.clone());
        }
        Ok(self.selection(&request.tree, selected))
    }

    fn clear_selection(&self, _directory: &str, _mode: TreeDisplayMode, _tree: &Tree) -> BackendResult<SelectionResult> {
        Ok(SelectionResult::default())
    }

    fn count_tree_tokens(&self, mode: TreeDisplayMode, tree: &Tree, selected: &IdSet) -> BackendResult<usize> {
        Ok(match mode {
            TreeDisplayMode::None => 0,
            TreeDisplayMode::Selected => selected.len() * 5,
            TreeDisplayMode::Full => tree_ids(tree).len() * 5,
        })
    }

    fn git_status(&self, directory: &str) -> BackendResult<Option<GitStatusReport>> {
        let script = self.script();
        if let Some(e) = &script.git_error {
            return Err(e.clone());
        }
        Ok(script.git.get(directory).cloned().unwrap_or(None))
    }

    fn list_pages(&self, directory: &str) -> BackendResult<Vec<SavedPage>> {
        Ok(self.script().pages.get(directory).cloned().unwrap_or_default())
    }

    fn save_page(&self, directory: &str, url: &str) -> BackendResult<SavedPage> {
        let mut script = self.script();
        if let Some(e) = &script.save_page_error {
            return Err(e.clone());
        }
        let page = SavedPage { url: url.to_string(), title: url.to_string(), token_count: 10, favicon: None };
        script.pages.entry(directory.to_string()).or_default().push(page.clone());
        Ok(page)
    }

    fn delete_page(&self, directory: &str, url: &str) -> BackendResult<()> {
        if let Some(pages) = self.script().pages.get_mut(directory) {
            pages.retain(|p| p.url != url);
        }
        Ok(())
    }

    fn rename_page(&self, directory: &str, url: &str, title: &str) -> BackendResult<()> {
        let mut script = self.script();
        let page = script
            .pages
            .get_mut(directory)
            .and_then(|pages| pages.iter_mut().find(|p| p.url == url))
            .ok_or_else(|| BackendError::NotFound(url.to_string()))?;
        page.title = title.to_string();
        Ok(())
    }

    fn list_instructions(&self, directory: &str) -> BackendResult<Vec<SavedInstruction>> {
        Ok(self.script().instructions.get(directory).cloned().unwrap_or_default())
    }

    fn get_instruction(&self, directory: &str, id: &str) -> BackendResult<SavedInstruction> {
        self.script()
            .instructions
            .get(directory)
            .and_then(|list| list.iter().find(|i| i.id == id).cloned())
            .ok_or_else(|| BackendError::NotFound(id.to_string()))
    }

    fn upsert_instruction(
        &self,
        directory: &str,
        id: Option<&str>,
        name: &str,
        content: &str,
    ) -> BackendResult<String> {
        let mut script = self.script();
        let list = script.instructions.entry(directory.to_string()).or_default();
        match id {
            Some(id) => {
                let existing =
                    list.iter_mut().find(|i| i.id == id).ok_or_else(|| BackendError::NotFound(id.to_string()))?;
                existing.name = name.to_string();
                existing.content = content.to_string();
                existing.token_count = words(content);
                Ok(id.to_string())
            }
            None => {
                let id = format!("i{}", self.next_id.fetch_add(1, Ordering::SeqCst));
                list.push(SavedInstruction {
                    id: id.clone(),
                    name: name.to_string(),
                    content: content.to_string(),
                    token_count: words(content),
                });
                Ok(id)
            }
        }
    }

    fn delete_instructions(&self, directory: &str, ids: &[String]) -> BackendResult<()> {
        if let Some(list) = self.script().instructions.get_mut(directory) {
            list.retain(|i| !ids.contains(&i.id));
        }
        Ok(())
    }

    fn count_tokens(&self, text: &str) -> BackendResult<usize> {
        lock(&self.counted).push(text.to_string());
        Ok(words(text))
    }

    fn copy_composition(&self, composition: &CompositionRequest) -> BackendResult<()> {
        lock(&self.copies).push(composition.clone());
        Ok(())
    }

    fn subscribe(&self, topic: Topic, directory: &str, sink: PushSink) -> BackendResult<Subscription> {
        let live = Arc::new(AtomicBool::new(true));
        lock(&self.sinks).push(Sink { topic, directory: directory.to_string(), tx: sink, live: live.clone() });
        Ok(Subscription::new(topic, directory, move || live.store(false, Ordering::SeqCst)))
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn composer(backend: Arc<ScriptedBackend>) -> Composer {
    Composer::new(backend, EngineConfig::load())
}

pub fn file(root: &str, name: &str) -> TreeNode {
    TreeNode::file(&format!("{}/{}", root, name), name)
}

pub fn page(url: &str, tokens: usize) -> SavedPage {
    SavedPage { url: url.to_string(), title: url.to_string(), token_count: tokens, favicon: None }
}

pub fn instruction(id: &str, tokens: usize) -> SavedInstruction {
    SavedInstruction { id: id.to_string(), name: id.to_string(), content: "x ".repeat(tokens), token_count: tokens }
}

pub fn modified(path: &str, added: u32, deleted: u32) -> GitChange {
    GitChange {
        path: path.to_string(),
        change_type: GitChangeType::Modified,
        lines_added: added,
        lines_deleted: deleted,
        token_count: None,
    }
}

/// `/proj` with two files, one modified file in git, two pages and one
/// instruction; `/other` with a single file and no repository.
pub fn two_projects() -> Script {
    let mut script = Script::default();
    script.trees.insert("/proj".into(), vec![file("/proj", "a.py"), file("/proj", "b.py")]);
    script.trees.insert("/other".into(), vec![file("/other", "z.rs")]);
    script
        .git
        .insert("/proj".into(), Some(GitStatusReport { results: vec![modified("a.py", 3, 1)], truncated: false }));
    script.git.insert("/other".into(), None);
    script.pages.insert("/proj".into(), vec![page("https://a.dev", 30), page("https://b.dev", 20)]);
    script.instructions.insert("/proj".into(), vec![instruction("i-review", 4)]);
    script
}
