//! In-process computation backend.
//!
//! Implements every [`Backend`] call against the local filesystem, the git
//! CLI and HTTP, and delivers push events from background threads.

pub mod clipboard;
pub mod git;
pub mod index;
pub mod instructions;
pub mod pages;
pub mod process;
pub mod render;
pub mod search;
pub mod select;
pub mod store;
pub mod tokens;
pub mod watch;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, info};

use cc_base::backend::{Backend, PushSink, Subscription};
use cc_base::config::EngineConfig;
use cc_base::error::BackendResult;
use cc_base::types::{
    CompositionRequest, GitStatusReport, IdSet, PushEvent, SavedInstruction, SavedPage, SearchResult, SelectedFile,
    SelectionResult, ToggleRequest, Topic, Tree, TreeDisplayMode,
};

use crate::clipboard::{ResolvedSources, render_composition, write_clipboard};
use crate::git::GitCli;
use crate::index::TreeIndex;
use crate::instructions::InstructionStore;
use crate::pages::{PageFetcher, PageStore};
use crate::render::render_tree;
use crate::tokens::TokenCache;
use crate::watch::{GitPushContext, GitWatchers, PushHub};

pub struct LocalBackend {
    data_dir: PathBuf,
    config: EngineConfig,
    indexes: Mutex<HashMap<String, Arc<TreeIndex>>>,
    tokens: Arc<TokenCache>,
    git: GitCli,
    fetcher: PageFetcher,
    hub: Arc<PushHub>,
    watchers: Arc<GitWatchers>,
}

impl LocalBackend {
    /// Stores pages and instructions under `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>, config: EngineConfig) -> Self {
        Self {
            data_dir: data_dir.into(),
            tokens: Arc::new(TokenCache::new(config.chars_per_token)),
            git: GitCli::new(config.git_timeout_secs),
            fetcher: PageFetcher::new(config.http_timeout_secs),
            config,
            indexes: Mutex::new(HashMap::new()),
            hub: Arc::new(PushHub::new()),
            watchers: Arc::new(GitWatchers::new()),
        }
    }

    /// Index for `directory`; rescanned when `refresh` is set or none is cached.
    fn index(&self, directory: &str, refresh: bool) -> BackendResult<Arc<TreeIndex>> {
        if !refresh {
            let indexes = self.indexes.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(index) = indexes.get(directory) {
                return Ok(index.clone());
            }
        }
        let index = Arc::new(TreeIndex::scan(directory)?);
        debug!(directory, nodes = index.len(), "directory indexed");
        let mut indexes = self.indexes.lock().unwrap_or_else(|e| e.into_inner());
        indexes.insert(directory.to_string(), index.clone());
        Ok(index)
    }

    fn selected_files(&self, index: &TreeIndex, selected: &IdSet) -> Vec<SelectedFile> {
        select::selected_file_ids(index, selected)
            .into_iter()
            .map(|path| SelectedFile {
                title: index.get(&path).map(|n| n.title.clone()).unwrap_or_default(),
                token_count: self.tokens.cached(&path),
                token_percentage: None,
                path,
            })
            .collect()
    }

    /// Count the selection off-thread and push `file-token-counts`.
    fn spawn_file_token_count(&self, directory: &str, paths: Vec<String>) {
        let hub = self.hub.clone();
        let tokens = self.tokens.clone();
        let root = directory.to_string();
        thread::spawn(move || {
            let (files, total) = tokens.count_selection(&paths);
            hub.publish(PushEvent::FileTokenCounts { root, files, total });
        });
    }

    fn git_push_context(&self) -> GitPushContext {
        GitPushContext {
            hub: self.hub.clone(),
            git: self.git,
            tokens: self.tokens.clone(),
            settle: self.config.git_watch_settle(),
        }
    }
}

impl Backend for LocalBackend {
    fn search_tree(&self, directory: &str, query: Option<&str>) -> BackendResult<SearchResult> {
        let refresh = query.is_none_or(|q| q.trim().is_empty());
        let index = self.index(directory, refresh)?;
        search::search(&index, query)
    }

    fn toggle_selection(&self, request: &ToggleRequest) -> BackendResult<SelectionResult> {
        let index = TreeIndex::from_tree(&request.tree);
        let (selected, indeterminate) = select::toggle(&index, &request.current, &request.node_id);
        let selected_files = self.selected_files(&index, &selected);
        self.spawn_file_token_count(&request.directory, selected_files.iter().map(|f| f.path.clone()).collect());
        Ok(SelectionResult { selected, indeterminate, selected_files })
    }

    fn clear_selection(&self, directory: &str, _mode: TreeDisplayMode, _tree: &Tree) -> BackendResult<SelectionResult> {
        self.spawn_file_token_count(directory, Vec::new());
        Ok(SelectionResult::default())
    }

    fn count_tree_tokens(&self, mode: TreeDisplayMode, tree: &Tree, selected: &IdSet) -> BackendResult<usize> {
        Ok(self.tokens.estimate(&render_tree(mode, tree, selected)))
    }

    fn git_status(&self, directory: &str) -> BackendResult<Option<GitStatusReport>> {
        let status = self.git.status(directory)?;
        // Diff token counts follow on the push channel.
        if status.is_some() && self.hub.has_subscribers(Topic::GitTokenCounts, directory) {
            let ctx = self.git_push_context();
            let root = directory.to_string();
            thread::spawn(move || {
                let tokens = ctx.tokens.clone();
                match ctx.git.diff_tokens(&root, |diff| tokens.estimate(diff)) {
                    Ok(files) => ctx.hub.publish(PushEvent::GitTokenCounts { root, files }),
                    Err(e) => debug!(directory = %root, error = %e, "git diff token count failed"),
                }
            });
        }
        Ok(status)
    }

    fn list_pages(&self, directory: &str) -> BackendResult<Vec<SavedPage>> {
        PageStore::open(&self.data_dir, directory).list()
    }

    fn save_page(&self, directory: &str, url: &str) -> BackendResult<SavedPage> {
        let page = self.fetcher.fetch(url)?;
        let body = format!("# {}\n\n{}", page.title, page.body);
        let tokens = self.tokens.estimate(&body);
        PageStore::open(&self.data_dir, directory).save(url, &page.title, &body, tokens, page.favicon)
    }

    fn delete_page(&self, directory: &str, url: &str) -> BackendResult<()> {
        PageStore::open(&self.data_dir, directory).delete(url)
    }

    fn rename_page(&self, directory: &str, url: &str, title: &str) -> BackendResult<()> {
        PageStore::open(&self.data_dir, directory).rename(url, title)
    }

    fn list_instructions(&self, directory: &str) -> BackendResult<Vec<SavedInstruction>> {
        InstructionStore::open(&self.data_dir, directory).list()
    }

    fn get_instruction(&self, directory: &str, id: &str) -> BackendResult<SavedInstruction> {
        InstructionStore::open(&self.data_dir, directory).get(id)
    }

    fn upsert_instruction(
        &self,
        directory: &str,
        id: Option<&str>,
        name: &str,
        content: &str,
    ) -> BackendResult<String> {
        let tokens = self.tokens.estimate(content);
        InstructionStore::open(&self.data_dir, directory).upsert(id, name, content, tokens)
    }

    fn delete_instructions(&self, directory: &str, ids: &[String]) -> BackendResult<()> {
        InstructionStore::open(&self.data_dir, directory).delete(ids)
    }

    fn count_tokens(&self, text: &str) -> BackendResult<usize> {
        Ok(self.tokens.estimate(text))
    }

    fn copy_composition(&self, composition: &CompositionRequest) -> BackendResult<()> {
        let paths: Vec<String> = composition.git_diff_paths.iter().cloned().collect();
        let git_diff = if paths.is_empty() { String::new() } else { self.git.diff_text(&composition.root, &paths)? };

        let urls: Vec<String> = composition.urls.iter().cloned().collect();
        let pages = PageStore::open(&self.data_dir, &composition.root).contents(&urls)?;

        let instructions = InstructionStore::open(&self.data_dir, &composition.root)
            .list()?
            .into_iter()
            .filter(|i| composition.instruction_ids.contains(&i.id))
            .collect();

        let text = render_composition(composition, &ResolvedSources { git_diff, pages, instructions })?;
        write_clipboard(&text)?;
        info!(directory = %composition.root, chars = text.len(), "composition copied");
        Ok(())
    }

    fn subscribe(&self, topic: Topic, directory: &str, sink: PushSink) -> BackendResult<Subscription> {
        let watches_git = matches!(topic, Topic::GitStatus | Topic::GitTokenCounts);
        if watches_git {
            self.watchers.ensure(directory, self.git_push_context())?;
        }
        let id = self.hub.register(topic, directory, sink);
        debug!(topic = topic.as_str(), directory, "subscribed");

        let hub = self.hub.clone();
        let watchers = self.watchers.clone();
        let root = directory.to_string();
        Ok(Subscription::new(topic, directory, move || {
            hub.unregister(topic, &root, id);
            let git_listeners =
                hub.has_subscribers(Topic::GitStatus, &root) || hub.has_subscribers(Topic::GitTokenCounts, &root);
            if watches_git && !git_listeners {
                watchers.release(&root);
            }
            debug!(topic = topic.as_str(), directory = %root, "unsubscribed");
        }))
    }
}
