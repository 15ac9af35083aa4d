//! The composition root: owns every store, issues backend calls through
//! the dispatcher and applies their results one at a time.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use cc_base::backend::Backend;
use cc_base::config::EngineConfig;
use cc_base::error::BackendError;
use cc_base::modules::Module;
use cc_base::notifications::Notification;
use cc_base::seq::SeqSource;
use cc_base::state::State;
use cc_base::types::{DirectoryInfo, SelectedFile, ToggleRequest, TreeDisplayMode};
use cc_mod_files::{FilesState, SelectionOp};
use cc_mod_git::GitState;
use cc_mod_instructions::InstructionsState;
use cc_mod_web::WebState;

use crate::aggregate::{TokenBreakdown, breakdown};
use crate::background::{Dispatcher, Lane};
use crate::modules::all_modules;
use crate::reconciler::{Reconciler, apply_push};
use crate::snapshot::CompositionSnapshot;
use crate::update::{InstructionAction, ListOutcome, PageAction, Update};

pub struct Composer {
    backend: Arc<dyn Backend>,
    config: EngineConfig,
    state: State,
    modules: Vec<Box<dyn Module>>,
    seq: SeqSource,
    dispatcher: Dispatcher,
    reconciler: Reconciler,
    updates: Receiver<Update>,
    /// Round trips submitted but not yet applied.
    in_flight: usize,
}

impl Composer {
    pub fn new(backend: Arc<dyn Backend>, config: EngineConfig) -> Self {
        let (tx, updates) = mpsc::channel();
        let modules = all_modules(&config);
        let mut state = State::new(config.notification_capacity);
        for module in &modules {
            module.init_state(&mut state);
        }
        Self {
            backend,
            state,
            modules,
            seq: SeqSource::default(),
            dispatcher: Dispatcher::new(tx.clone()),
            reconciler: Reconciler::new(tx),
            updates,
            in_flight: 0,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn files(&self) -> &FilesState {
        FilesState::get(&self.state)
    }

    pub fn git(&self) -> &GitState {
        GitState::get(&self.state)
    }

    pub fn web(&self) -> &WebState {
        WebState::get(&self.state)
    }

    pub fn instructions(&self) -> &InstructionsState {
        InstructionsState::get(&self.state)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    fn active_root(&self) -> Option<String> {
        self.state.root().map(str::to_string)
    }

    fn submit(&mut self, lane: Lane, job: impl FnOnce() -> Update + Send + 'static) {
        self.in_flight += 1;
        self.dispatcher.submit(lane, job);
    }

    /// Surface a failure on the notification channel. Cancellations stay silent.
    fn report_failure(&mut self, title: &str, error: &BackendError) {
        if error.is_cancelled() {
            debug!(title, "cancelled by user");
            return;
        }
        warn!(title, error = %error, "request failed");
        self.state.notifications.push(title, error.to_string());
    }

    // =========================================================================
    // Directory lifecycle
    // =========================================================================

    /// Reset every store, then load the directory's tree, git status, pages
    /// and instructions in parallel.
    pub fn open_directory(&mut self, directory: DirectoryInfo) {
        info!(directory = %directory.path, "opening directory");
        self.reconciler.close();
        self.reset_stores();
        let root = directory.path.clone();
        self.state.directory = Some(directory);

        for (topic, e) in self.reconciler.open(self.backend.as_ref(), &root) {
            debug!(topic = topic.as_str(), "push updates unavailable");
            self.report_failure("Failed to watch for changes", &e);
        }

        self.search_tree("");
        self.refresh_git_status();
        self.reload_pages();
        self.reload_instructions();
    }

    pub fn exit_directory(&mut self) {
        let Some(directory) = self.state.directory.take() else {
            return;
        };
        info!(directory = %directory.path, "exiting directory");
        self.reconciler.close();
        self.reset_stores();
    }

    pub fn directory(&self) -> Option<&DirectoryInfo> {
        self.state.directory.as_ref()
    }

    fn reset_stores(&mut self) {
        for module in &self.modules {
            debug!(module = module.id(), "resetting store");
            module.reset_state(&mut self.state);
        }
        self.state.touch();
    }

    // =========================================================================
    // Files
    // =========================================================================

    /// Filter the tree; an empty query reloads the canonical tree.
    pub fn search_tree(&mut self, query: &str) {
        let Some(root) = self.active_root() else {
            return;
        };
        let seq = self.seq.next();
        let canonical = query.trim().is_empty();
        let fs = FilesState::get_mut(&mut self.state);
        if canonical {
            fs.tree_request.issue(seq);
        }
        fs.search_request.issue(seq);
        debug!(directory = %root, seq, domain = "files", query, canonical, "search issued");

        let backend = self.backend.clone();
        let query = query.to_string();
        self.submit(Lane::Tree, move || {
            let filter = if canonical { None } else { Some(query.as_str()) };
            let result = backend.search_tree(&root, filter);
            Update::Search { root, seq, query, result }
        });
    }

    pub fn toggle_node(&mut self, id: &str) {
        self.queue_selection(SelectionOp::Toggle(id.to_string()));
    }

    pub fn clear_selection(&mut self) {
        self.queue_selection(SelectionOp::Clear);
    }

    /// Selection round trips run one at a time, each against the selection
    /// its predecessor installed and never before the canonical tree landed.
    fn queue_selection(&mut self, op: SelectionOp) {
        if self.state.directory.is_none() {
            return;
        }
        FilesState::get_mut(&mut self.state).pending_selection.push_back(op);
        self.start_next_selection();
    }

    fn start_next_selection(&mut self) {
        let Some(root) = self.active_root() else {
            return;
        };
        let fs = FilesState::get_mut(&mut self.state);
        if fs.selection_request.in_flight() || fs.tree_request.in_flight() {
            return;
        }
        let Some(op) = fs.pending_selection.pop_front() else {
            return;
        };
        let seq = self.seq.next();
        fs.selection_request.issue(seq);
        let (mode, tree, current) = (fs.display_mode, fs.tree.clone(), fs.selected.clone());
        debug!(directory = %root, seq, domain = "files", op = ?op, "selection issued");

        let backend = self.backend.clone();
        self.submit(Lane::Selection, move || {
            let result = match op {
                SelectionOp::Toggle(node_id) => backend.toggle_selection(&ToggleRequest {
                    directory: root.clone(),
                    current,
                    node_id,
                    display_mode: mode,
                    tree,
                }),
                SelectionOp::Clear => backend.clear_selection(&root, mode, &tree),
            };
            Update::Selection { root, seq, result }
        });
    }

    pub fn set_display_mode(&mut self, mode: TreeDisplayMode) {
        let fs = FilesState::get_mut(&mut self.state);
        if fs.display_mode == mode {
            return;
        }
        fs.display_mode = mode;
        self.state.touch();
        self.request_tree_recount();
    }

    /// Recount the rendered tree's tokens. Returns the request's tag.
    fn request_tree_recount(&mut self) -> Option<u64> {
        let root = self.active_root()?;
        let seq = self.seq.next();
        let fs = FilesState::get_mut(&mut self.state);
        fs.recount_request.issue(seq);
        let (mode, tree, selected) = (fs.display_mode, fs.tree.clone(), fs.selected.clone());

        let backend = self.backend.clone();
        self.submit(Lane::TreeTokens, move || {
            let result = backend.count_tree_tokens(mode, &tree, &selected);
            Update::TreeTokens { root, seq, result }
        });
        Some(seq)
    }

    pub fn selected_files_by_tokens(&self) -> Vec<SelectedFile> {
        cc_mod_files::sorted_by_tokens(&self.files().selected_files)
    }

    // =========================================================================
    // Git
    // =========================================================================

    pub fn refresh_git_status(&mut self) {
        let Some(root) = self.active_root() else {
            return;
        };
        let seq = self.seq.next();
        GitState::get_mut(&mut self.state).status_request.issue(seq);
        debug!(directory = %root, seq, domain = "git", "status issued");

        let backend = self.backend.clone();
        self.submit(Lane::Git, move || {
            let result = backend.git_status(&root);
            Update::GitStatus { root, seq, result }
        });
    }

    pub fn toggle_diff(&mut self, path: &str) -> bool {
        let changed = cc_mod_git::toggle_diff(&mut self.state, path);
        if changed {
            self.state.touch();
        }
        changed
    }

    pub fn select_all_diffs(&mut self) {
        cc_mod_git::select_all(&mut self.state);
        self.state.touch();
    }

    pub fn deselect_all_diffs(&mut self) {
        cc_mod_git::deselect_all(&mut self.state);
        self.state.touch();
    }

    // =========================================================================
    // Web pages
    // =========================================================================

    pub fn reload_pages(&mut self) {
        self.submit_pages(PageAction::Reload);
    }

    pub fn save_page(&mut self, url: &str) {
        self.submit_pages(PageAction::Save(url.to_string()));
    }

    pub fn delete_page(&mut self, url: &str) {
        self.submit_pages(PageAction::Delete(url.to_string()));
    }

    pub fn rename_page(&mut self, url: &str, title: &str) {
        self.submit_pages(PageAction::Rename { url: url.to_string(), title: title.to_string() });
    }

    /// Run the page call, then reload the list on the same lane so the
    /// installed list always reflects every mutation issued before it.
    fn submit_pages(&mut self, action: PageAction) {
        let Some(root) = self.active_root() else {
            return;
        };
        let seq = self.seq.next();
        WebState::get_mut(&mut self.state).list_request.issue(seq);
        debug!(directory = %root, seq, domain = "web", action = ?action, "page call issued");

        let backend = self.backend.clone();
        self.submit(Lane::Pages, move || {
            let mutation = match &action {
                PageAction::Reload => Ok(()),
                PageAction::Save(url) => backend.save_page(&root, url).map(|_| ()),
                PageAction::Delete(url) => backend.delete_page(&root, url),
                PageAction::Rename { url, title } => backend.rename_page(&root, url, title),
            };
            let outcome = ListOutcome::after(mutation, || backend.list_pages(&root));
            Update::Pages { root, seq, action, outcome }
        });
    }

    pub fn toggle_page(&mut self, url: &str) -> bool {
        let changed = cc_mod_web::toggle_page(&mut self.state, url);
        if changed {
            self.state.touch();
        }
        changed
    }

    pub fn select_all_pages(&mut self) {
        cc_mod_web::select_all(&mut self.state);
        self.state.touch();
    }

    pub fn deselect_all_pages(&mut self) {
        cc_mod_web::deselect_all(&mut self.state);
        self.state.touch();
    }

    // =========================================================================
    // Instructions
    // =========================================================================

    pub fn reload_instructions(&mut self) {
        self.submit_instructions(InstructionAction::Reload);
    }

    pub fn upsert_instruction(&mut self, id: Option<&str>, name: &str, content: &str) {
        self.submit_instructions(InstructionAction::Upsert {
            id: id.map(str::to_string),
            name: name.to_string(),
            content: content.to_string(),
        });
    }

    pub fn delete_instructions(&mut self, ids: &[String]) {
        self.submit_instructions(InstructionAction::Delete(ids.to_vec()));
    }

    fn submit_instructions(&mut self, action: InstructionAction) {
        let Some(root) = self.active_root() else {
            return;
        };
        let seq = self.seq.next();
        InstructionsState::get_mut(&mut self.state).list_request.issue(seq);
        debug!(directory = %root, seq, domain = "instructions", "instruction call issued");

        let backend = self.backend.clone();
        self.submit(Lane::Instructions, move || {
            let mutation = match &action {
                InstructionAction::Reload => Ok(()),
                InstructionAction::Upsert { id, name, content } => {
                    backend.upsert_instruction(&root, id.as_deref(), name, content).map(|_| ())
                }
                InstructionAction::Delete(ids) => backend.delete_instructions(&root, ids),
            };
            let outcome = ListOutcome::after(mutation, || backend.list_instructions(&root));
            Update::Instructions { root, seq, action, outcome }
        });
    }

    /// Fetch a saved instruction's full content and open it in the editor.
    pub fn load_instruction(&mut self, id: &str) {
        let Some(root) = self.active_root() else {
            return;
        };
        let seq = self.seq.next();
        InstructionsState::get_mut(&mut self.state).load_request.issue(seq);

        let backend = self.backend.clone();
        let id = id.to_string();
        self.submit(Lane::Instructions, move || {
            let result = backend.get_instruction(&root, &id);
            Update::InstructionLoaded { root, seq, result }
        });
    }

    pub fn cancel_edit(&mut self) {
        cc_mod_instructions::cancel_edit(&mut self.state);
        self.state.touch();
    }

    pub fn toggle_instruction(&mut self, id: &str) -> bool {
        let changed = cc_mod_instructions::toggle_instruction(&mut self.state, id);
        if changed {
            self.state.touch();
        }
        changed
    }

    /// Also includes the draft.
    pub fn select_all_instructions(&mut self) {
        cc_mod_instructions::select_all(&mut self.state);
        self.state.touch();
    }

    /// Also excludes the draft.
    pub fn deselect_all_instructions(&mut self) {
        cc_mod_instructions::deselect_all(&mut self.state);
        self.state.touch();
    }

    pub fn edit_draft(&mut self, name: &str, content: &str, now: Instant) {
        cc_mod_instructions::edit_draft(&mut self.state, name, content, now);
        self.state.touch();
    }

    pub fn set_draft_included(&mut self, included: bool) {
        cc_mod_instructions::set_draft_included(&mut self.state, included);
        self.state.touch();
    }

    pub fn clear_draft(&mut self) {
        cc_mod_instructions::clear_draft(&mut self.state);
        self.state.touch();
    }

    /// When the next `tick` has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        cc_mod_instructions::draft_deadline(&self.state)
    }

    /// Timer-driven work: fires the draft token count once its debounce
    /// window has elapsed.
    pub fn tick(&mut self, now: Instant) {
        let Some(root) = self.active_root() else {
            return;
        };
        let Some((revision, text)) = cc_mod_instructions::poll_draft(&mut self.state, now) else {
            return;
        };
        debug!(directory = %root, revision, domain = "instructions", "draft count issued");
        let backend = self.backend.clone();
        self.submit(Lane::DraftTokens, move || {
            let result = backend.count_tokens(&text);
            Update::DraftTokens { root, revision, result }
        });
    }

    // =========================================================================
    // Event loop
    // =========================================================================

    /// Apply every pending update without blocking. Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(update) = self.updates.try_recv() {
            self.apply(update);
            applied += 1;
        }
        applied
    }

    /// Block until nothing is in flight and the channel is drained. Returns
    /// false if `timeout` elapsed first.
    pub fn pump_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            if self.in_flight == 0 {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            match self.updates.recv_timeout(deadline - now) {
                Ok(update) => self.apply(update),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }

    /// Like [`Composer::pump_until_idle`], then keep applying pushes until
    /// none arrived for `quiet`.
    pub fn pump_until_quiet(&mut self, quiet: Duration, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        if !self.pump_until_idle(timeout) {
            return false;
        }
        loop {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            match self.updates.recv_timeout(quiet.min(deadline - now)) {
                Ok(update) => self.apply(update),
                Err(RecvTimeoutError::Timeout) => {
                    if self.in_flight == 0 {
                        return true;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }

    fn in_scope(&self, root: &str, seq: u64, domain: &'static str) -> bool {
        if self.state.is_active(root) {
            return true;
        }
        debug!(directory = root, seq, domain, "response for inactive directory dropped");
        false
    }

    fn stale(seq: u64, domain: &'static str) -> bool {
        debug!(seq, domain, "stale response dropped");
        false
    }

    fn apply(&mut self, update: Update) {
        if update.is_response() {
            self.in_flight = self.in_flight.saturating_sub(1);
        }
        if self.apply_update(update) {
            self.state.touch();
        }
    }

    /// Install one update atomically. Returns true if a store changed.
    fn apply_update(&mut self, update: Update) -> bool {
        match update {
            Update::Search { root, seq, query, result } => {
                if !self.in_scope(&root, seq, "files") {
                    return false;
                }
                let fs = FilesState::get_mut(&mut self.state);
                let tree_current = query.trim().is_empty() && fs.tree_request.settle(seq);
                let view_current = fs.search_request.settle(seq);
                if !tree_current && !view_current {
                    return Self::stale(seq, "files");
                }
                let changed = match result {
                    Ok(result) => {
                        if tree_current {
                            cc_mod_files::install_tree(&mut self.state, result.results.clone());
                            self.request_tree_recount();
                        }
                        if view_current {
                            cc_mod_files::install_search(&mut self.state, &query, result);
                        }
                        true
                    }
                    Err(e) if e.is_cancelled() => false,
                    Err(e) => {
                        if view_current {
                            cc_mod_files::clear_search_results(&mut self.state);
                        }
                        self.report_failure("Failed to search files", &e);
                        true
                    }
                };
                if tree_current {
                    self.start_next_selection();
                }
                changed
            }

            Update::Selection { root, seq, result } => {
                if !self.in_scope(&root, seq, "files") {
                    return false;
                }
                if !FilesState::get_mut(&mut self.state).selection_request.settle(seq) {
                    return Self::stale(seq, "files");
                }
                let changed = match result {
                    Ok(selection) => {
                        cc_mod_files::install_selection(&mut self.state, selection);
                        self.request_tree_recount();
                        true
                    }
                    Err(e) => {
                        self.report_failure("Failed to update selection", &e);
                        false
                    }
                };
                self.start_next_selection();
                changed
            }

            Update::TreeTokens { root, seq, result } => {
                if !self.in_scope(&root, seq, "files") {
                    return false;
                }
                if !FilesState::get_mut(&mut self.state).recount_request.settle(seq) {
                    return Self::stale(seq, "files");
                }
                let tokens = match result {
                    Ok(tokens) => tokens,
                    Err(e) if e.is_cancelled() => return false,
                    Err(e) => {
                        self.report_failure("Failed to count tree tokens", &e);
                        0
                    }
                };
                FilesState::get_mut(&mut self.state).tree_token_count = tokens;
                true
            }

            Update::GitStatus { root, seq, result } => {
                if !self.in_scope(&root, seq, "git") {
                    return false;
                }
                if !GitState::get_mut(&mut self.state).status_request.settle(seq) {
                    return Self::stale(seq, "git");
                }
                match result {
                    Ok(report) => cc_mod_git::install_status(&mut self.state, report),
                    Err(e) if e.is_cancelled() => false,
                    Err(e) => {
                        cc_mod_git::mark_unknown(&mut self.state);
                        self.report_failure("Failed to load git status", &e);
                        true
                    }
                }
            }

            Update::Pages { root, seq, action, outcome } => {
                if !self.in_scope(&root, seq, "web") {
                    return false;
                }
                let latest = WebState::get_mut(&mut self.state).list_request.settle(seq);
                let ListOutcome { mutation, list } = outcome;
                if let Err(e) = &mutation {
                    self.report_failure(action.failure_title(), e);
                }
                if !latest {
                    return Self::stale(seq, "web");
                }
                match list {
                    Ok(pages) => {
                        cc_mod_web::install_pages(&mut self.state, pages);
                        true
                    }
                    Err(e) if e.is_cancelled() => false,
                    Err(e) => {
                        cc_mod_web::install_pages(&mut self.state, Vec::new());
                        self.report_failure(PageAction::Reload.failure_title(), &e);
                        true
                    }
                }
            }

            Update::Instructions { root, seq, action, outcome } => {
                if !self.in_scope(&root, seq, "instructions") {
                    return false;
                }
                let latest = InstructionsState::get_mut(&mut self.state).list_request.settle(seq);
                let ListOutcome { mutation, list } = outcome;
                match (&action, &mutation) {
                    (InstructionAction::Upsert { id, content, .. }, Ok(())) => {
                        self.finish_draft_save(id.as_deref(), content);
                    }
                    (_, Err(e)) => self.report_failure(action.failure_title(), e),
                    _ => {}
                }
                if !latest {
                    return Self::stale(seq, "instructions");
                }
                match list {
                    Ok(instructions) => {
                        cc_mod_instructions::install_instructions(&mut self.state, instructions);
                        true
                    }
                    Err(e) if e.is_cancelled() => false,
                    Err(e) => {
                        cc_mod_instructions::install_instructions(&mut self.state, Vec::new());
                        self.report_failure(InstructionAction::Reload.failure_title(), &e);
                        true
                    }
                }
            }

            Update::InstructionLoaded { root, seq, result } => {
                if !self.in_scope(&root, seq, "instructions") {
                    return false;
                }
                if !InstructionsState::get_mut(&mut self.state).load_request.settle(seq) {
                    return Self::stale(seq, "instructions");
                }
                match result {
                    Ok(instruction) => {
                        cc_mod_instructions::begin_edit(&mut self.state, instruction);
                        true
                    }
                    Err(e) => {
                        self.report_failure("Failed to load instruction", &e);
                        false
                    }
                }
            }

            Update::DraftTokens { root, revision, result } => {
                if !self.in_scope(&root, revision, "instructions") {
                    return false;
                }
                match result {
                    Ok(tokens) => cc_mod_instructions::install_draft_tokens(&mut self.state, revision, tokens),
                    Err(e) if e.is_cancelled() => false,
                    Err(e) => {
                        let current = cc_mod_instructions::install_draft_tokens(&mut self.state, revision, 0);
                        if current {
                            self.report_failure("Failed to count instruction tokens", &e);
                        }
                        current
                    }
                }
            }

            Update::Copied { root, result } => {
                match result {
                    Ok(()) => info!(directory = %root, "composition on clipboard"),
                    Err(e) => self.report_failure("Failed to copy to clipboard", &e),
                }
                false
            }

            Update::Push(event) => apply_push(&mut self.state, event),
        }
    }

    /// A saved draft (or the instruction under edit) leaves the editor.
    fn finish_draft_save(&mut self, id: Option<&str>, content: &str) {
        let is = InstructionsState::get(&self.state);
        let saved_edit = id.is_some() && is.editing.as_deref() == id;
        let saved_draft = id.is_none() && is.editing.is_none() && is.draft.content == content;
        if saved_edit || saved_draft {
            cc_mod_instructions::clear_draft(&mut self.state);
        }
    }

    // =========================================================================
    // Read side
    // =========================================================================

    pub fn tokens(&self) -> TokenBreakdown {
        breakdown(&self.state, &self.modules)
    }

    /// Consistent copy of the current composition; `None` without a directory.
    pub fn snapshot(&self) -> Option<CompositionSnapshot> {
        CompositionSnapshot::capture(&self.state, self.tokens())
    }

    pub fn notifications(&self) -> impl Iterator<Item = &Notification> {
        self.state.notifications.iter()
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.state.notifications.drain()
    }

    /// Send the current composition to the clipboard. Returns false when
    /// there is no directory to compose from.
    pub fn copy_to_clipboard(&mut self) -> bool {
        let Some(snapshot) = self.snapshot() else {
            return false;
        };
        let request = snapshot.to_request();
        info!(
            directory = %request.root,
            files = request.selected_nodes.len(),
            diffs = request.git_diff_paths.len(),
            pages = request.urls.len(),
            tokens = snapshot.tokens.total,
            "copying composition"
        );
        let backend = self.backend.clone();
        self.submit(Lane::Clipboard, move || {
            let result = backend.copy_composition(&request);
            Update::Copied { root: request.root, result }
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cc_base::types::{GitStatusReport, SavedPage};
    use cc_local::LocalBackend;
    use pretty_assertions::assert_eq;
    use std::fs;

    const WAIT: Duration = Duration::from_secs(10);

    struct Fixture {
        project: tempfile::TempDir,
        _data: tempfile::TempDir,
        composer: Composer,
    }

    impl Fixture {
        fn new() -> Self {
            let project = tempfile::tempdir().expect("tempdir");
            let data = tempfile::tempdir().expect("tempdir");
            fs::write(project.path().join("a.py"), "print('a')\n").expect("write");
            let config = EngineConfig::load();
            let backend = Arc::new(LocalBackend::new(data.path(), config.clone()));
            Self { project, _data: data, composer: Composer::new(backend, config) }
        }

        fn root(&self) -> String {
            self.project.path().to_string_lossy().to_string()
        }

        fn open(&mut self) {
            let dir = DirectoryInfo::from_path(&self.root());
            self.composer.open_directory(dir);
            assert!(self.composer.pump_until_idle(WAIT));
        }
    }

    #[test]
    fn stale_tree_recount_is_dropped() {
        let mut fx = Fixture::new();
        fx.open();
        let root = fx.root();
        let older = fx.composer.request_tree_recount().expect("seq");
        let newer = fx.composer.request_tree_recount().expect("seq");

        fx.composer.apply(Update::TreeTokens { root: root.clone(), seq: newer, result: Ok(5) });
        fx.composer.apply(Update::TreeTokens { root, seq: older, result: Ok(99) });
        assert_eq!(fx.composer.tokens().tree, 5);
    }

    #[test]
    fn stale_selection_does_not_revert_newer() {
        let mut fx = Fixture::new();
        fx.open();
        let root = fx.root();
        let a = format!("{}/a.py", root);

        fx.composer.toggle_node(&a);
        assert!(fx.composer.pump_until_idle(WAIT));
        assert!(fx.composer.files().selected.contains(&a));

        // A response tagged with a request that was never the latest.
        fx.composer.apply(Update::Selection { root, seq: 1, result: Ok(Default::default()) });
        assert!(fx.composer.files().selected.contains(&a));
    }

    #[test]
    fn response_for_previous_directory_is_dropped() {
        let mut fx = Fixture::new();
        fx.open();
        let seq = fx.composer.seq.next();
        GitState::get_mut(&mut fx.composer.state).status_request.issue(seq);
        fx.composer.exit_directory();
        fx.composer.apply(Update::GitStatus {
            root: fx.root(),
            seq,
            result: Ok(Some(GitStatusReport::default())),
        });
        assert!(fx.composer.git().status.report().is_none());
        assert!(fx.composer.directory().is_none());
    }

    #[test]
    fn failed_git_status_becomes_unknown_with_notification() {
        let mut fx = Fixture::new();
        fx.open();
        let root = fx.root();
        let seq = fx.composer.seq.next();
        GitState::get_mut(&mut fx.composer.state).status_request.issue(seq);
        fx.composer.apply(Update::GitStatus { root, seq, result: Err(BackendError::Io("timed out".into())) });

        assert_eq!(fx.composer.git().status, cc_mod_git::GitStatus::Unknown);
        let notes = fx.composer.drain_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Failed to load git status");
    }

    #[test]
    fn cancelled_page_save_is_silent() {
        let mut fx = Fixture::new();
        fx.open();
        let root = fx.root();
        let page = SavedPage { url: "https://a.dev".into(), title: "A".into(), token_count: 3, favicon: None };
        cc_mod_web::install_pages(&mut fx.composer.state, vec![page.clone()]);
        let seq = fx.composer.seq.next();
        WebState::get_mut(&mut fx.composer.state).list_request.issue(seq);
        fx.composer.apply(Update::Pages {
            root,
            seq,
            action: PageAction::Save("https://b.dev".into()),
            outcome: ListOutcome { mutation: Err(BackendError::Cancelled), list: Ok(vec![page]) },
        });
        assert_eq!(fx.composer.web().pages.len(), 1);
        assert_eq!(fx.composer.notifications().count(), 0);
    }

    #[test]
    fn failed_mutation_still_installs_listed_pages() {
        let mut fx = Fixture::new();
        fx.open();
        let root = fx.root();
        let pages = vec![
            SavedPage { url: "https://a.dev".into(), title: "A".into(), token_count: 3, favicon: None },
            SavedPage { url: "https://b.dev".into(), title: "B".into(), token_count: 4, favicon: None },
        ];
        let reload = fx.composer.seq.next();
        let save = fx.composer.seq.next();
        WebState::get_mut(&mut fx.composer.state).list_request.issue(save);

        // The reload was superseded by the save, which then failed.
        fx.composer.apply(Update::Pages {
            root: root.clone(),
            seq: reload,
            action: PageAction::Reload,
            outcome: ListOutcome { mutation: Ok(()), list: Ok(pages.clone()) },
        });
        assert!(fx.composer.web().pages.is_empty());
        fx.composer.apply(Update::Pages {
            root,
            seq: save,
            action: PageAction::Save("https://c.dev".into()),
            outcome: ListOutcome { mutation: Err(BackendError::Process("500".into())), list: Ok(pages) },
        });

        assert_eq!(fx.composer.web().pages.len(), 2);
        let notes = fx.composer.drain_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Failed to save page");
    }

    #[test]
    fn display_mode_none_drops_tree_overhead() {
        let mut fx = Fixture::new();
        fx.open();
        let a = format!("{}/a.py", fx.root());
        fx.composer.toggle_node(&a);
        assert!(fx.composer.pump_until_idle(WAIT));
        assert!(fx.composer.tokens().tree > 0);

        fx.composer.set_display_mode(TreeDisplayMode::None);
        assert!(fx.composer.pump_until_idle(WAIT));
        assert_eq!(fx.composer.tokens().tree, 0);
    }
}
