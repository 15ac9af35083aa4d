//! Push delivery and the git working-tree watcher.
//!
//! [`PushHub`] fans events out to every sink subscribed to a topic for a
//! directory. [`GitWatchers`] keeps one recursive `notify` watcher per
//! directory with git subscribers; bursts of filesystem events are coalesced
//! for a settle window, then status and diff token counts are pushed.

use std::collections::HashMap;
use std::path::{Component, Path};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use cc_base::backend::PushSink;
use cc_base::error::{BackendError, BackendResult};
use cc_base::types::{PushEvent, Topic};

use crate::git::GitCli;
use crate::tokens::TokenCache;

type SinkMap = HashMap<(Topic, String), Vec<(u64, PushSink)>>;

#[derive(Debug, Default)]
pub struct PushHub {
    sinks: Mutex<SinkMap>,
    next_id: AtomicU64,
}

impl PushHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, topic: Topic, directory: &str, sink: PushSink) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut sinks = self.sinks.lock().unwrap_or_else(|e| e.into_inner());
        sinks.entry((topic, directory.to_string())).or_default().push((id, sink));
        id
    }

    pub fn unregister(&self, topic: Topic, directory: &str, id: u64) {
        let mut sinks = self.sinks.lock().unwrap_or_else(|e| e.into_inner());
        let key = (topic, directory.to_string());
        if let Some(list) = sinks.get_mut(&key) {
            list.retain(|(sid, _)| *sid != id);
            if list.is_empty() {
                sinks.remove(&key);
            }
        }
    }

    pub fn has_subscribers(&self, topic: Topic, directory: &str) -> bool {
        let sinks = self.sinks.lock().unwrap_or_else(|e| e.into_inner());
        sinks.contains_key(&(topic, directory.to_string()))
    }

    /// Deliver `event` to the sinks of its topic and directory. Sinks whose
    /// receiver is gone are dropped.
    pub fn publish(&self, event: PushEvent) {
        let key = (event.topic(), event.root().to_string());
        let mut sinks = self.sinks.lock().unwrap_or_else(|e| e.into_inner());
        let Some(list) = sinks.get_mut(&key) else {
            debug!(topic = key.0.as_str(), directory = %key.1, "push without subscribers");
            return;
        };
        list.retain(|(_, sink)| sink.send(event.clone()).is_ok());
        if list.is_empty() {
            sinks.remove(&key);
        }
    }
}

/// Everything the settle thread needs to recompute and push git state.
#[derive(Clone)]
pub struct GitPushContext {
    pub hub: Arc<PushHub>,
    pub git: GitCli,
    pub tokens: Arc<TokenCache>,
    pub settle: Duration,
}

impl GitPushContext {
    /// Recompute status, push it, then push per-file diff token counts.
    pub fn push_git_state(&self, root: &str) {
        match self.git.status(root) {
            Ok(Some(report)) => {
                self.hub.publish(PushEvent::GitStatusUpdated { root: root.to_string(), report });
            }
            Ok(None) => return,
            Err(e) => {
                warn!(directory = root, error = %e, "git status refresh failed");
                return;
            }
        }
        let tokens = self.tokens.clone();
        match self.git.diff_tokens(root, |diff| tokens.estimate(diff)) {
            Ok(files) => self.hub.publish(PushEvent::GitTokenCounts { root: root.to_string(), files }),
            Err(e) => warn!(directory = root, error = %e, "git diff token count failed"),
        }
    }
}

/// Whether a filesystem event can change what `git status` reports.
/// Git's own bookkeeping under `.git/` is ignored except for `HEAD` and refs,
/// otherwise every status run would trigger the next.
fn is_relevant(event: &Event) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event.paths.iter().any(|p| relevant_path(p))
}

fn relevant_path(path: &Path) -> bool {
    let parts: Vec<&str> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect();
    match parts.iter().position(|p| *p == ".git") {
        None => true,
        Some(i) => matches!(parts.get(i + 1), Some(&"HEAD") | Some(&"refs")),
    }
}

#[derive(Default)]
pub struct GitWatchers {
    watchers: Mutex<HashMap<String, RecommendedWatcher>>,
}

impl GitWatchers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_watching(&self, root: &str) -> bool {
        let watchers = self.watchers.lock().unwrap_or_else(|e| e.into_inner());
        watchers.contains_key(root)
    }

    /// Start watching `root` unless already watched.
    pub fn ensure(&self, root: &str, ctx: GitPushContext) -> BackendResult<()> {
        let mut watchers = self.watchers.lock().unwrap_or_else(|e| e.into_inner());
        if watchers.contains_key(root) {
            return Ok(());
        }
        if !Path::new(root).is_dir() {
            return Err(BackendError::NotFound(root.to_string()));
        }

        let (tx, rx) = mpsc::channel::<()>();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                if is_relevant(&event) {
                    let _ = tx.send(());
                }
            }
        })
        .map_err(|e| BackendError::Io(e.to_string()))?;
        watcher.watch(Path::new(root), RecursiveMode::Recursive).map_err(|e| BackendError::Io(e.to_string()))?;

        let settle_root = root.to_string();
        thread::spawn(move || {
            // Exits once the watcher (and with it the sender) is dropped.
            while rx.recv().is_ok() {
                loop {
                    match rx.recv_timeout(ctx.settle) {
                        Ok(()) => continue,
                        Err(RecvTimeoutError::Timeout) => break,
                        Err(RecvTimeoutError::Disconnected) => return,
                    }
                }
                debug!(directory = %settle_root, "working tree settled");
                ctx.push_git_state(&settle_root);
            }
        });

        debug!(directory = root, "git watcher started");
        watchers.insert(root.to_string(), watcher);
        Ok(())
    }

    pub fn release(&self, root: &str) {
        let mut watchers = self.watchers.lock().unwrap_or_else(|e| e.into_inner());
        if watchers.remove(root).is_some() {
            debug!(directory = root, "git watcher stopped");
        }
    }
}
