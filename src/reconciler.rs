//! Push subscriptions for the active directory and the merge of their
//! events into the stores.

use std::sync::mpsc::{self, Sender};
use std::thread;

use tracing::{debug, warn};

use cc_base::backend::{Backend, Subscription};
use cc_base::error::BackendError;
use cc_base::state::State;
use cc_base::types::{PushEvent, Topic};

use crate::update::Update;

/// Owns the live subscriptions, at most one per topic, all scoped to one
/// directory.
pub struct Reconciler {
    push_tx: Sender<PushEvent>,
    subscriptions: Vec<Subscription>,
}

impl Reconciler {
    /// Pushes are forwarded onto `updates` so the composer drains a single channel.
    pub fn new(updates: Sender<Update>) -> Self {
        let (push_tx, push_rx) = mpsc::channel::<PushEvent>();
        thread::spawn(move || {
            for event in push_rx {
                if updates.send(Update::Push(event)).is_err() {
                    break;
                }
            }
        });
        Self { push_tx, subscriptions: Vec::new() }
    }

    /// Replace every subscription with fresh ones for `root`. Topics that
    /// could not be subscribed are returned with their error.
    pub fn open(&mut self, backend: &dyn Backend, root: &str) -> Vec<(Topic, BackendError)> {
        self.close();
        let mut failures = Vec::new();
        for topic in Topic::ALL {
            match backend.subscribe(topic, root, self.push_tx.clone()) {
                Ok(sub) => self.subscriptions.push(sub),
                Err(e) => {
                    warn!(topic = topic.as_str(), directory = root, error = %e, "subscription failed");
                    failures.push((topic, e));
                }
            }
        }
        failures
    }

    pub fn close(&mut self) {
        for sub in self.subscriptions.drain(..) {
            debug!(topic = sub.topic().as_str(), directory = sub.directory(), "closing subscription");
            sub.unsubscribe();
        }
    }

    pub fn directory(&self) -> Option<&str> {
        self.subscriptions.first().map(|s| s.directory())
    }

    pub fn topics(&self) -> Vec<Topic> {
        self.subscriptions.iter().map(|s| s.topic()).collect()
    }
}

impl Drop for Reconciler {
    fn drop(&mut self) {
        self.close();
    }
}

/// Merge one push into the stores. Events for any directory but the active
/// one are dropped. Returns true if a store changed.
pub fn apply_push(state: &mut State, event: PushEvent) -> bool {
    if !state.is_active(event.root()) {
        debug!(topic = event.topic().as_str(), root = event.root(), "push for inactive directory dropped");
        return false;
    }
    match event {
        PushEvent::GitStatusUpdated { report, .. } => cc_mod_git::install_status(state, Some(report)),
        PushEvent::GitTokenCounts { files, .. } => cc_mod_git::apply_token_push(state, &files),
        PushEvent::FileTokenCounts { files, .. } => cc_mod_files::merge_file_token_counts(state, &files),
    }
}
