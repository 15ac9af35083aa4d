//! Background dispatch of backend calls.
//!
//! Each domain gets its own lane: a worker thread that runs that domain's
//! jobs in submission order and sends each result back on the update
//! channel. Lanes run in parallel with each other, so loading the tree never
//! waits for a slow git status.

use std::collections::HashMap;
use std::sync::mpsc::{self, SendError, Sender};
use std::thread;

use tracing::{debug, warn};

use crate::update::Update;

type Job = Box<dyn FnOnce() -> Update + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    Tree,
    Selection,
    TreeTokens,
    Git,
    Pages,
    Instructions,
    DraftTokens,
    Clipboard,
}

impl Lane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::Tree => "tree",
            Lane::Selection => "selection",
            Lane::TreeTokens => "tree-tokens",
            Lane::Git => "git",
            Lane::Pages => "pages",
            Lane::Instructions => "instructions",
            Lane::DraftTokens => "draft-tokens",
            Lane::Clipboard => "clipboard",
        }
    }
}

pub struct Dispatcher {
    tx: Sender<Update>,
    lanes: HashMap<Lane, Sender<Job>>,
}

impl Dispatcher {
    pub fn new(tx: Sender<Update>) -> Self {
        Self { tx, lanes: HashMap::new() }
    }

    /// Queue `job` on `lane`; its result arrives on the update channel.
    pub fn submit(&mut self, lane: Lane, job: impl FnOnce() -> Update + Send + 'static) {
        let job: Job = Box::new(job);
        let tx = &self.tx;
        let worker = self.lanes.entry(lane).or_insert_with(|| spawn_lane(lane, tx.clone()));
        if let Err(SendError(job)) = worker.send(job) {
            // The worker died (a job panicked); run this one here and respawn next time.
            warn!(lane = lane.as_str(), "lane worker gone, running job inline");
            self.lanes.remove(&lane);
            let _ = self.tx.send(job());
        }
    }
}

fn spawn_lane(lane: Lane, tx: Sender<Update>) -> Sender<Job> {
    let (job_tx, job_rx) = mpsc::channel::<Job>();
    thread::spawn(move || {
        for job in job_rx {
            if tx.send(job()).is_err() {
                break;
            }
        }
        debug!(lane = lane.as_str(), "lane closed");
    });
    job_tx
}
