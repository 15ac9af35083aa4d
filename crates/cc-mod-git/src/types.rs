use std::collections::HashMap;
use std::sync::Arc;

use cc_base::seq::LatestRequest;
use cc_base::state::State;
use cc_base::types::{GitChange, GitStatusReport, IdSet};

/// What is known about the working tree of the active directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum GitStatus {
    /// Not loaded yet, or the last load failed.
    #[default]
    Unknown,
    /// The directory is not inside a repository. Distinct from zero changes.
    NotRepository,
    Changes(Arc<GitStatusReport>),
}

impl GitStatus {
    pub fn report(&self) -> Option<&Arc<GitStatusReport>> {
        match self {
            GitStatus::Changes(report) => Some(report),
            _ => None,
        }
    }

    pub fn changes(&self) -> &[GitChange] {
        self.report().map(|r| r.results.as_slice()).unwrap_or(&[])
    }
}

// === Module-owned state ===

#[derive(Debug, Default)]
pub struct GitState {
    pub status: GitStatus,
    /// Selected diff paths.
    pub selected: IdSet,
    pub status_request: LatestRequest,
    /// Token counts pushed before any status arrived.
    pub early_counts: HashMap<String, usize>,
}

impl GitState {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn get(state: &State) -> &Self {
        state.get_ext::<Self>().expect("GitState not initialized")
    }
    pub fn get_mut(state: &mut State) -> &mut Self {
        state.get_ext_mut::<Self>().expect("GitState not initialized")
    }
}
