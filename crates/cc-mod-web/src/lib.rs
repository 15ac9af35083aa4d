use tracing::debug;

use cc_base::modules::Module;
use cc_base::selection::{preserve_selected, toggle_id};
use cc_base::seq::LatestRequest;
use cc_base::state::State;
use cc_base::types::{IdSet, SavedPage};

// === Module-owned state ===

#[derive(Debug, Default)]
pub struct WebState {
    /// Saved pages of the active directory, in the order the backend lists them.
    pub pages: Vec<SavedPage>,
    /// Selected page urls.
    pub selected: IdSet,
    pub list_request: LatestRequest,
}

impl WebState {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn get(state: &State) -> &Self {
        state.get_ext::<Self>().expect("WebState not initialized")
    }
    pub fn get_mut(state: &mut State) -> &mut Self {
        state.get_ext_mut::<Self>().expect("WebState not initialized")
    }
}

pub struct WebModule;

impl Module for WebModule {
    fn id(&self) -> &'static str {
        "web"
    }
    fn name(&self) -> &'static str {
        "Web pages"
    }
    fn description(&self) -> &'static str {
        "Saved web pages selectable into the composition"
    }

    fn init_state(&self, state: &mut State) {
        state.set_ext(WebState::new());
    }

    fn token_subtotal(&self, state: &State) -> usize {
        pages_subtotal(state)
    }
}

/// Replace the page list and prune the selection against it in one step.
pub fn install_pages(state: &mut State, pages: Vec<SavedPage>) {
    let ws = WebState::get_mut(state);
    let kept = preserve_selected(&pages, &ws.selected, |p| p.url.as_str());
    if kept.len() != ws.selected.len() {
        debug!(dropped = ws.selected.len() - kept.len(), "page selection pruned");
    }
    ws.pages = pages;
    ws.selected = kept;
}

pub fn toggle_page(state: &mut State, url: &str) -> bool {
    let ws = WebState::get_mut(state);
    if !ws.pages.iter().any(|p| p.url == url) {
        return false;
    }
    toggle_id(&mut ws.selected, url);
    true
}

pub fn select_all(state: &mut State) {
    let ws = WebState::get_mut(state);
    ws.selected = ws.pages.iter().map(|p| p.url.clone()).collect();
}

pub fn deselect_all(state: &mut State) {
    WebState::get_mut(state).selected.clear();
}

pub fn pages_subtotal(state: &State) -> usize {
    let ws = WebState::get(state);
    ws.pages.iter().filter(|p| ws.selected.contains(&p.url)).map(|p| p.token_count).sum()
}
