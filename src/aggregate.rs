//! Token totals across all domains.

use serde::Serialize;

use cc_base::modules::Module;
use cc_base::state::State;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenBreakdown {
    pub files: usize,
    /// Rendered directory tree overhead.
    pub tree: usize,
    pub git: usize,
    pub pages: usize,
    pub instructions: usize,
    pub total: usize,
}

/// Recomputed from the stores on every call. The total is the sum of every
/// module's subtotal plus the tree overhead.
pub fn breakdown(state: &State, modules: &[Box<dyn Module>]) -> TokenBreakdown {
    let tree = cc_mod_files::tree_overhead(state);
    let total = modules.iter().map(|m| m.token_subtotal(state)).sum::<usize>() + tree;
    TokenBreakdown {
        files: cc_mod_files::files_subtotal(state),
        tree,
        git: cc_mod_git::git_subtotal(state),
        pages: cc_mod_web::pages_subtotal(state),
        instructions: cc_mod_instructions::instructions_subtotal(state),
        total,
    }
}
