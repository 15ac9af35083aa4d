//! Composition state engine.
//!
//! [`Composer`] owns the per-domain stores (files, git diffs, web pages,
//! instructions), keeps them consistent with the computation backend while
//! requests and push updates arrive out of order, and produces the token
//! totals and snapshot a clipboard copy is built from.

pub mod aggregate;
pub mod background;
pub mod engine;
pub mod modules;
pub mod reconciler;
pub mod snapshot;
pub mod update;

pub use aggregate::TokenBreakdown;
pub use engine::Composer;
pub use snapshot::CompositionSnapshot;
