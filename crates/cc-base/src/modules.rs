use crate::state::State;

/// A content domain contributing to the composition.
///
/// Modules are stateless; their store lives in `State` under the module's
/// own type. The composer drives them uniformly, so adding a domain never
/// touches the reset controller or the token aggregator.
pub trait Module: Send + Sync {
    /// Unique identifier (e.g., "files", "git")
    fn id(&self) -> &'static str;
    /// Display name
    fn name(&self) -> &'static str;
    /// Short description
    fn description(&self) -> &'static str;

    /// Install the module's default store. Called once when the composer is built.
    fn init_state(&self, state: &mut State);

    /// Replace the module's store with its default (directory switch or exit).
    fn reset_state(&self, state: &mut State) {
        self.init_state(state);
    }

    /// Tokens this domain currently contributes to the composition.
    fn token_subtotal(&self, _state: &State) -> usize {
        0
    }
}
