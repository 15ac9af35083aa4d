//! YAML configuration for the composition engine.
use std::sync::LazyLock;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineConfig {
    pub instruction_debounce_ms: u64,
    pub notification_capacity: usize,
    pub chars_per_token: f32,
    pub git_watch_settle_ms: u64,
    pub http_timeout_secs: u64,
    pub git_timeout_secs: u64,
    pub data_dir: String,
}

impl EngineConfig {
    /// Copy of the embedded configuration, for callers that want to tweak it.
    pub fn load() -> Self {
        ENGINE.clone()
    }

    pub fn instruction_debounce(&self) -> Duration {
        Duration::from_millis(self.instruction_debounce_ms)
    }

    pub fn git_watch_settle(&self) -> Duration {
        Duration::from_millis(self.git_watch_settle_ms)
    }
}

// ============================================================================
// Loading Functions
// ============================================================================

fn parse_yaml<T: for<'de> Deserialize<'de>>(name: &str, content: &str) -> T {
    serde_yaml::from_str(content).unwrap_or_else(|e| panic!("Failed to parse {}: {}", name, e))
}

// ============================================================================
// Global Configuration (embedded at compile time)
// ============================================================================

pub static ENGINE: LazyLock<EngineConfig> =
    LazyLock::new(|| parse_yaml("engine.yaml", include_str!("../../../../yamls/engine.yaml")));
