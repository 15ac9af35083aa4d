pub mod backend;
pub mod config;
pub mod debounce;
pub mod error;
pub mod modules;
pub mod notifications;
pub mod selection;
pub mod seq;
pub mod state;
pub mod tokens;
pub mod types;
