//! Configuration module for limbo-search
//!
//! Handles the declarative search configuration (loadable from YAML or JSON
//! and overridable through environment variables) and the hook capability
//! set used to customise request bodies, responses and lifecycle events.

mod hooks;
mod settings;

pub use hooks::*;
pub use settings::*;
