//! Declarative API tests
//!
//! Test cases are YAML files describing HTTP or WebSocket requests and the
//! rules their responses must satisfy. Values captured from one response
//! feed the templates of later cases in the same group.

pub mod cli;
pub mod commands;
pub mod common;
pub mod rules;
pub mod store;
pub mod stream;
pub mod testing;
pub mod transport;
pub mod validators;

// Re-export commonly used types for tests
pub use common::{Error, FailureClass, Result};
pub use testing::{Group, Runner, RunSummary};
