//! Test groups: discovery, the case model and the runner
//!
//! Cases are YAML files; every directory holding cases is a group whose
//! cases share one store and one set of stream connections.

mod config;
pub mod finder;
mod report;
mod runner;

pub use config::*;
pub use report::{Diagnostic, RunSummary};
pub use runner::{GroupRunner, Runner};
