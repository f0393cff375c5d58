//! Common utilities shared by the runner and the CLI

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;
pub mod scalar;

pub use error::{Error, FailureClass, Result};
