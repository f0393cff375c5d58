//! CLI command definitions
//!
//! Defines the clap commands for the apitest CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run test groups
    Run {
        /// Tests directory (default: from config, else "tests")
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Regular expression selecting groups by name
        #[arg(long, default_value = "")]
        pattern: String,

        /// Log level: trace, debug, info, warn, error
        #[arg(long, default_value = "trace")]
        level: String,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// List discovered groups and their cases without running them
    List {
        /// Tests directory (default: from config, else "tests")
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Regular expression selecting groups by name
        #[arg(long, default_value = "")]
        pattern: String,
    },
}
