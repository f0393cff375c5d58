//! CLI command handling
//!
//! Discovers groups, runs them and formats output.

use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{logging, Error, Result};
use crate::store::Environment;
use crate::testing::{finder, Group, RunSummary, Runner};

/// Dispatch a CLI command. Returns whether every test passed.
pub async fn dispatch(command: Commands) -> Result<bool> {
    let config = Config::load()?;

    match command {
        Commands::Run {
            dir,
            pattern,
            level,
            no_color,
        } => {
            if no_color {
                colored::control::set_override(false);
            }
            logging::init_cli(&level, !no_color);

            let groups = discover(&tests_dir(dir, &config), &pattern)?;
            let env = Environment::capture(&config.runner.env_prefix);
            let summary = run(config, env, &groups).await?;

            summary.print();
            Ok(summary.is_success())
        }

        Commands::List { dir, pattern } => {
            let groups = discover(&tests_dir(dir, &config), &pattern)?;
            for group in &groups {
                let name = if group.name.is_empty() { "/" } else { &group.name };
                println!("{}", name.cyan().bold());
                for case in &group.tests {
                    println!("  {} {}", case.filename.dimmed(), case.name);
                }
            }
            Ok(true)
        }
    }
}

/// Run every group in order and collect the results
pub async fn run(config: Config, env: Environment, groups: &[Group]) -> Result<RunSummary> {
    let mut runner = Runner::new(config, env)?;
    for group in groups {
        runner.run(group).await;
    }

    let summary = runner.into_summary();
    if summary.is_success() {
        tracing::info!(errors = summary.errors, success = summary.successes, "all tests passed");
    } else {
        tracing::error!(errors = summary.errors, success = summary.successes, "tests failed");
    }
    Ok(summary)
}

fn tests_dir(dir: Option<PathBuf>, config: &Config) -> PathBuf {
    dir.unwrap_or_else(|| config.defaults.dir.clone())
}

fn discover(dir: &Path, pattern: &str) -> Result<Vec<Group>> {
    let groups = finder::find(dir);
    if groups.is_empty() {
        let shown = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        return Err(Error::Config(format!(
            "not found tests in '{}'",
            shown.display()
        )));
    }

    finder::filter(groups, pattern)
}
