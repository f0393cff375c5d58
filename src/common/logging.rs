//! Logging and tracing configuration
//!
//! Test progress is reported through structured `tracing` events on stdout.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for the CLI (stdout logging)
///
/// Logs are controlled by the `RUST_LOG` environment variable. Without it,
/// `level` applies to this crate and dependencies log at WARN.
pub fn init_cli(level: &str, color: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_ansi(color)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// Build the default filter directives for a level name
fn default_directives(level: &str) -> String {
    let level = match level.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" | "off" => level.to_ascii_lowercase(),
        other => {
            eprintln!("Warning: unknown log level '{}', using info", other);
            "info".to_string()
        }
    };
    format!("apitest={},warn", level)
}
