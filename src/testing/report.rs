//! Run results: per-failure diagnostics and the aggregate summary

use std::fmt;

use colored::Colorize;

use crate::common::FailureClass;

/// Everything known about one failed case
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub group: String,
    pub file: String,
    pub case: String,
    /// Validator identity such as `json[2]`, `header[0]` or `request`
    pub validator: String,
    /// Key of the failing rule, empty when not applicable
    pub key: String,
    pub class: FailureClass,
    pub reason: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let group = if self.group.is_empty() { "/" } else { &self.group };
        write!(f, "{} {} ({}): {}", group, self.file, self.case, self.validator)?;
        if !self.key.is_empty() {
            write!(f, " key '{}'", self.key)?;
        }
        write!(f, ": {} error: {}", self.class, self.reason)
    }
}

/// Aggregate result of a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub errors: usize,
    pub successes: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.errors == 0
    }

    /// Print the colored summary to stdout
    pub fn print(&self) {
        if !self.diagnostics.is_empty() {
            println!("\n{}", "Failures:".red().bold());
            for diagnostic in &self.diagnostics {
                println!("  {} {}", "✗".red(), diagnostic);
            }
        }

        let passed = format!("{} passed", self.successes);
        let failed = format!("{} failed", self.errors);
        if self.is_success() {
            println!("\n{} {}, {}\n", "✓".green().bold(), passed.green().bold(), failed);
        } else {
            println!("\n{} {}, {}\n", "✗".red().bold(), passed, failed.red().bold());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagnostic() -> Diagnostic {
        Diagnostic {
            group: "/auth".into(),
            file: "02_me.yml".into(),
            case: "current user".into(),
            validator: "json[2]".into(),
            key: "id".into(),
            class: FailureClass::Assertion,
            reason: "value is not integer".into(),
        }
    }

    #[test]
    fn test_diagnostic_display() {
        assert_eq!(
            diagnostic().to_string(),
            "/auth 02_me.yml (current user): json[2] key 'id': assertion error: value is not integer"
        );

        let root = Diagnostic {
            group: String::new(),
            key: String::new(),
            validator: "request".into(),
            class: FailureClass::Transport,
            reason: "connection refused".into(),
            ..diagnostic()
        };
        assert_eq!(
            root.to_string(),
            "/ 02_me.yml (current user): request: transport error: connection refused"
        );
    }

    #[test]
    fn test_summary_success() {
        let mut summary = RunSummary::default();
        assert!(summary.is_success());

        summary.errors = 1;
        summary.diagnostics.push(diagnostic());
        assert!(!summary.is_success());
    }
}
