//! Error types for the API test runner
//!
//! Every failure a test case can hit is expressed here so the group runner
//! can turn it into a diagnostic without losing the reason.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the API test runner
#[derive(Error, Debug)]
pub enum Error {
    // === Template Errors ===
    #[error("parsing template '{template}': {message}")]
    TemplateParse { template: String, message: String },

    #[error("executing template '{template}': {message}")]
    TemplateExec { template: String, message: String },

    #[error("preparing {field}: {source}")]
    Prepare {
        field: &'static str,
        #[source]
        source: Box<Error>,
    },

    // === Specification Errors ===
    #[error("invalid rule type '{0}'")]
    InvalidRuleType(String),

    #[error("invalid boolean comparison with '{0}'")]
    InvalidBoolean(String),

    #[error("parsing {operator} '{value}' as float: {source}")]
    InvalidOperand {
        operator: &'static str,
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },

    #[error("invalid validator type '{0}'")]
    InvalidValidatorType(String),

    #[error("invalid array index '{0}'")]
    InvalidArrayIndex(String),

    #[error("invalid timeout '{value}': {reason}")]
    InvalidTimeout { value: String, reason: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // === Assertion Errors ===
    #[error("{0}")]
    Assertion(String),

    #[error("required, but not exists")]
    Missing,

    #[error("required, but not exists array index {0}")]
    MissingIndex(usize),

    #[error("value is not {0}")]
    TypeMismatch(&'static str),

    #[error("jwt token is invalid")]
    InvalidJwt,

    #[error("{0}")]
    Hex(#[from] hex::FromHexError),

    #[error("field '{key}': {source}")]
    Field {
        key: String,
        #[source]
        source: Box<Error>,
    },

    // === Transport Errors ===
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("empty channel name")]
    EmptyChannel,

    #[error("connection '{0}' not found")]
    ConnectionNotFound(String),

    #[error("connection '{0}' closed")]
    ConnectionClosed(String),

    // === Timeout Errors ===
    #[error("deadline exceeded after {0:?}")]
    Timeout(Duration),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Invalid test case '{path}': {reason}")]
    CaseParse { path: String, reason: String },

    // === IO Errors ===
    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Broad failure classes reported in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The test description itself is broken (bad type, operand, template)
    Specification,
    /// The request could not be built, sent or read
    Transport,
    /// A rule predicate was not satisfied
    Assertion,
    /// A deadline elapsed
    Timeout,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Specification => "specification",
            FailureClass::Transport => "transport",
            FailureClass::Assertion => "assertion",
            FailureClass::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Wrap an error with the key of the field being validated
    pub fn field(key: &str, source: Error) -> Self {
        Self::Field {
            key: key.to_string(),
            source: Box::new(source),
        }
    }

    /// Wrap an error raised while resolving a templated field
    pub fn prepare(field: &'static str, source: Error) -> Self {
        Self::Prepare {
            field,
            source: Box::new(source),
        }
    }

    /// Classify the error for reporting
    pub fn class(&self) -> FailureClass {
        match self {
            Error::Field { source, .. } | Error::Prepare { source, .. } => source.class(),

            Error::TemplateParse { .. }
            | Error::TemplateExec { .. }
            | Error::InvalidRuleType(_)
            | Error::InvalidBoolean(_)
            | Error::InvalidValidatorType(_)
            | Error::InvalidOperand { .. }
            | Error::InvalidArrayIndex(_)
            | Error::InvalidTimeout { .. }
            | Error::Config(_)
            | Error::ConfigParse(_)
            | Error::CaseParse { .. } => FailureClass::Specification,

            Error::Assertion(_)
            | Error::Missing
            | Error::MissingIndex(_)
            | Error::TypeMismatch(_)
            | Error::InvalidJwt
            | Error::Hex(_)
            | Error::Json(_) => FailureClass::Assertion,

            Error::Timeout(_) => FailureClass::Timeout,
            Error::Http(e) if e.is_timeout() => FailureClass::Timeout,

            Error::Http(_)
            | Error::WebSocket(_)
            | Error::InvalidRequest(_)
            | Error::EmptyChannel
            | Error::ConnectionNotFound(_)
            | Error::ConnectionClosed(_)
            | Error::FileRead { .. } => FailureClass::Transport,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_context_is_rendered() {
        let err = Error::field("user", Error::Assertion("must be 'bob'".to_string()));
        assert_eq!(err.to_string(), "field 'user': must be 'bob'");
        assert_eq!(err.class(), FailureClass::Assertion);
    }

    #[test]
    fn test_nested_class_follows_source() {
        let err = Error::prepare(
            "rule key",
            Error::TemplateParse {
                template: "{{".to_string(),
                message: "unclosed action".to_string(),
            },
        );
        assert_eq!(err.class(), FailureClass::Specification);
    }

    #[test]
    fn test_timeout_is_its_own_class() {
        let err = Error::Timeout(Duration::from_secs(1));
        assert_eq!(err.class(), FailureClass::Timeout);
        assert_eq!(err.to_string(), "deadline exceeded after 1s");
    }
}
