//! Validator dispatch
//!
//! Validators extract a value (or a tree of values) from a response and
//! apply [`Rule`]s to it. Every templated field of a rule is resolved against
//! the store first, and validated values can be captured back into it.

mod json;
mod response;
mod text;

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::common::{scalar, Error, Result};
use crate::rules::Rule;
use crate::store::Store;

pub use json::JsonValidator;
pub use response::{CodeValidator, HeaderValidator, LatencyValidator};
pub use text::TextValidator;

/// Shape of a body the rules are applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Body parsed as a JSON document, rules walk it by key
    Json,
    /// Whole body as one string
    String,
}

impl fmt::Display for BodyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyKind::Json => f.write_str("json"),
            BodyKind::String => f.write_str("string"),
        }
    }
}

impl FromStr for BodyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(BodyKind::Json),
            "string" => Ok(BodyKind::String),
            other => Err(Error::InvalidValidatorType(other.to_string())),
        }
    }
}

/// Body validator description from a test file.
///
/// The type stays as written; an unknown one fails the case that uses it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidatorDescr {
    #[serde(rename = "type", default, deserialize_with = "scalar::string")]
    pub kind: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl ValidatorDescr {
    pub fn body_kind(&self) -> Result<BodyKind> {
        self.kind.parse()
    }
}

/// Body validator selected by [`BodyKind`]
pub enum BodyValidator<'s> {
    Json(JsonValidator<'s>),
    Text(TextValidator<'s>),
}

impl<'s> BodyValidator<'s> {
    pub fn new(store: &'s mut Store, kind: BodyKind) -> Self {
        match kind {
            BodyKind::Json => BodyValidator::Json(JsonValidator::new(store)),
            BodyKind::String => BodyValidator::Text(TextValidator::new(store)),
        }
    }

    /// Validate the body against one top-level rule
    pub fn valid_body(&mut self, rule: &Rule, body: &[u8]) -> Result<()> {
        match self {
            BodyValidator::Json(v) => v.valid_body(rule, body),
            BodyValidator::Text(v) => v.valid_body(rule, body),
        }
    }
}

/// Resolve every templated field of a rule against the store.
///
/// Nested `fields` are left out; they are resolved when the walk reaches them.
pub(crate) fn prepare_rule(store: &Store, rule: &Rule) -> Result<Rule> {
    let mut kind = store
        .replace(&rule.kind)
        .map_err(|e| Error::prepare("rule type", e))?
        .to_lowercase();
    if kind.is_empty() {
        kind = "string".to_string();
    }

    let resolve = |field: &'static str, value: &Option<String>| {
        store
            .replace_opt(value.as_deref())
            .map_err(|e| Error::prepare(field, e))
    };

    Ok(Rule {
        kind,
        key: store
            .replace(&rule.key)
            .map_err(|e| Error::prepare("rule key", e))?,
        equal: resolve("rule equal", &rule.equal)?,
        not_equal: resolve("rule not-equal", &rule.not_equal)?,
        less: resolve("rule less", &rule.less)?,
        greater: resolve("rule greater", &rule.greater)?,
        prefix: resolve("rule prefix", &rule.prefix)?,
        suffix: resolve("rule suffix", &rule.suffix)?,
        store: resolve("rule store", &rule.store)?,
        severity: resolve("rule severity", &rule.severity)?,
        required: rule.required,
        fields: Vec::new(),
    })
}

/// Save a validated value when the rule names a store variable
pub(crate) fn capture(store: &mut Store, rule: &Rule, value: &str) {
    if let Some(name) = &rule.store {
        tracing::trace!(variable = %name, "captured value");
        store.set(name.clone(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Environment;
    use std::collections::HashMap;

    fn store(pairs: &[(&str, &str)]) -> Store {
        let init: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Store::new(&Environment::default(), &init)
    }

    #[test]
    fn test_prepare_resolves_every_field() {
        let store = store(&[("t", "INTEGER"), ("k", "count"), ("v", "3"), ("s", "saved")]);
        let rule = Rule {
            kind: "{{.t}}".into(),
            key: "{{.k}}".into(),
            equal: Some("{{.v}}".into()),
            less: Some("1{{.v}}".into()),
            store: Some("{{.s}}".into()),
            severity: Some("{{.missing}}".into()),
            fields: vec![Rule::default()],
            ..Default::default()
        };

        let prepared = prepare_rule(&store, &rule).unwrap();
        assert_eq!(prepared.kind, "integer");
        assert_eq!(prepared.key, "count");
        assert_eq!(prepared.equal.as_deref(), Some("3"));
        assert_eq!(prepared.less.as_deref(), Some("13"));
        assert_eq!(prepared.store.as_deref(), Some("saved"));
        assert_eq!(prepared.severity.as_deref(), Some(""));
        assert!(prepared.fields.is_empty());
    }

    #[test]
    fn test_prepare_defaults_type_to_string() {
        let store = store(&[]);
        let rule = Rule {
            kind: "{{.nothing}}".into(),
            ..Default::default()
        };
        assert_eq!(prepare_rule(&store, &rule).unwrap().kind, "string");
    }

    #[test]
    fn test_prepare_reports_broken_template() {
        let store = store(&[]);
        let rule = Rule {
            equal: Some("{{.x".into()),
            ..Default::default()
        };
        let err = prepare_rule(&store, &rule).unwrap_err();
        assert!(err.to_string().starts_with("preparing rule equal"));
    }

    #[test]
    fn test_descriptor_kind() {
        let ok: ValidatorDescr = serde_yaml::from_str("type: json\nrules: []").unwrap();
        assert_eq!(ok.body_kind().unwrap(), BodyKind::Json);

        // unknown types still decode and fail when used
        let upper: ValidatorDescr = serde_yaml::from_str("type: JSON").unwrap();
        let err = upper.body_kind().unwrap_err();
        assert_eq!(err.to_string(), "invalid validator type 'JSON'");
        assert_eq!(err.class(), crate::common::FailureClass::Specification);

        let missing: ValidatorDescr = serde_yaml::from_str("rules: []").unwrap();
        assert!(missing.body_kind().is_err());
    }

    #[test]
    fn test_body_validator_dispatch() {
        let mut store = store(&[]);
        let rule = Rule {
            equal: Some("pong".into()),
            ..Default::default()
        };

        let mut text = BodyValidator::new(&mut store, BodyKind::String);
        assert!(text.valid_body(&rule, b"pong").is_ok());

        let mut json = BodyValidator::new(&mut store, BodyKind::Json);
        assert!(json.valid_body(&rule, br#""pong""#).is_ok());
    }
}
