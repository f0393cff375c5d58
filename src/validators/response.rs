//! Single-level response validators: headers, status code and latency
//!
//! Each of them forces the rule type before resolution, so whatever type a
//! test declares, headers are strings and codes are integers.

use std::time::Duration;

use reqwest::header::HeaderMap;
use serde_json::Value;

use crate::common::{Error, Result};
use crate::rules::{Rule, RuleType};
use crate::store::Store;

use super::{capture, prepare_rule};

/// Prepare `rule` with a forced type, validate `value`, capture `text` on success
fn valid_forced(
    store: &mut Store,
    rule: &Rule,
    kind: RuleType,
    value: Option<Value>,
    text: Option<String>,
) -> Result<Rule> {
    let forced = Rule {
        kind: kind.as_str().to_string(),
        ..rule.clone()
    };
    let prepared = prepare_rule(store, &forced)?;
    prepared.valid(value.as_ref())?;

    if let Some(text) = text {
        capture(store, &prepared, &text);
    }
    Ok(prepared)
}

/// Validates a named response header
pub struct HeaderValidator<'s> {
    store: &'s mut Store,
}

impl<'s> HeaderValidator<'s> {
    pub fn new(store: &'s mut Store) -> Self {
        Self { store }
    }

    /// Validate the header named by the rule key. Returns the header value.
    pub fn valid_header(&mut self, rule: &Rule, headers: &HeaderMap) -> Result<Option<String>> {
        let name = self
            .store
            .replace(&rule.key)
            .map_err(|e| Error::prepare("rule key", e))?;
        let header = headers
            .get(name.as_str())
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

        valid_forced(
            self.store,
            rule,
            RuleType::String,
            header.clone().map(Value::String),
            header.clone(),
        )
        .map_err(|e| Error::field(&name, e))?;

        Ok(header)
    }
}

/// Validates the numeric status code of a response
pub struct CodeValidator<'s> {
    store: &'s mut Store,
}

impl<'s> CodeValidator<'s> {
    pub fn new(store: &'s mut Store) -> Self {
        Self { store }
    }

    pub fn valid_code(&mut self, rule: &Rule, code: u16) -> Result<()> {
        valid_forced(
            self.store,
            rule,
            RuleType::Integer,
            Some(Value::from(code)),
            Some(code.to_string()),
        )
        .map(|_| ())
    }
}

/// Validates request latency, measured in milliseconds
pub struct LatencyValidator<'s> {
    store: &'s mut Store,
}

impl<'s> LatencyValidator<'s> {
    pub fn new(store: &'s mut Store) -> Self {
        Self { store }
    }

    pub fn valid_latency(&mut self, rule: &Rule, latency: Duration) -> Result<()> {
        let millis = latency.as_secs_f64() * 1000.0;
        valid_forced(
            self.store,
            rule,
            RuleType::Float,
            Some(Value::from(millis)),
            Some(latency.as_millis().to_string()),
        )
        .map(|_| ())
    }
}
