//! Whole-body string validator

use serde_json::Value;

use crate::common::Result;
use crate::rules::Rule;
use crate::store::Store;

use super::{capture, prepare_rule};

/// Treats the entire body as one string; `key` and `fields` are not used
pub struct TextValidator<'s> {
    store: &'s mut Store,
}

impl<'s> TextValidator<'s> {
    pub fn new(store: &'s mut Store) -> Self {
        Self { store }
    }

    pub fn valid_body(&mut self, rule: &Rule, body: &[u8]) -> Result<()> {
        let rule = prepare_rule(self.store, rule)?;

        let text = String::from_utf8_lossy(body).into_owned();
        let value = Value::String(text);
        rule.valid(Some(&value))?;

        if let Value::String(text) = &value {
            capture(self.store, &rule, text);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_body_rules() {
        let mut store = Store::default();
        let mut validator = TextValidator::new(&mut store);

        let rule = Rule {
            prefix: Some("<html>".into()),
            ..Default::default()
        };
        assert!(validator.valid_body(&rule, b"<html><body/></html>").is_ok());
        assert_eq!(
            validator.valid_body(&rule, b"plain").unwrap_err().to_string(),
            "must have prefix '<html>'"
        );
    }

    #[test]
    fn test_capture_only_on_success() {
        let mut store = Store::default();
        let rule = Rule {
            equal: Some("ok".into()),
            store: Some("body".into()),
            ..Default::default()
        };

        let mut validator = TextValidator::new(&mut store);
        assert!(validator.valid_body(&rule, b"not ok").is_err());
        assert!(validator.valid_body(&rule, b"ok").is_ok());
        assert_eq!(store.get("body"), Some("ok"));
    }

    #[test]
    fn test_key_is_ignored() {
        let mut store = Store::default();
        let rule = Rule {
            key: "anything".into(),
            suffix: Some("}".into()),
            ..Default::default()
        };
        let mut validator = TextValidator::new(&mut store);
        assert!(validator.valid_body(&rule, br#"{"a":1}"#).is_ok());
    }
}
