//! JSON document validator
//!
//! Walks a parsed document with a tree of rules:
//!
//! - scalar rules check the value at `key` of the current subject
//! - `object` rules validate their `fields` against the sub-document at `key`
//! - `array` rules apply key-less `fields` to every element and treat a
//!   non-empty field key as a zero-based element index

use serde_json::Value;

use crate::common::{Error, Result};
use crate::rules::{Rule, RuleType};
use crate::store::Store;

use super::{capture, prepare_rule};

pub struct JsonValidator<'s> {
    store: &'s mut Store,
}

impl<'s> JsonValidator<'s> {
    pub fn new(store: &'s mut Store) -> Self {
        Self { store }
    }

    /// Parse `body` and validate it against one top-level rule
    pub fn valid_body(&mut self, rule: &Rule, body: &[u8]) -> Result<()> {
        let document: Value = serde_json::from_slice(body)?;
        self.valid_value(rule, &document)
    }

    /// Validate an already parsed subject
    pub fn valid_value(&mut self, rule: &Rule, subject: &Value) -> Result<()> {
        let prepared = prepare_rule(self.store, rule)?;
        let kind = prepared.rule_type()?;
        let key = prepared.key.as_str();

        let value = extract(kind, key, subject).map_err(|e| in_field(key, e))?;
        prepared.valid(value).map_err(|e| in_field(key, e))?;

        if let Some(value) = value {
            capture(self.store, &prepared, &raw_text(value));
        }

        match (kind, value) {
            (RuleType::Object, Some(object)) => {
                for field in &rule.fields {
                    self.valid_value(field, object)?;
                }
            }
            (RuleType::Array, Some(Value::Array(items))) => self.valid_array(rule, items)?,
            _ => {}
        }

        Ok(())
    }

    fn valid_array(&mut self, rule: &Rule, items: &[Value]) -> Result<()> {
        // Key-less fields are checked against every element
        for item in items {
            for field in rule.fields.iter().filter(|f| f.key.is_empty()) {
                self.valid_value(field, item)?;
            }
        }

        // Keyed fields address a single element by index
        for field in rule.fields.iter().filter(|f| !f.key.is_empty()) {
            let raw_index = self
                .store
                .replace(&field.key)
                .map_err(|e| Error::prepare("rule key", e))?;
            let index: usize = raw_index
                .trim()
                .parse()
                .map_err(|_| Error::InvalidArrayIndex(raw_index.clone()))?;

            let Some(item) = items.get(index) else {
                if field.is_optional() {
                    continue;
                }
                return Err(Error::MissingIndex(index));
            };

            let element_rule = Rule {
                key: String::new(),
                ..field.clone()
            };
            self.valid_value(&element_rule, item)?;
        }

        Ok(())
    }
}

fn in_field(key: &str, err: Error) -> Error {
    if key.is_empty() {
        err
    } else {
        Error::field(key, err)
    }
}

/// Look up `key` in the subject. Composite types must match their rule type.
fn extract<'v>(kind: RuleType, key: &str, subject: &'v Value) -> Result<Option<&'v Value>> {
    let value = if key.is_empty() {
        Some(subject)
    } else {
        lookup(subject, key)
    };

    match (kind, value) {
        (RuleType::Object, Some(v)) if !v.is_object() => Err(Error::TypeMismatch("object")),
        (RuleType::Array, Some(v)) if !v.is_array() => Err(Error::TypeMismatch("array")),
        _ => Ok(value),
    }
}

/// Object member by name, or array element by `[index]`
fn lookup<'v>(subject: &'v Value, key: &str) -> Option<&'v Value> {
    match subject {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key
            .strip_prefix('[')
            .and_then(|k| k.strip_suffix(']'))
            .and_then(|k| k.parse::<usize>().ok())
            .and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Text saved in the store: string contents without quotes, JSON text otherwise
fn raw_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(kind: &str, key: &str) -> Rule {
        Rule {
            kind: kind.to_string(),
            key: key.to_string(),
            ..Default::default()
        }
    }

    fn validate(store: &mut Store, rule: &Rule, document: Value) -> std::result::Result<(), String> {
        JsonValidator::new(store)
            .valid_value(rule, &document)
            .map_err(|e| e.to_string())
    }

    #[test]
    fn test_scalar_fields() {
        let mut store = Store::default();
        let document = json!({"name": "bob", "age": 42, "admin": false});

        let name = Rule {
            equal: Some("bob".into()),
            ..rule("string", "name")
        };
        assert!(validate(&mut store, &name, document.clone()).is_ok());

        let age = Rule {
            greater: Some("50".into()),
            ..rule("integer", "age")
        };
        assert_eq!(
            validate(&mut store, &age, document.clone()).unwrap_err(),
            "field 'age': must be greater than '50'"
        );

        let admin = Rule {
            equal: Some("false".into()),
            ..rule("boolean", "admin")
        };
        assert!(validate(&mut store, &admin, document).is_ok());
    }

    #[test]
    fn test_float_type_is_extracted() {
        let mut store = Store::default();
        let price = Rule {
            less: Some("10".into()),
            ..rule("float", "price")
        };
        assert!(validate(&mut store, &price, json!({"price": 9.99})).is_ok());
    }

    #[test]
    fn test_missing_key_is_absent() {
        let mut store = Store::default();
        let required = rule("string", "token");
        assert_eq!(
            validate(&mut store, &required, json!({})).unwrap_err(),
            "field 'token': required, but not exists"
        );

        let optional = Rule {
            required: Some(false),
            store: Some("token".into()),
            ..rule("string", "token")
        };
        assert!(validate(&mut store, &optional, json!({})).is_ok());
        assert_eq!(store.get("token"), None);
    }

    #[test]
    fn test_scalar_type_mismatch() {
        let mut store = Store::default();
        assert_eq!(
            validate(&mut store, &rule("string", "id"), json!({"id": 7})).unwrap_err(),
            "field 'id': is not a string"
        );
    }

    #[test]
    fn test_capture_raw_text() {
        let mut store = Store::default();
        let token = Rule {
            store: Some("token".into()),
            ..rule("jwt", "token")
        };
        let id = Rule {
            store: Some("id".into()),
            ..rule("integer", "id")
        };
        let document = json!({
            "token": "eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiIxIn0.sig",
            "id": 100
        });

        assert!(validate(&mut store, &token, document.clone()).is_ok());
        assert!(validate(&mut store, &id, document).is_ok());
        assert_eq!(store.get("token"), Some("eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiIxIn0.sig"));
        assert_eq!(store.get("id"), Some("100"));
    }

    #[test]
    fn test_nested_object() {
        let mut store = Store::default();
        let user = Rule {
            fields: vec![
                Rule {
                    equal: Some("bob".into()),
                    ..rule("string", "name")
                },
                Rule {
                    fields: vec![Rule {
                        equal: Some("Paris".into()),
                        ..rule("string", "city")
                    }],
                    ..rule("object", "address")
                },
            ],
            ..rule("object", "user")
        };

        let ok = json!({"user": {"name": "bob", "address": {"city": "Paris"}}});
        assert!(validate(&mut store, &user, ok).is_ok());

        let bad = json!({"user": {"name": "bob", "address": {"city": "Rome"}}});
        assert_eq!(
            validate(&mut store, &user, bad).unwrap_err(),
            "field 'city': must be 'Paris'"
        );
    }

    #[test]
    fn test_object_type_mismatch_is_hard_error() {
        let mut store = Store::default();
        let mut optional = rule("object", "user");
        optional.required = Some(false);
        assert_eq!(
            validate(&mut store, &optional, json!({"user": "bob"})).unwrap_err(),
            "field 'user': value is not object"
        );
    }

    #[test]
    fn test_optional_missing_object_skips_fields() {
        let mut store = Store::default();
        let user = Rule {
            required: Some(false),
            fields: vec![rule("string", "name")],
            ..rule("object", "user")
        };
        assert!(validate(&mut store, &user, json!({})).is_ok());
    }

    #[test]
    fn test_array_broadcast_fields() {
        let mut store = Store::default();
        let ids = Rule {
            fields: vec![Rule {
                greater: Some("0".into()),
                ..rule("integer", "")
            }],
            ..rule("array", "ids")
        };
        assert!(validate(&mut store, &ids, json!({"ids": [1, 2, 3]})).is_ok());
        assert_eq!(
            validate(&mut store, &ids, json!({"ids": [1, 0]})).unwrap_err(),
            "must be greater than '0'"
        );
    }

    #[test]
    fn test_array_of_objects() {
        let mut store = Store::default();
        let items = Rule {
            fields: vec![Rule {
                fields: vec![rule("string", "name")],
                ..rule("object", "")
            }],
            ..rule("array", "items")
        };
        let document = json!({"items": [{"name": "a"}, {"name": "b"}]});
        assert!(validate(&mut store, &items, document).is_ok());

        let document = json!({"items": [{"name": "a"}, {"title": "b"}]});
        assert_eq!(
            validate(&mut store, &items, document).unwrap_err(),
            "field 'name': required, but not exists"
        );
    }

    #[test]
    fn test_array_index_out_of_bounds() {
        let mut store = Store::default();
        let optional = Rule {
            fields: vec![Rule {
                required: Some(false),
                ..rule("string", "2")
            }],
            ..rule("array", "")
        };
        assert!(validate(&mut store, &optional, json!(["only"])).is_ok());

        let required = Rule {
            fields: vec![rule("string", "2")],
            ..rule("array", "")
        };
        assert_eq!(
            validate(&mut store, &required, json!(["only"])).unwrap_err(),
            "required, but not exists array index 2"
        );
    }

    #[test]
    fn test_array_index_selects_element() {
        let mut store = Store::new(
            &crate::store::Environment::default(),
            &[("i".to_string(), "1".to_string())].into_iter().collect(),
        );
        let second = Rule {
            fields: vec![Rule {
                equal: Some("b".into()),
                store: Some("picked".into()),
                ..rule("string", "{{.i}}")
            }],
            ..rule("array", "letters")
        };
        assert!(validate(&mut store, &second, json!({"letters": ["a", "b"]})).is_ok());
        assert_eq!(store.get("picked"), Some("b"));
    }

    #[test]
    fn test_array_index_must_be_numeric() {
        let mut store = Store::default();
        let bad = Rule {
            fields: vec![rule("string", "first")],
            ..rule("array", "")
        };
        assert_eq!(
            validate(&mut store, &bad, json!(["a"])).unwrap_err(),
            "invalid array index 'first'"
        );
    }

    #[test]
    fn test_array_type_mismatch() {
        let mut store = Store::default();
        assert_eq!(
            validate(&mut store, &rule("array", "ids"), json!({"ids": {}})).unwrap_err(),
            "field 'ids': value is not array"
        );
    }

    #[test]
    fn test_bracket_key_on_array_subject() {
        let mut store = Store::default();
        let first = Rule {
            equal: Some("x".into()),
            ..rule("string", "[0]")
        };
        assert!(validate(&mut store, &first, json!(["x", "y"])).is_ok());
    }

    #[test]
    fn test_invalid_json_body() {
        let mut store = Store::default();
        let err = JsonValidator::new(&mut store)
            .valid_body(&rule("string", "a"), b"not json")
            .unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}
