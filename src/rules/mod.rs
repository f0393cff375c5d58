//! Rule engine
//!
//! A [`Rule`] is a typed predicate over one value. Operands are kept as
//! strings because they pass through template resolution first and are only
//! parsed according to the rule type afterwards.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

use crate::common::{scalar, Error, Result};

/// Type of the value a rule checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleType {
    Boolean,
    Float,
    Integer,
    String,
    Jwt,
    Hex,
    Object,
    Array,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Boolean => "boolean",
            RuleType::Float => "float",
            RuleType::Integer => "integer",
            RuleType::String => "string",
            RuleType::Jwt => "jwt",
            RuleType::Hex => "hex",
            RuleType::Object => "object",
            RuleType::Array => "array",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "string" => Ok(RuleType::String),
            "boolean" => Ok(RuleType::Boolean),
            "float" => Ok(RuleType::Float),
            "integer" => Ok(RuleType::Integer),
            "jwt" => Ok(RuleType::Jwt),
            "hex" => Ok(RuleType::Hex),
            "object" => Ok(RuleType::Object),
            "array" => Ok(RuleType::Array),
            other => Err(Error::InvalidRuleType(other.to_string())),
        }
    }
}

/// Validation rule for one value, as written in a test file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    /// Rule type; templated, empty means string
    #[serde(rename = "type", default, deserialize_with = "scalar::string")]
    pub kind: String,
    /// Selector into the subject; empty means the whole subject
    #[serde(default, deserialize_with = "scalar::string")]
    pub key: String,
    #[serde(default, deserialize_with = "scalar::option")]
    pub equal: Option<String>,
    #[serde(rename = "not-equal", default, deserialize_with = "scalar::option")]
    pub not_equal: Option<String>,
    #[serde(default, deserialize_with = "scalar::option")]
    pub less: Option<String>,
    #[serde(default, deserialize_with = "scalar::option")]
    pub greater: Option<String>,
    #[serde(default, deserialize_with = "scalar::option")]
    pub prefix: Option<String>,
    #[serde(default, deserialize_with = "scalar::option")]
    pub suffix: Option<String>,
    /// Store variable that receives the validated value
    #[serde(default, deserialize_with = "scalar::option")]
    pub store: Option<String>,
    /// Advisory annotation; does not change the outcome
    #[serde(default, deserialize_with = "scalar::option")]
    pub severity: Option<String>,
    /// Unset means required
    #[serde(default)]
    pub required: Option<bool>,
    /// Nested rules for object and array types
    #[serde(default)]
    pub fields: Vec<Rule>,
}

impl Rule {
    /// Parse the declared type. Matching is case-insensitive.
    pub fn rule_type(&self) -> Result<RuleType> {
        self.kind.to_lowercase().parse()
    }

    /// A rule is optional only when `required: false` is written explicitly
    pub fn is_optional(&self) -> bool {
        self.required == Some(false)
    }

    /// Check `value` against this rule. `None` means the value does not exist.
    pub fn valid(&self, value: Option<&Value>) -> Result<()> {
        let Some(value) = value else {
            return if self.is_optional() {
                Ok(())
            } else {
                Err(Error::Missing)
            };
        };

        match self.rule_type()? {
            RuleType::Boolean => match value.as_bool() {
                Some(v) => self.valid_boolean(v),
                None => Err(Error::Assertion("is not a boolean".to_string())),
            },
            RuleType::Float | RuleType::Integer => match value.as_f64() {
                Some(v) => self.valid_float(v),
                None => Err(Error::Assertion("is not a int or float".to_string())),
            },
            RuleType::String => self.valid_string(as_str(value)?),
            RuleType::Jwt => {
                let v = as_str(value)?;
                self.valid_string(v)?;
                valid_jwt(v)
            }
            RuleType::Hex => {
                let v = as_str(value)?;
                self.valid_string(v)?;
                valid_hex(v)
            }
            RuleType::Object | RuleType::Array => Ok(()),
        }
    }

    fn valid_boolean(&self, val: bool) -> Result<()> {
        if let Some(equal) = &self.equal {
            match equal.as_str() {
                "true" if !val => return Err(Error::Assertion("must be true".to_string())),
                "false" if val => return Err(Error::Assertion("must be false".to_string())),
                "true" | "false" => {}
                other => return Err(Error::InvalidBoolean(other.to_string())),
            }
        }

        if let Some(not_equal) = &self.not_equal {
            match not_equal.as_str() {
                "true" if val => return Err(Error::Assertion("must be not true".to_string())),
                "false" if !val => return Err(Error::Assertion("must be not false".to_string())),
                "true" | "false" => {}
                other => return Err(Error::InvalidBoolean(other.to_string())),
            }
        }

        Ok(())
    }

    fn valid_float(&self, val: f64) -> Result<()> {
        if let Some(expected) = parse_operand("equal", &self.equal)? {
            if expected != val {
                return Err(Error::Assertion(format!("must be '{}'", expected)));
            }
        }

        if let Some(expected) = parse_operand("not-equal", &self.not_equal)? {
            if expected == val {
                return Err(Error::Assertion(format!("must not be '{}'", expected)));
            }
        }

        if let Some(threshold) = parse_operand("less", &self.less)? {
            if val >= threshold {
                return Err(Error::Assertion(format!("must be less than '{}'", threshold)));
            }
        }

        if let Some(threshold) = parse_operand("greater", &self.greater)? {
            if val <= threshold {
                return Err(Error::Assertion(format!(
                    "must be greater than '{}'",
                    threshold
                )));
            }
        }

        Ok(())
    }

    fn valid_string(&self, val: &str) -> Result<()> {
        if let Some(expected) = &self.equal {
            if expected != val {
                return Err(Error::Assertion(format!("must be '{}'", expected)));
            }
        }

        if let Some(expected) = &self.not_equal {
            if expected == val {
                return Err(Error::Assertion(format!("must not be '{}'", expected)));
            }
        }

        if let Some(prefix) = &self.prefix {
            if !val.starts_with(prefix.as_str()) {
                return Err(Error::Assertion(format!("must have prefix '{}'", prefix)));
            }
        }

        if let Some(suffix) = &self.suffix {
            if !val.ends_with(suffix.as_str()) {
                return Err(Error::Assertion(format!("must have suffix '{}'", suffix)));
            }
        }

        Ok(())
    }
}

fn as_str(value: &Value) -> Result<&str> {
    value
        .as_str()
        .ok_or_else(|| Error::Assertion("is not a string".to_string()))
}

fn parse_operand(operator: &'static str, operand: &Option<String>) -> Result<Option<f64>> {
    operand
        .as_deref()
        .map(|raw| {
            raw.trim()
                .parse::<f64>()
                .map_err(|source| Error::InvalidOperand {
                    operator,
                    value: raw.to_string(),
                    source,
                })
        })
        .transpose()
}

/// Structural JWT check: exactly three dot-separated segments.
///
/// Segment contents and the signature are never inspected.
fn valid_jwt(token: &str) -> Result<()> {
    if token.split('.').count() != 3 {
        return Err(Error::InvalidJwt);
    }
    Ok(())
}

/// Hexadecimal check. A bad character is reported before an odd length.
fn valid_hex(val: &str) -> Result<()> {
    let bytes = val.as_bytes();
    let even = bytes.len() - bytes.len() % 2;
    hex::decode(&bytes[..even])?;

    if even != bytes.len() {
        let last = bytes[even];
        if !last.is_ascii_hexdigit() {
            return Err(hex::FromHexError::InvalidHexCharacter {
                c: last as char,
                index: even,
            }
            .into());
        }
        return Err(hex::FromHexError::OddLength.into());
    }

    Ok(())
}
