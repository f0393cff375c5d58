//! Test case configuration types
//!
//! Defines the data structures for deserializing YAML test cases and group
//! init files. Unknown fields are rejected everywhere.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::common::scalar;
use crate::rules::Rule;
use crate::validators::ValidatorDescr;

/// A single test case loaded from a YAML file
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Case {
    /// File the case was loaded from; used for ordering and diagnostics
    #[serde(skip)]
    pub filename: String,
    /// Name of the test case
    pub name: String,
    /// Outbound request, skipped when `url` is empty
    #[serde(default)]
    pub request: Request,
    /// Expectations for the response
    #[serde(default)]
    pub response: Response,
    /// Body validators for a message taken by `receive`
    #[serde(default)]
    pub message: Vec<ValidatorDescr>,
    /// Wait for a message on a stream opened by an earlier case
    #[serde(default)]
    pub receive: Receive,
}

/// Transport used by a request; anything but `ws`/`websocket` is HTTP
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(from = "String")]
pub enum Protocol {
    /// Plain request/response
    #[default]
    Http,
    /// Long-lived WebSocket connection registered under `channel`
    Ws,
}

impl From<String> for Protocol {
    fn from(name: String) -> Self {
        match name.as_str() {
            "ws" | "websocket" => Protocol::Ws,
            _ => Protocol::Http,
        }
    }
}

/// Description of an outbound request. String fields are templates.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Request {
    #[serde(default, deserialize_with = "scalar::string")]
    pub url: String,
    /// HTTP method, GET when empty
    #[serde(default, deserialize_with = "scalar::string")]
    pub method: String,
    #[serde(default, deserialize_with = "scalar::string")]
    pub body: String,
    /// Whole seconds; may itself be a template
    #[serde(default, deserialize_with = "scalar::string")]
    pub timeout: String,
    #[serde(default, deserialize_with = "scalar::ordered_map")]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub protocol: Protocol,
    /// Connection name, only for the ws protocol
    #[serde(default, deserialize_with = "scalar::string")]
    pub channel: String,
}

/// Expectations for a response
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Response {
    /// Header rules; `key` is the header name
    #[serde(default)]
    pub headers: Vec<Rule>,
    /// Latency rules in milliseconds
    #[serde(default)]
    pub latency: Vec<Rule>,
    /// Status code rules
    #[serde(default)]
    pub code: Vec<Rule>,
    /// Body validators
    #[serde(default)]
    pub body: Vec<ValidatorDescr>,
}

/// Expectation of a message from a stream connection
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Receive {
    #[serde(default, deserialize_with = "scalar::string")]
    pub channel: String,
    /// Whole seconds; may itself be a template
    #[serde(default, deserialize_with = "scalar::string")]
    pub timeout: String,
    /// Body validators a message must pass to be taken
    #[serde(default)]
    pub filter: Vec<ValidatorDescr>,
}

/// Group init file
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Init {
    /// Initial store variables
    #[serde(default, deserialize_with = "scalar::map")]
    pub store: HashMap<String, String>,
}

/// Ordered cases sharing one store and one set of stream connections
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    pub name: String,
    pub init: Init,
    pub tests: Vec<Case>,
}

impl Group {
    /// Create a group; cases are ordered by file name
    pub fn new(name: impl Into<String>, init: Init, mut tests: Vec<Case>) -> Self {
        tests.sort_by(|a, b| a.filename.cmp(&b.filename));
        Self {
            name: name.into(),
            init,
            tests,
        }
    }
}
