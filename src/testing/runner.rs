//! Test runner implementation
//!
//! Runs the cases of a group in order against one shared store and one set
//! of stream connections. The first failing case stops its group.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::Client;

use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::rules::Rule;
use crate::store::{Environment, Store};
use crate::stream::StreamManager;
use crate::transport::{self, Exchange, HttpRequest};
use crate::validators::{
    BodyKind, BodyValidator, CodeValidator, HeaderValidator, LatencyValidator, ValidatorDescr,
};

use super::config::{Case, Group, Protocol, Receive, Request, Response};
use super::report::{Diagnostic, RunSummary};

/// Runs the cases of a single group
pub struct GroupRunner {
    group: String,
    store: Store,
    streams: StreamManager,
    client: Client,
    default_timeout: Duration,
    diagnostics: Vec<Diagnostic>,
}

impl GroupRunner {
    pub fn new(group: &Group, env: &Environment, client: Client, config: &Config) -> Self {
        Self {
            group: group.name.clone(),
            store: Store::new(env, &group.init.store),
            streams: StreamManager::new(config.stream.clone()),
            client,
            default_timeout: config.runner.default_timeout(),
            diagnostics: Vec::new(),
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Run one case. Failures are logged and recorded as diagnostics.
    #[tracing::instrument(skip_all, fields(group = %self.group, file = %case.filename))]
    pub async fn run_case(&mut self, case: &Case) -> bool {
        if !case.receive.filter.is_empty() {
            let message = match self.receive(&case.receive).await {
                Ok(message) => message,
                Err(e) => return self.fail(case, "receive", "", e),
            };

            if !self.valid_bodies(case, &case.message, &message) {
                return false;
            }
        }

        if case.request.url.is_empty() {
            return true;
        }

        let exchange = match self.request(&case.request).await {
            Ok(exchange) => exchange,
            Err(e) => return self.fail(case, "request", "", e),
        };

        self.valid_response(case, &case.response, &exchange)
    }

    /// Close every stream connection of the group
    pub fn flush(&mut self) {
        self.streams.close_all();
    }

    async fn receive(&mut self, receive: &Receive) -> Result<Vec<u8>> {
        let channel = self.resolve("channel", &receive.channel)?;
        let timeout = self.timeout(&receive.timeout)?;

        tracing::trace!(channel = %channel, ?timeout, "receive websocket message");

        let filter = receive
            .filter
            .iter()
            .map(|descriptor| {
                descriptor
                    .body_kind()
                    .map(|kind| (kind, descriptor.rules.as_slice()))
            })
            .collect::<Result<Vec<_>>>()?;

        let store = &mut self.store;
        self.streams
            .receive(&channel, timeout, |message| passes(store, &filter, message))
            .await
    }

    async fn request(&mut self, request: &Request) -> Result<Exchange> {
        let timeout = self.timeout(&request.timeout)?;
        let url = self.resolve("url", &request.url)?;

        match request.protocol {
            Protocol::Ws => {
                let channel = self.resolve("channel", &request.channel)?;
                tracing::debug!(channel = %channel, url = %url, ?timeout, "opening websocket connection");
                self.streams.open(&channel, &url, timeout).await
            }
            Protocol::Http => {
                let mut headers = Vec::with_capacity(request.headers.len());
                for (key, value) in &request.headers {
                    headers.push((
                        self.resolve("header key", key)?,
                        self.resolve("header value", value)?,
                    ));
                }

                let request = HttpRequest {
                    method: self.resolve("method", &request.method)?,
                    url,
                    body: self.resolve("body", &request.body)?,
                    headers,
                    timeout,
                };

                tracing::debug!(
                    method = %request.method,
                    url = %request.url,
                    ?timeout,
                    body = %request.body,
                    "sending HTTP request"
                );

                let exchange = transport::send(&self.client, &request).await?;
                tracing::trace!("success HTTP request");
                Ok(exchange)
            }
        }
    }

    /// Every class of expectations is checked, even after one has failed
    fn valid_response(&mut self, case: &Case, expected: &Response, exchange: &Exchange) -> bool {
        tracing::trace!(
            code = exchange.status,
            headers = ?exchange.headers,
            response = %String::from_utf8_lossy(&exchange.body),
            "validating response"
        );

        let headers = self.valid_headers(case, &expected.headers, &exchange.headers);
        let code = self.valid_code(case, &expected.code, exchange.status);
        let latency = self.valid_latency(case, &expected.latency, exchange.latency);
        let body = self.valid_bodies(case, &expected.body, &exchange.body);

        headers && code && latency && body
    }

    fn valid_headers(&mut self, case: &Case, rules: &[Rule], headers: &HeaderMap) -> bool {
        for (index, rule) in rules.iter().enumerate() {
            let validator = format!("header[{}]", index);
            let result = HeaderValidator::new(&mut self.store).valid_header(rule, headers);
            match result {
                Ok(_) => passed(&validator, rule),
                Err(e) => return self.fail(case, &validator, &rule.key, e),
            }
        }
        true
    }

    fn valid_code(&mut self, case: &Case, rules: &[Rule], status: u16) -> bool {
        for (index, rule) in rules.iter().enumerate() {
            let validator = format!("code[{}]", index);
            let result = CodeValidator::new(&mut self.store).valid_code(rule, status);
            match result {
                Ok(()) => passed(&validator, rule),
                Err(e) => return self.fail(case, &validator, &rule.key, e),
            }
        }
        true
    }

    fn valid_latency(&mut self, case: &Case, rules: &[Rule], latency: Duration) -> bool {
        for (index, rule) in rules.iter().enumerate() {
            let validator = format!("latency[{}]", index);
            let result = LatencyValidator::new(&mut self.store).valid_latency(rule, latency);
            match result {
                Ok(()) => passed(&validator, rule),
                Err(e) => return self.fail(case, &validator, &rule.key, e),
            }
        }
        true
    }

    fn valid_bodies(&mut self, case: &Case, descriptors: &[ValidatorDescr], body: &[u8]) -> bool {
        for descriptor in descriptors {
            let kind = match descriptor.body_kind() {
                Ok(kind) => kind,
                Err(e) => return self.fail(case, &descriptor.kind, "", e),
            };

            for (index, rule) in descriptor.rules.iter().enumerate() {
                let validator = format!("{}[{}]", kind, index);
                let result = BodyValidator::new(&mut self.store, kind).valid_body(rule, body);
                match result {
                    Ok(()) => passed(&validator, rule),
                    Err(e) => return self.fail(case, &validator, &rule.key, e),
                }
            }
        }
        true
    }

    /// Parse a timeout in whole seconds; empty or non-positive means the default
    fn timeout(&self, text: &str) -> Result<Duration> {
        let resolved = self.resolve("timeout", text)?;
        let resolved = resolved.trim();
        if resolved.is_empty() {
            return Ok(self.default_timeout);
        }

        let seconds: i64 = resolved.parse().map_err(|e: std::num::ParseIntError| {
            Error::InvalidTimeout {
                value: resolved.to_string(),
                reason: e.to_string(),
            }
        })?;

        if seconds > 0 {
            Ok(Duration::from_secs(seconds.unsigned_abs()))
        } else {
            Ok(self.default_timeout)
        }
    }

    fn resolve(&self, field: &'static str, text: &str) -> Result<String> {
        self.store
            .replace(text)
            .map_err(|e| Error::prepare(field, e))
    }

    fn fail(&mut self, case: &Case, validator: &str, key: &str, error: Error) -> bool {
        let class = error.class();
        tracing::error!(
            validator = %validator,
            key = %key,
            class = %class,
            error = %error,
            "test failed"
        );

        self.diagnostics.push(Diagnostic {
            group: self.group.clone(),
            file: case.filename.clone(),
            case: case.name.clone(),
            validator: validator.to_string(),
            key: key.to_string(),
            class,
            reason: error.to_string(),
        });
        false
    }
}

fn passed(validator: &str, rule: &Rule) {
    tracing::info!(validator = %validator, rule_type = %rule.kind, key = %rule.key, "rule passed");
}

/// Silent filter check: true when every rule of every validator holds
fn passes(store: &mut Store, filter: &[(BodyKind, &[Rule])], message: &[u8]) -> bool {
    filter.iter().all(|(kind, rules)| {
        rules
            .iter()
            .all(|rule| BodyValidator::new(store, *kind).valid_body(rule, message).is_ok())
    })
}

/// Runs groups and accumulates results across them
pub struct Runner {
    config: Config,
    env: Environment,
    client: Client,
    summary: RunSummary,
}

impl Runner {
    pub fn new(config: Config, env: Environment) -> Result<Self> {
        let client = transport::build_client(config.runner.follow_redirects)?;
        Ok(Self {
            config,
            env,
            client,
            summary: RunSummary::default(),
        })
    }

    /// Run one group until its first failing case.
    ///
    /// Returns the cumulative `(errors, successes)` of this runner.
    pub async fn run(&mut self, group: &Group) -> (usize, usize) {
        tracing::trace!(group = %group.name, "run group");

        let mut runner = GroupRunner::new(group, &self.env, self.client.clone(), &self.config);
        for case in &group.tests {
            if runner.run_case(case).await {
                self.summary.successes += 1;
            } else {
                self.summary.errors += 1;
                break;
            }
        }
        runner.flush();

        self.summary.diagnostics.extend(runner.into_diagnostics());
        (self.summary.errors, self.summary.successes)
    }

    pub fn into_summary(self) -> RunSummary {
        self.summary
    }
}
