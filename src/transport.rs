//! HTTP transport
//!
//! Sends one fully resolved request and reads the whole response, which is
//! then validated several times (headers, code, latency, body).

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{redirect, Client, Method, Url};

use crate::common::{Error, Result};

/// A response read to completion
#[derive(Debug, Clone, Default)]
pub struct Exchange {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// Time from sending the request until the response was read
    pub latency: Duration,
}

/// A request with every template already resolved
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub body: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

/// Build the client shared by every request of a run
pub fn build_client(follow_redirects: bool) -> Result<Client> {
    let policy = if follow_redirects {
        redirect::Policy::default()
    } else {
        redirect::Policy::none()
    };

    Client::builder()
        .redirect(policy)
        .build()
        .map_err(Error::Http)
}

/// Parse a method name; an empty method is GET
pub fn parse_method(method: &str) -> Result<Method> {
    let method = method.trim();
    if method.is_empty() {
        return Ok(Method::GET);
    }
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|e| Error::InvalidRequest(format!("invalid method '{}': {}", method, e)))
}

/// Send a request and read the full response
pub async fn send(client: &Client, request: &HttpRequest) -> Result<Exchange> {
    let method = parse_method(&request.method)?;
    let url = Url::parse(&request.url)
        .map_err(|e| Error::InvalidRequest(format!("invalid url '{}': {}", request.url, e)))?;

    let mut builder = client.request(method, url).timeout(request.timeout);
    for (key, value) in &request.headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| Error::InvalidRequest(format!("invalid header key '{}': {}", key, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidRequest(format!("invalid header value '{}': {}", value, e)))?;
        builder = builder.header(name, value);
    }
    if !request.body.is_empty() {
        builder = builder.body(request.body.clone());
    }

    let started = Instant::now();
    let response = builder
        .send()
        .await
        .map_err(|e| classify(e, request.timeout))?;

    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let body = response
        .bytes()
        .await
        .map_err(|e| classify(e, request.timeout))?
        .to_vec();

    Ok(Exchange {
        status,
        headers,
        body,
        latency: started.elapsed(),
    })
}

fn classify(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        Error::Timeout(timeout)
    } else {
        Error::Http(err)
    }
}
