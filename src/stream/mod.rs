//! Stream connection manager
//!
//! Owns the named WebSocket connections of one test group. A later case can
//! wait on a connection opened by an earlier one; every connection is
//! closed when the manager is flushed or dropped.

mod connection;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio_tungstenite::connect_async;

use crate::common::config::StreamConfig;
use crate::common::{Error, Result};
use crate::transport::Exchange;

pub use connection::StreamConnection;

/// Named stream connections of one group
pub struct StreamManager {
    config: StreamConfig,
    connections: HashMap<String, StreamConnection>,
}

impl StreamManager {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            connections: HashMap::new(),
        }
    }

    /// Open a connection under `channel`, closing any previous one with that name.
    ///
    /// The handshake response is returned so it can be validated like any
    /// other response.
    pub async fn open(&mut self, channel: &str, url: &str, timeout: Duration) -> Result<Exchange> {
        if channel.is_empty() {
            return Err(Error::EmptyChannel);
        }

        if let Some(previous) = self.connections.remove(channel) {
            tracing::debug!(channel = %channel, "replacing existing connection");
            previous.close();
        }

        let started = Instant::now();
        let (socket, response) = tokio::time::timeout(timeout, connect_async(url))
            .await
            .map_err(|_| Error::Timeout(timeout))??;
        let latency = started.elapsed();

        tracing::trace!(channel = %channel, url = %url, "success open websocket connection");

        let connection = StreamConnection::spawn(socket, channel, &self.config);
        self.connections.insert(channel.to_string(), connection);

        Ok(Exchange {
            status: response.status().as_u16(),
            headers: response.headers().clone(),
            body: response.body().clone().unwrap_or_default(),
            latency,
        })
    }

    /// Wait for a message on `channel` that `accept` agrees to.
    ///
    /// Rejected messages are dropped. Fails when the timeout elapses or the
    /// connection closes first.
    pub async fn receive<F>(&mut self, channel: &str, timeout: Duration, mut accept: F) -> Result<Vec<u8>>
    where
        F: FnMut(&[u8]) -> bool,
    {
        if channel.is_empty() {
            return Err(Error::EmptyChannel);
        }

        let connection = self
            .connections
            .get_mut(channel)
            .ok_or_else(|| Error::ConnectionNotFound(channel.to_string()))?;

        let deadline = deadline_after(timeout);
        loop {
            match tokio::time::timeout_at(deadline, connection.next_message()).await {
                Ok(Some(message)) => {
                    if accept(&message) {
                        return Ok(message);
                    }
                }
                Ok(None) => return Err(Error::ConnectionClosed(channel.to_string())),
                Err(_) => return Err(Error::Timeout(timeout)),
            }
        }
    }

    /// Whether a connection exists under `channel` and has not been closed
    pub fn is_open(&self, channel: &str) -> bool {
        self.connections
            .get(channel)
            .is_some_and(StreamConnection::is_open)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Close and forget every connection
    pub fn close_all(&mut self) {
        for (_, connection) in self.connections.drain() {
            connection.close();
        }
    }
}

/// Deadline `timeout` from now, saturating far in the future
fn deadline_after(timeout: Duration) -> tokio::time::Instant {
    let now = tokio::time::Instant::now();
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

// About thirty years
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

impl Drop for StreamManager {
    fn drop(&mut self) {
        self.close_all();
    }
}
