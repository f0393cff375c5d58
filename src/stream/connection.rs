//! One named WebSocket connection with its background tasks

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;

use crate::common::config::StreamConfig;

/// Open connection: a reader task fills `messages`, a writer task sends
/// keepalives and the close frame.
pub struct StreamConnection {
    channel: String,
    /// Cleared before an intentional close so expected I/O errors stay quiet
    open: Arc<AtomicBool>,
    messages: mpsc::Receiver<Vec<u8>>,
    cancel: CancellationToken,
}

impl StreamConnection {
    /// Take ownership of an established socket and start both tasks
    pub fn spawn<S>(socket: WebSocketStream<S>, channel: &str, config: &StreamConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, stream) = socket.split();
        let (tx, messages) = mpsc::channel(config.queue_capacity.max(1));
        let open = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        tokio::spawn(read_loop(
            stream,
            tx,
            open.clone(),
            cancel.clone(),
            channel.to_string(),
        ));
        tokio::spawn(write_loop(
            sink,
            open.clone(),
            cancel.clone(),
            config.keepalive_interval(),
            channel.to_string(),
        ));

        Self {
            channel: channel.to_string(),
            open,
            messages,
            cancel,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Next queued message; `None` once the reader has stopped and the queue is drained
    pub async fn next_message(&mut self) -> Option<Vec<u8>> {
        self.messages.recv().await
    }

    /// Close the connection. Safe to call more than once.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            tracing::debug!(channel = %self.channel, "closing websocket connection");
        }
        self.cancel.cancel();
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        self.close();
    }
}

async fn read_loop<S>(
    mut stream: SplitStream<WebSocketStream<S>>,
    tx: mpsc::Sender<Vec<u8>>,
    open: Arc<AtomicBool>,
    cancel: CancellationToken,
    channel: String,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = stream.next() => next,
        };

        let payload = match next {
            Some(Ok(Message::Text(text))) => text.into_bytes(),
            Some(Ok(Message::Binary(data))) => data,
            Some(Ok(Message::Close(frame))) => {
                if open.swap(false, Ordering::SeqCst) {
                    tracing::info!(channel = %channel, ?frame, "connection closed by peer");
                }
                break;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                if open.load(Ordering::SeqCst) {
                    tracing::error!(channel = %channel, error = %e, "reading message");
                }
                break;
            }
            None => break,
        };

        tracing::info!(channel = %channel, "recv: {}", String::from_utf8_lossy(&payload));

        tokio::select! {
            _ = cancel.cancelled() => break,
            sent = tx.send(payload) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }

    tracing::trace!(channel = %channel, "reader stopped");
}

async fn write_loop<S>(
    mut sink: SplitSink<WebSocketStream<S>, Message>,
    open: Arc<AtomicBool>,
    cancel: CancellationToken,
    interval: Duration,
    channel: String,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                open.store(false, Ordering::SeqCst);

                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: "".into(),
                };
                match sink.send(Message::Close(Some(frame))).await {
                    Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => {}
                    Err(e) => tracing::error!(channel = %channel, error = %e, "closing websocket"),
                }
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = sink.send(Message::Text(keepalive_payload())).await {
                    if open.load(Ordering::SeqCst) {
                        tracing::error!(channel = %channel, error = %e, "write websocket keepalive");
                    }
                    break;
                }
            }
        }
    }

    tracing::trace!(channel = %channel, "writer stopped");
}

/// Keepalive frames carry the current unix time in milliseconds
fn keepalive_payload() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
        .to_string()
}
