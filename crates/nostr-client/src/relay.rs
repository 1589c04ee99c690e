//! Relay WebSocket connections
//!
//! A [`RelayConnector`] opens a [`RelayLink`]: a sink of outgoing text frames and
//! a stream of incoming ones. Ping/pong is handled by the transport; a close
//! frame surfaces as [`Error::ConnectionClosed`] on the stream.
//!
//! Two connectors are provided:
//! - [`TungsteniteConnector`] talks to a real relay over `ws://` / `wss://`
//! - [`MemoryRelay`] is an in-process relay driven by the caller

use crate::{Error, Result};
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

/// Outgoing half of a relay connection
pub type FrameSink = Pin<Box<dyn Sink<String, Error = Error> + Send>>;

/// Incoming half of a relay connection
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// An open relay connection
pub struct RelayLink {
    sink: FrameSink,
    stream: FrameStream,
}

impl RelayLink {
    /// Create a link from its halves
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self { sink, stream }
    }

    /// Send one text frame
    pub async fn send(&mut self, frame: String) -> Result<()> {
        self.sink.send(frame).await
    }

    /// Receive the next text frame, `None` once the connection has ended
    pub async fn next_frame(&mut self) -> Option<Result<String>> {
        self.stream.next().await
    }

    /// Close the outgoing half
    pub async fn close(&mut self) -> Result<()> {
        self.sink.close().await
    }
}

impl fmt::Debug for RelayLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayLink").finish_non_exhaustive()
    }
}

/// Opens relay connections
#[async_trait]
pub trait RelayConnector: Send + Sync {
    /// Connect to the relay at `url`
    async fn connect(&self, url: &str) -> Result<RelayLink>;
}

// =============================================================================
// WebSocket connector
// =============================================================================

/// Relay connector backed by tokio-tungstenite-wasm
#[derive(Debug, Clone, Default)]
pub struct TungsteniteConnector;

impl TungsteniteConnector {
    /// Create a new connector
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RelayConnector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<RelayLink> {
        use tokio_tungstenite_wasm::Message;

        let ws_stream = tokio_tungstenite_wasm::connect(url)
            .await
            .map_err(|e| Error::ConnectionRefused(e.to_string()))?;

        let (sink, stream) = ws_stream.split();

        let rx = stream.filter_map(|result| async move {
            match result {
                Ok(msg) => convert_message(msg),
                Err(e) => Some(Err(Error::WebSocket(e.to_string()))),
            }
        });

        let tx = sink
            .with(|frame: String| async move {
                Ok::<_, tokio_tungstenite_wasm::Error>(Message::Text(frame.into()))
            })
            .sink_map_err(|e| Error::WebSocket(e.to_string()));

        tracing::debug!("Opened relay connection to {}", url);
        Ok(RelayLink::new(Box::pin(tx), Box::pin(rx)))
    }
}

/// Map a transport message to a text frame
///
/// Binary frames that are not UTF-8 are dropped; they say nothing about the
/// health of the connection.
fn convert_message(msg: tokio_tungstenite_wasm::Message) -> Option<Result<String>> {
    use tokio_tungstenite_wasm::Message;

    #[allow(unreachable_patterns)]
    match msg {
        Message::Text(text) => Some(Ok(text.to_string())),
        Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Some(Ok(text)),
            Err(e) => {
                tracing::warn!("Dropping binary frame that is not UTF-8: {}", e);
                None
            }
        },
        Message::Close(_) => Some(Err(Error::ConnectionClosed)),
        _ => None,
    }
}

// =============================================================================
// In-memory relay
// =============================================================================

#[derive(Default)]
struct MemoryRelayInner {
    connect_attempts: usize,
    refuse_connections: bool,
    refuse_next: usize,
    sessions: Vec<MemorySession>,
}

struct MemorySession {
    to_client: Option<mpsc::UnboundedSender<Result<String>>>,
    from_client: Arc<Mutex<Vec<String>>>,
}

/// In-process relay for driving a client without a network
///
/// Every successful `connect` opens a new session. Frames pushed with
/// [`MemoryRelay::push_frame`] go to the newest session; frames the client
/// sends are recorded per session.
#[derive(Clone, Default)]
pub struct MemoryRelay {
    inner: Arc<Mutex<MemoryRelayInner>>,
}

impl MemoryRelay {
    /// Create a relay that accepts connections
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse (or accept again) all connection attempts
    pub fn refuse_connections(&self, refuse: bool) {
        self.inner.lock().refuse_connections = refuse;
    }

    /// Refuse the next `count` connection attempts
    pub fn refuse_next(&self, count: usize) {
        self.inner.lock().refuse_next = count;
    }

    /// Number of connection attempts seen, including refused ones
    pub fn connect_attempts(&self) -> usize {
        self.inner.lock().connect_attempts
    }

    /// Number of sessions that were opened
    pub fn session_count(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    /// Whether the newest session is still open from the relay side
    pub fn is_open(&self) -> bool {
        self.inner
            .lock()
            .sessions
            .last()
            .and_then(|s| s.to_client.as_ref())
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Deliver a text frame to the newest session
    ///
    /// Returns `false` if there is no open session.
    pub fn push_frame(&self, frame: impl Into<String>) -> bool {
        let inner = self.inner.lock();
        match inner.sessions.last().and_then(|s| s.to_client.as_ref()) {
            Some(tx) => tx.unbounded_send(Ok(frame.into())).is_ok(),
            None => false,
        }
    }

    /// Deliver a transport error to the newest session
    ///
    /// Returns `false` if there is no open session.
    pub fn push_error(&self, error: Error) -> bool {
        let inner = self.inner.lock();
        match inner.sessions.last().and_then(|s| s.to_client.as_ref()) {
            Some(tx) => tx.unbounded_send(Err(error)).is_ok(),
            None => false,
        }
    }

    /// End the newest session from the relay side
    pub fn drop_connection(&self) {
        let mut inner = self.inner.lock();
        if let Some(session) = inner.sessions.last_mut() {
            session.to_client = None;
        }
    }

    /// Frames the client sent on the newest session
    pub fn sent_frames(&self) -> Vec<String> {
        self.inner
            .lock()
            .sessions
            .last()
            .map(|s| s.from_client.lock().clone())
            .unwrap_or_default()
    }
}

impl fmt::Debug for MemoryRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("MemoryRelay")
            .field("connect_attempts", &inner.connect_attempts)
            .field("sessions", &inner.sessions.len())
            .finish()
    }
}

#[async_trait]
impl RelayConnector for MemoryRelay {
    async fn connect(&self, url: &str) -> Result<RelayLink> {
        let mut inner = self.inner.lock();
        inner.connect_attempts += 1;

        if inner.refuse_connections {
            return Err(Error::ConnectionRefused(format!("{} is refusing connections", url)));
        }
        if inner.refuse_next > 0 {
            inner.refuse_next -= 1;
            return Err(Error::ConnectionRefused(format!("{} refused connection", url)));
        }

        let (to_client, from_relay) = mpsc::unbounded();
        let from_client = Arc::new(Mutex::new(Vec::new()));

        let recorder = Arc::clone(&from_client);
        let sink = futures::sink::unfold(recorder, |recorder, frame: String| async move {
            recorder.lock().push(frame);
            Ok::<_, Error>(recorder)
        });

        inner.sessions.push(MemorySession { to_client: Some(to_client), from_client });

        Ok(RelayLink::new(Box::pin(sink), Box::pin(from_relay)))
    }
}
