//! Nostr relay client library
//!
//! This crate provides the wire types for Nostr events and relay frames,
//! a WebSocket relay connector, and a client for the relay management RPC
//! surface used to hide content.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod event;
pub mod management;
pub mod message;
pub mod relay;

pub use event::{Event, Filter, Tag, KIND_REPORT};
pub use management::{ManagementClient, ManagementClientConfig, ManagementError};
pub use message::{ClientMessage, RelayMessage};
pub use relay::{MemoryRelay, RelayConnector, RelayLink, TungsteniteConnector};

/// Result type for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for relay operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection was closed by the remote side
    #[error("Connection closed")]
    ConnectionClosed,

    /// Connection attempt was refused
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    /// Frame could not be encoded or decoded
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Protocol(err.to_string())
    }
}
