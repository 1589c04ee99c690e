//! Report stream connection
//!
//! Owns at most one relay link. `connect` opens it and subscribes to reports
//! created from now on; `disconnect` unsubscribes and closes. Loss detection
//! is the caller's job: a `None` or `Err` from [`ConnectionManager::next_frame`]
//! means the link is gone and [`ConnectionManager::mark_lost`] should be called.

use chrono::Utc;
use nostr_client::{ClientMessage, Filter, RelayConnector, RelayLink, KIND_REPORT};
use std::future;
use std::sync::Arc;
use std::time::Duration;

/// Connection lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No link
    Disconnected,
    /// Opening a link and subscribing
    Connecting,
    /// Subscribed to the report stream
    Subscribed,
}

/// Single relay subscription
pub struct ConnectionManager {
    connector: Arc<dyn RelayConnector>,
    relay_url: String,
    subscription_id: String,
    connect_timeout: Duration,
    link: Option<RelayLink>,
    phase: Phase,
}

impl ConnectionManager {
    /// Create a disconnected manager
    pub fn new(
        connector: Arc<dyn RelayConnector>,
        relay_url: impl Into<String>,
        subscription_id: impl Into<String>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            relay_url: relay_url.into(),
            subscription_id: subscription_id.into(),
            connect_timeout,
            link: None,
            phase: Phase::Disconnected,
        }
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the subscription is live
    pub fn is_connected(&self) -> bool {
        self.phase == Phase::Subscribed
    }

    /// Subscription id in use
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Open a link and subscribe to new reports
    ///
    /// Any existing link is dropped first.
    pub async fn connect(&mut self) -> nostr_client::Result<()> {
        self.link = None;
        self.phase = Phase::Connecting;
        tracing::info!("Connecting to {}", self.relay_url);

        let opened = tokio::time::timeout(self.connect_timeout, self.open()).await;
        match opened {
            Ok(Ok(link)) => {
                self.link = Some(link);
                self.phase = Phase::Subscribed;
                tracing::info!("Subscribed to reports on {}", self.relay_url);
                Ok(())
            }
            Ok(Err(e)) => {
                self.phase = Phase::Disconnected;
                Err(e)
            }
            Err(_) => {
                self.phase = Phase::Disconnected;
                Err(nostr_client::Error::WebSocket(format!(
                    "timed out after {:?} connecting to {}",
                    self.connect_timeout, self.relay_url
                )))
            }
        }
    }

    async fn open(&mut self) -> nostr_client::Result<RelayLink> {
        let mut link = self.connector.connect(&self.relay_url).await?;

        let since = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        let request =
            ClientMessage::req(self.subscription_id.as_str(), vec![Filter::live(KIND_REPORT, since)]);
        link.send(request.to_json()?).await?;

        Ok(link)
    }

    /// Unsubscribe and close
    pub async fn disconnect(&mut self) {
        self.phase = Phase::Disconnected;
        let Some(mut link) = self.link.take() else {
            return;
        };

        let close = ClientMessage::close(self.subscription_id.as_str());
        match close.to_json() {
            Ok(frame) => {
                if let Err(e) = link.send(frame).await {
                    tracing::debug!("Failed to send CLOSE: {}", e);
                }
            }
            Err(e) => tracing::debug!("Failed to encode CLOSE: {}", e),
        }

        if let Err(e) = link.close().await {
            tracing::debug!("Failed to close link: {}", e);
        }
        tracing::info!("Disconnected from {}", self.relay_url);
    }

    /// Forget a link that has already failed
    pub fn mark_lost(&mut self) {
        self.link = None;
        self.phase = Phase::Disconnected;
    }

    /// Next frame from the relay
    ///
    /// Cancel safe. Never completes while there is no link.
    pub async fn next_frame(&mut self) -> Option<nostr_client::Result<String>> {
        match self.link.as_mut() {
            Some(link) => link.next_frame().await,
            None => future::pending().await,
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("relay_url", &self.relay_url)
            .field("subscription_id", &self.subscription_id)
            .field("phase", &self.phase)
            .finish()
    }
}
