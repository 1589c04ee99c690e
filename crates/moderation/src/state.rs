//! Watcher run state and its persistence
//!
//! [`WatcherState`] is snapshotted on every `running` transition and on each
//! health check, so a restarted process can resume watching on its own.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use storage::{PersistedState, PersistenceConfig, PersistenceError};

/// Process-wide watcher state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatcherState {
    /// Whether the watcher should be connected
    pub running: bool,
    /// When the current connection was established
    pub connected_at: Option<DateTime<Utc>>,
    /// When the last report arrived
    pub last_event_at: Option<DateTime<Utc>>,
    /// Reports normalized so far
    pub events_processed: u64,
    /// Reports that led to a successful hide
    pub events_auto_hidden: u64,
    /// Consecutive failed connection attempts
    pub reconnect_attempts: u32,
    /// Delay before the next reconnect attempt
    #[serde(with = "millis")]
    pub reconnect_delay: Duration,
}

impl Default for WatcherState {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl WatcherState {
    /// Fresh state with the given reconnect delay
    pub fn new(reconnect_delay: Duration) -> Self {
        Self {
            running: false,
            connected_at: None,
            last_event_at: None,
            events_processed: 0,
            events_auto_hidden: 0,
            reconnect_attempts: 0,
            reconnect_delay,
        }
    }

    /// Adjust a snapshot loaded from disk to this process
    ///
    /// The old connection is gone, and the delay is clamped to the current
    /// reconnect bounds.
    pub fn restored(mut self, initial: Duration, max: Duration) -> Self {
        self.connected_at = None;
        self.reconnect_delay = self.reconnect_delay.clamp(initial, max);
        self.events_auto_hidden = self.events_auto_hidden.min(self.events_processed);
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// State plus live, non-persisted fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatcherStatus {
    /// Persisted state
    #[serde(flatten)]
    pub state: WatcherState,
    /// Whether the subscription is currently live
    pub connected: bool,
    /// Whether auto-hide is enabled in configuration
    pub auto_hide_enabled: bool,
}

/// Reply to a control command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    /// Whether the command changed anything
    pub success: bool,
    /// Human-readable outcome
    pub message: String,
    /// Status after the command
    pub status: WatcherStatus,
}

/// Durable home of the watcher state
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the last snapshot, `None` if there is none
    async fn load(&self) -> Result<Option<WatcherState>, PersistenceError>;

    /// Replace the snapshot
    async fn save(&self, state: &WatcherState) -> Result<(), PersistenceError>;
}

/// State kept in a checksummed JSON file
pub struct FileStateStore {
    inner: PersistedState<WatcherState>,
}

impl FileStateStore {
    /// Store at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_config(PersistenceConfig::new(path))
    }

    /// Store with explicit persistence settings
    pub fn with_config(config: PersistenceConfig) -> Self {
        Self { inner: PersistedState::new(config) }
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<Option<WatcherState>, PersistenceError> {
        self.inner.init().await?;
        if !self.inner.was_restored().await {
            return Ok(None);
        }
        Ok(Some(self.inner.get().await?))
    }

    async fn save(&self, state: &WatcherState) -> Result<(), PersistenceError> {
        self.inner.set(state.clone()).await
    }
}

/// State kept in memory only
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<Option<WatcherState>>,
}

impl MemoryStateStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a snapshot
    pub fn with_state(state: WatcherState) -> Self {
        Self { state: Mutex::new(Some(state)) }
    }

    /// Last saved snapshot
    pub fn snapshot(&self) -> Option<WatcherState> {
        self.state.lock().clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<Option<WatcherState>, PersistenceError> {
        Ok(self.state.lock().clone())
    }

    async fn save(&self, state: &WatcherState) -> Result<(), PersistenceError> {
        *self.state.lock() = Some(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_serialized_shape() {
        let state = WatcherState { events_processed: 3, ..WatcherState::new(Duration::from_secs(2)) };
        let status = WatcherStatus { state, connected: true, auto_hide_enabled: false };

        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(
            value,
            json!({
                "running": false,
                "connectedAt": null,
                "lastEventAt": null,
                "eventsProcessed": 3,
                "eventsAutoHidden": 0,
                "reconnectAttempts": 0,
                "reconnectDelay": 2000,
                "connected": true,
                "autoHideEnabled": false
            })
        );
    }

    #[test]
    fn test_restored_clears_connection_and_clamps_delay() {
        let state = WatcherState {
            running: true,
            connected_at: Some(Utc::now()),
            events_processed: 42,
            reconnect_delay: Duration::from_secs(600),
            ..Default::default()
        };

        let restored = state.restored(Duration::from_secs(1), Duration::from_secs(60));
        assert!(restored.running);
        assert_eq!(restored.connected_at, None);
        assert_eq!(restored.events_processed, 42);
        assert_eq!(restored.reconnect_delay, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("watcher_state.json");

        let store = FileStateStore::new(&path);
        assert_eq!(store.load().await.unwrap(), None);

        let state = WatcherState { running: true, events_processed: 42, ..Default::default() };
        store.save(&state).await.unwrap();

        let reopened = FileStateStore::new(&path);
        assert_eq!(reopened.load().await.unwrap(), Some(state));
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("watcher_state.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        assert!(FileStateStore::new(&path).load().await.is_err());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStateStore::new();
        assert_eq!(store.load().await.unwrap(), None);

        let state = WatcherState { running: true, ..Default::default() };
        store.save(&state).await.unwrap();
        assert_eq!(store.snapshot(), Some(state.clone()));
        assert_eq!(MemoryStateStore::with_state(state.clone()).load().await.unwrap(), Some(state));
    }
}
