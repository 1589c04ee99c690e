//! Snapshot persistence
//!
//! Small pieces of process state (such as the watcher's running flag and
//! counters) are kept as a single JSON file wrapped in a versioned envelope with
//! an md5 checksum. Writes go to a temp file that is renamed into place, so a
//! crash mid-write leaves the previous snapshot intact.

use serde::{de::DeserializeOwned, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

/// Persistence error types
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// State not initialized
    #[error("State not initialized")]
    NotInitialized,

    /// Corruption detected
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// Version mismatch
    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected version
        expected: u32,
        /// Found version
        found: u32,
    },
}

/// Result type for persistence operations
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// On-disk envelope
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
struct VersionedState<T> {
    version: u32,
    checksum: String,
    data: T,
}

fn checksum_of<T: Serialize>(data: &T) -> Result<String> {
    let json = serde_json::to_string(data)?;
    Ok(format!("{:x}", md5::compute(json)))
}

impl<T: Serialize> VersionedState<T> {
    fn new(version: u32, data: T) -> Result<Self> {
        let checksum = checksum_of(&data)?;
        Ok(Self { version, checksum, data })
    }

    fn verify_checksum(&self) -> Result<()> {
        let computed = checksum_of(&self.data)?;
        if computed != self.checksum {
            return Err(PersistenceError::Corruption(format!(
                "Checksum mismatch: expected {}, got {}",
                self.checksum, computed
            )));
        }
        Ok(())
    }
}

/// Persistence configuration
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// Path to the snapshot file
    pub path: PathBuf,
    /// Current schema version
    pub version: u32,
    /// Write through a temp file and rename
    pub atomic_writes: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("watcher_state.json"), version: 1, atomic_writes: true }
    }
}

impl PersistenceConfig {
    /// Create a new configuration
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }
}

/// A value mirrored to a snapshot file
///
/// `init` must be called before `get`/`set`; it loads the snapshot or falls
/// back to `T::default()` when no file exists yet.
pub struct PersistedState<T> {
    config: PersistenceConfig,
    state: Arc<RwLock<Option<T>>>,
    restored: Arc<RwLock<bool>>,
}

impl<T> PersistedState<T>
where
    T: Serialize + DeserializeOwned + Clone + Default,
{
    /// Create a new persisted state manager
    pub fn new(config: PersistenceConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(None)),
            restored: Arc::new(RwLock::new(false)),
        }
    }

    /// Initialize by loading from disk
    pub async fn init(&self) -> Result<()> {
        match self.load_from_disk().await {
            Ok(data) => {
                *self.state.write().await = Some(data);
                *self.restored.write().await = true;
                Ok(())
            }
            Err(PersistenceError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                *self.state.write().await = Some(T::default());
                *self.restored.write().await = false;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Whether `init` found an existing snapshot
    pub async fn was_restored(&self) -> bool {
        *self.restored.read().await
    }

    /// Get the current state
    pub async fn get(&self) -> Result<T> {
        let state = self.state.read().await;
        state.clone().ok_or(PersistenceError::NotInitialized)
    }

    /// Replace the state and persist
    pub async fn set(&self, new_state: T) -> Result<()> {
        let mut state = self.state.write().await;
        self.write_to_disk(&new_state).await?;
        *state = Some(new_state);
        Ok(())
    }

    async fn load_from_disk(&self) -> Result<T> {
        let contents = fs::read_to_string(&self.config.path).await?;
        let versioned: VersionedState<T> = serde_json::from_str(&contents)?;

        versioned.verify_checksum()?;

        if versioned.version != self.config.version {
            return Err(PersistenceError::VersionMismatch {
                expected: self.config.version,
                found: versioned.version,
            });
        }

        Ok(versioned.data)
    }

    async fn write_to_disk(&self, data: &T) -> Result<()> {
        let versioned = VersionedState::new(self.config.version, data.clone())?;
        let json = serde_json::to_string_pretty(&versioned)?;

        if let Some(parent) = self.config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        if self.config.atomic_writes {
            self.write_atomic(&json).await
        } else {
            fs::write(&self.config.path, json).await?;
            Ok(())
        }
    }

    async fn write_atomic(&self, contents: &str) -> Result<()> {
        let temp_path = self.config.path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.config.path).await?;

        Ok(())
    }
}
