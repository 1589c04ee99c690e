//! Automated report watcher for a Nostr relay
//!
//! This crate subscribes to content reports (kind 1984), classifies them
//! against a static trust policy and hides content reported by trusted
//! clients for high-severity categories, deferring to any earlier human
//! decision.
//!
//! Data flow: relay frame → [`report::ReportNormalizer`] →
//! [`policy::TrustPolicy`] → [`guard::DedupGuard`] → [`executor::Executor`] →
//! [`audit::DecisionLog`], driven by the [`watcher::ReportWatcher`] actor.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod audit;
pub mod backoff;
pub mod config;
pub mod connection;
pub mod executor;
pub mod guard;
pub mod pipeline;
pub mod policy;
pub mod report;
pub mod scheduler;
pub mod state;
pub mod watcher;

pub use audit::{Decision, DecisionAction, DecisionLog, MemoryDecisionLog, MemoryReviewMarkers, ReviewMarkers};
pub use config::{ConfigError, WatcherConfig};
pub use executor::{ContentHider, HideError};
pub use guard::{DedupGuard, GuardVerdict, StoreFailurePolicy};
pub use policy::{PolicyVerdict, TrustPolicy};
pub use report::{ReportEvent, ReportNormalizer, TargetKey, TargetType};
pub use state::{ControlResponse, FileStateStore, MemoryStateStore, StateStore, WatcherState, WatcherStatus};
pub use watcher::{ReportWatcher, WatcherServices};

use thiserror::Error;

/// Watcher errors
#[derive(Debug, Error)]
pub enum WatcherError {
    /// The actor task has exited
    #[error("Watcher is no longer running")]
    ActorGone,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for watcher operations
pub type Result<T> = std::result::Result<T, WatcherError>;
