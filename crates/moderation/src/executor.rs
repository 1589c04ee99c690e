//! Enforcement executor
//!
//! Calls the relay's content-hiding procedure exactly once per enforcement.
//! A failed call is reported, never retried.

use async_trait::async_trait;
use nostr_client::{ManagementClient, ManagementError};
use std::sync::Arc;
use thiserror::Error;

/// Errors from a hide call
#[derive(Debug, Error)]
pub enum HideError {
    /// Management RPC error
    #[error("Management RPC error: {0}")]
    Management(#[from] ManagementError),

    /// Any other failure
    #[error("Hide failed: {0}")]
    Other(String),
}

impl HideError {
    /// Whether the relay was unreachable or overloaded rather than refusing
    pub fn is_transient(&self) -> bool {
        match self {
            HideError::Management(e) => e.is_network_error(),
            HideError::Other(_) => false,
        }
    }
}

/// Hides content on the relay
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentHider: Send + Sync {
    /// Hide `target_id`; `Ok(false)` means the relay declined
    async fn hide_content(&self, target_id: &str, reason: &str) -> Result<bool, HideError>;
}

#[async_trait]
impl ContentHider for ManagementClient {
    async fn hide_content(&self, target_id: &str, reason: &str) -> Result<bool, HideError> {
        Ok(ManagementClient::hide_content(self, target_id, reason).await?)
    }
}

/// Result of one enforcement attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnforcementOutcome {
    /// Whether the content is now hidden
    pub success: bool,
    /// Error text when it is not
    pub error: Option<String>,
}

impl EnforcementOutcome {
    fn hidden() -> Self {
        Self { success: true, error: None }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()) }
    }
}

/// Runs hide calls
#[derive(Clone)]
pub struct Executor {
    hider: Arc<dyn ContentHider>,
}

impl Executor {
    /// Create an executor
    pub fn new(hider: Arc<dyn ContentHider>) -> Self {
        Self { hider }
    }

    /// Hide `target_id` once
    pub async fn enforce(&self, target_id: &str, reason: &str) -> EnforcementOutcome {
        match self.hider.hide_content(target_id, reason).await {
            Ok(true) => {
                tracing::info!("Hid {}", target_id);
                EnforcementOutcome::hidden()
            }
            Ok(false) => {
                tracing::warn!("Relay declined to hide {}", target_id);
                EnforcementOutcome::failed("relay declined to hide content")
            }
            Err(e) if e.is_transient() => {
                tracing::warn!("Hide call for {} failed, relay unreachable: {}", target_id, e);
                EnforcementOutcome::failed(format!("{} (relay unreachable, not retried)", e))
            }
            Err(e) => {
                tracing::error!("Hide call for {} rejected: {}", target_id, e);
                EnforcementOutcome::failed(e.to_string())
            }
        }
    }
}
