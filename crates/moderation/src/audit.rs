//! Decision audit log
//!
//! Every processed report leaves exactly one [`Decision`]. The log is
//! append-only and advisory: a failed write is logged and dropped, never
//! surfaced to the watcher loop.

use crate::report::{ReportEvent, TargetKey, TargetType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use storage::{DatabaseError, DecisionRecord, DecisionStore, ReviewStore};
use thiserror::Error;

/// Actor id recorded for watcher decisions
pub const AUTO_ACTOR: &str = "auto";

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Store could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Moderation action recorded in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    /// Content was hidden by the watcher
    AutoHidden,
    /// The hide call failed or was refused
    AutoHideFailed,
    /// The report did not lead to enforcement
    AutoHideSkipped,
    /// A moderator confirmed an automatic hide (written by the dashboard)
    AutoHideConfirmed,
}

impl DecisionAction {
    /// Stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionAction::AutoHidden => "auto_hidden",
            DecisionAction::AutoHideFailed => "auto_hide_failed",
            DecisionAction::AutoHideSkipped => "auto_hide_skipped",
            DecisionAction::AutoHideConfirmed => "auto_hide_confirmed",
        }
    }

    /// Actions meaning the target is already hidden
    pub fn enforced() -> &'static [DecisionAction] {
        &[DecisionAction::AutoHidden, DecisionAction::AutoHideConfirmed]
    }
}

impl fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    /// Target type
    pub target_type: TargetType,
    /// Target id
    pub target_id: String,
    /// Action taken
    pub action: DecisionAction,
    /// Why
    pub reason: String,
    /// Always [`AUTO_ACTOR`] for the watcher
    pub actor_id: String,
    /// Report that triggered the decision
    pub report_id: String,
    /// Author of that report
    pub reporter_id: String,
    /// When the decision was made
    pub timestamp: DateTime<Utc>,
}

impl Decision {
    /// Decision about `report`, timestamped now
    pub fn for_report(report: &ReportEvent, action: DecisionAction, reason: impl Into<String>) -> Self {
        Self {
            target_type: report.target_type,
            target_id: report.target_id.clone(),
            action,
            reason: reason.into(),
            actor_id: AUTO_ACTOR.to_string(),
            report_id: report.id.clone(),
            reporter_id: report.reporter_id.clone(),
            timestamp: Utc::now(),
        }
    }

    /// Key of the decision's target
    pub fn target(&self) -> TargetKey {
        TargetKey { target_type: self.target_type, target_id: self.target_id.clone() }
    }
}

impl From<&Decision> for DecisionRecord {
    fn from(decision: &Decision) -> Self {
        DecisionRecord {
            target_type: decision.target_type.as_str().to_string(),
            target_id: decision.target_id.clone(),
            action: decision.action.as_str().to_string(),
            reason: decision.reason.clone(),
            actor_id: decision.actor_id.clone(),
            report_id: Some(decision.report_id.clone()),
            reporter_id: Some(decision.reporter_id.clone()),
            created_at: decision.timestamp.timestamp(),
        }
    }
}

/// Append-only decision log
#[async_trait]
pub trait DecisionLog: Send + Sync {
    /// Append a decision
    async fn record(&self, decision: &Decision) -> Result<()>;

    /// Whether the target has a decision with any of `actions`
    async fn has_action(&self, target: &TargetKey, actions: &[DecisionAction]) -> Result<bool>;
}

/// Human review markers, read-only to the watcher
#[async_trait]
pub trait ReviewMarkers: Send + Sync {
    /// Whether a moderator has already adjudicated the target
    async fn is_reviewed(&self, target: &TargetKey) -> Result<bool>;
}

/// Append a decision, logging instead of failing
pub async fn record_best_effort(log: &dyn DecisionLog, decision: &Decision) {
    match log.record(decision).await {
        Ok(()) => tracing::debug!(
            "Recorded {} for {} (report {})",
            decision.action,
            decision.target(),
            decision.report_id
        ),
        Err(e) => tracing::warn!(
            "Failed to record {} for {}: {}",
            decision.action,
            decision.target(),
            e
        ),
    }
}

// =============================================================================
// SQLite-backed stores
// =============================================================================

#[async_trait]
impl DecisionLog for DecisionStore {
    async fn record(&self, decision: &Decision) -> Result<()> {
        self.insert(&DecisionRecord::from(decision)).await?;
        Ok(())
    }

    async fn has_action(&self, target: &TargetKey, actions: &[DecisionAction]) -> Result<bool> {
        let actions: Vec<&str> = actions.iter().map(DecisionAction::as_str).collect();
        Ok(self.exists(target.target_type.as_str(), &target.target_id, &actions).await?)
    }
}

#[async_trait]
impl ReviewMarkers for ReviewStore {
    async fn is_reviewed(&self, target: &TargetKey) -> Result<bool> {
        Ok(ReviewStore::is_reviewed(self, target.target_type.as_str(), &target.target_id).await?)
    }
}

// =============================================================================
// In-memory stores
// =============================================================================

/// In-process decision log
///
/// Can be switched into an unavailable mode where every call fails.
#[derive(Debug, Default)]
pub struct MemoryDecisionLog {
    decisions: Mutex<Vec<Decision>>,
    unavailable: AtomicBool,
}

impl MemoryDecisionLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail (or succeed again)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// All recorded decisions, oldest first
    pub fn decisions(&self) -> Vec<Decision> {
        self.decisions.lock().clone()
    }

    /// Recorded decisions with `action`
    pub fn with_action(&self, action: DecisionAction) -> Vec<Decision> {
        self.decisions.lock().iter().filter(|d| d.action == action).cloned().collect()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("decision log is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DecisionLog for MemoryDecisionLog {
    async fn record(&self, decision: &Decision) -> Result<()> {
        self.check_available()?;
        self.decisions.lock().push(decision.clone());
        Ok(())
    }

    async fn has_action(&self, target: &TargetKey, actions: &[DecisionAction]) -> Result<bool> {
        self.check_available()?;
        Ok(self
            .decisions
            .lock()
            .iter()
            .any(|d| d.target() == *target && actions.contains(&d.action)))
    }
}

/// In-process human review markers
#[derive(Debug, Default)]
pub struct MemoryReviewMarkers {
    reviewed: Mutex<HashSet<TargetKey>>,
    unavailable: AtomicBool,
}

impl MemoryReviewMarkers {
    /// Create an empty marker set
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a target as reviewed by a moderator
    pub fn mark(&self, target: TargetKey) {
        self.reviewed.lock().insert(target);
    }

    /// Make every call fail (or succeed again)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReviewMarkers for MemoryReviewMarkers {
    async fn is_reviewed(&self, target: &TargetKey) -> Result<bool> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("review markers are offline".to_string()));
        }
        Ok(self.reviewed.lock().contains(target))
    }
}
