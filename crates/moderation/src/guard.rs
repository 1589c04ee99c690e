//! Dedup and human-override guard
//!
//! Consulted only for reports the trust policy already accepted. Two checks
//! run in order:
//!
//! 1. has the target already been auto-hidden (or had a hide confirmed)?
//! 2. has a moderator already reviewed the target?
//!
//! Either hit skips enforcement. When a store cannot answer, the configured
//! [`StoreFailurePolicy`] decides; the default fails open and proceeds.

use crate::audit::{DecisionAction, DecisionLog, ReviewMarkers, StoreError};
use crate::report::TargetKey;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What to do when a guard store errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreFailurePolicy {
    /// Treat the failed check as passed and enforce
    #[default]
    FailOpen,
    /// Skip enforcement
    FailClosed,
}

impl StoreFailurePolicy {
    /// Get a description of the policy
    pub fn description(&self) -> &'static str {
        match self {
            StoreFailurePolicy::FailOpen => "Enforce when the decision history cannot be read",
            StoreFailurePolicy::FailClosed => "Skip enforcement when the decision history cannot be read",
        }
    }
}

/// Guard outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    /// Go ahead and enforce
    Proceed,
    /// The target was already hidden
    AlreadyEnforced,
    /// A moderator already decided on the target
    HumanReviewed,
    /// A store failed and the policy is fail-closed
    StoreUnavailable(String),
}

impl GuardVerdict {
    /// Whether enforcement should go ahead
    pub fn should_proceed(&self) -> bool {
        matches!(self, GuardVerdict::Proceed)
    }

    /// Reason recorded when enforcement is skipped
    pub fn skip_reason(&self) -> Option<String> {
        match self {
            GuardVerdict::Proceed => None,
            GuardVerdict::AlreadyEnforced => Some("already auto-hidden".to_string()),
            GuardVerdict::HumanReviewed => Some("already reviewed by a moderator".to_string()),
            GuardVerdict::StoreUnavailable(e) => Some(format!("decision history unavailable: {}", e)),
        }
    }
}

/// Checks decision history before enforcement
#[derive(Clone)]
pub struct DedupGuard {
    decisions: Arc<dyn DecisionLog>,
    reviews: Arc<dyn ReviewMarkers>,
    failure_policy: StoreFailurePolicy,
}

impl DedupGuard {
    /// Create a guard with the fail-open policy
    pub fn new(decisions: Arc<dyn DecisionLog>, reviews: Arc<dyn ReviewMarkers>) -> Self {
        Self { decisions, reviews, failure_policy: StoreFailurePolicy::default() }
    }

    /// Set the store failure policy
    pub fn with_failure_policy(mut self, policy: StoreFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Active store failure policy
    pub fn failure_policy(&self) -> StoreFailurePolicy {
        self.failure_policy
    }

    /// Whether enforcement should go ahead for `target`
    pub async fn should_proceed(&self, target: &TargetKey) -> bool {
        self.check(target).await.should_proceed()
    }

    /// Run both checks
    pub async fn check(&self, target: &TargetKey) -> GuardVerdict {
        match self.decisions.has_action(target, DecisionAction::enforced()).await {
            Ok(true) => return GuardVerdict::AlreadyEnforced,
            Ok(false) => {}
            Err(e) => {
                if let Some(verdict) = self.on_store_error("decision log", target, e) {
                    return verdict;
                }
            }
        }

        match self.reviews.is_reviewed(target).await {
            Ok(true) => GuardVerdict::HumanReviewed,
            Ok(false) => GuardVerdict::Proceed,
            Err(e) => self.on_store_error("review markers", target, e).unwrap_or(GuardVerdict::Proceed),
        }
    }

    fn on_store_error(&self, store: &str, target: &TargetKey, error: StoreError) -> Option<GuardVerdict> {
        match self.failure_policy {
            StoreFailurePolicy::FailOpen => {
                tracing::warn!("{} check failed for {}, proceeding: {}", store, target, error);
                None
            }
            StoreFailurePolicy::FailClosed => {
                tracing::warn!("{} check failed for {}, skipping: {}", store, target, error);
                Some(GuardVerdict::StoreUnavailable(error.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{Decision, MemoryDecisionLog, MemoryReviewMarkers};
    use crate::report::{ReportEvent, TargetType};
    use chrono::Utc;

    fn report(target_id: &str) -> ReportEvent {
        ReportEvent {
            id: "r1".to_string(),
            reporter_id: "pk".to_string(),
            target_type: TargetType::Event,
            target_id: target_id.to_string(),
            category: "csam".to_string(),
            reporting_client: Some("clientX".to_string()),
            created_at: Utc::now(),
        }
    }

    fn guard() -> (DedupGuard, Arc<MemoryDecisionLog>, Arc<MemoryReviewMarkers>) {
        let log = Arc::new(MemoryDecisionLog::new());
        let reviews = Arc::new(MemoryReviewMarkers::new());
        (DedupGuard::new(log.clone(), reviews.clone()), log, reviews)
    }

    #[tokio::test]
    async fn test_fresh_target_proceeds() {
        let (guard, _, _) = guard();
        assert_eq!(guard.check(&report("ev1").target()).await, GuardVerdict::Proceed);
    }

    #[tokio::test]
    async fn test_already_hidden_skips() {
        let (guard, log, _) = guard();
        log.record(&Decision::for_report(&report("ev1"), DecisionAction::AutoHidden, "x"))
            .await
            .unwrap();

        assert_eq!(guard.check(&report("ev1").target()).await, GuardVerdict::AlreadyEnforced);
        assert!(guard.should_proceed(&report("ev2").target()).await);
    }

    #[tokio::test]
    async fn test_earlier_failure_or_skip_does_not_block() {
        let (guard, log, _) = guard();
        log.record(&Decision::for_report(&report("ev1"), DecisionAction::AutoHideFailed, "503"))
            .await
            .unwrap();
        log.record(&Decision::for_report(&report("ev1"), DecisionAction::AutoHideSkipped, "spam"))
            .await
            .unwrap();

        assert!(guard.should_proceed(&report("ev1").target()).await);
    }

    #[tokio::test]
    async fn test_target_type_is_part_of_identity() {
        let (guard, log, _) = guard();
        log.record(&Decision::for_report(&report("abc"), DecisionAction::AutoHidden, "x"))
            .await
            .unwrap();

        let account = TargetKey { target_type: TargetType::Account, target_id: "abc".to_string() };
        assert!(guard.should_proceed(&account).await);
    }

    #[tokio::test]
    async fn test_human_review_takes_precedence() {
        let (guard, _, reviews) = guard();
        reviews.mark(report("ev1").target());
        assert_eq!(guard.check(&report("ev1").target()).await, GuardVerdict::HumanReviewed);
    }

    #[tokio::test]
    async fn test_fail_open_on_store_errors() {
        let (guard, log, reviews) = guard();
        log.set_unavailable(true);
        reviews.set_unavailable(true);

        assert_eq!(guard.failure_policy(), StoreFailurePolicy::FailOpen);
        assert_eq!(guard.check(&report("ev1").target()).await, GuardVerdict::Proceed);
    }

    #[tokio::test]
    async fn test_fail_open_still_honours_working_store() {
        let (guard, log, reviews) = guard();
        log.set_unavailable(true);
        reviews.mark(report("ev1").target());

        assert_eq!(guard.check(&report("ev1").target()).await, GuardVerdict::HumanReviewed);
    }

    #[tokio::test]
    async fn test_fail_closed() {
        let (guard, _, reviews) = guard();
        let guard = guard.with_failure_policy(StoreFailurePolicy::FailClosed);
        reviews.set_unavailable(true);

        let verdict = guard.check(&report("ev1").target()).await;
        assert!(matches!(verdict, GuardVerdict::StoreUnavailable(_)));
        assert!(verdict.skip_reason().unwrap().contains("review markers are offline"));
    }

    #[test]
    fn test_skip_reasons() {
        assert_eq!(GuardVerdict::Proceed.skip_reason(), None);
        assert_eq!(GuardVerdict::AlreadyEnforced.skip_reason().as_deref(), Some("already auto-hidden"));
        assert!(StoreFailurePolicy::FailOpen.description().contains("Enforce"));
    }
}
