//! Enforcement pipeline: guard, then executor, then audit log
//!
//! One call handles one qualifying report end to end and records exactly one
//! decision for it. The watcher runs these calls on spawned tasks so the
//! connection loop never waits on them.

use crate::audit::{record_best_effort, Decision, DecisionAction, DecisionLog};
use crate::executor::Executor;
use crate::guard::DedupGuard;
use crate::report::ReportEvent;
use std::sync::Arc;

/// How a report left the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The target was hidden
    Hidden,
    /// The hide call failed
    Failed(String),
    /// Enforcement was skipped
    Skipped(String),
}

/// Guard, executor and audit log wired together
#[derive(Clone)]
pub struct EnforcementPipeline {
    guard: DedupGuard,
    executor: Executor,
    log: Arc<dyn DecisionLog>,
}

impl EnforcementPipeline {
    /// Create a pipeline
    pub fn new(guard: DedupGuard, executor: Executor, log: Arc<dyn DecisionLog>) -> Self {
        Self { guard, executor, log }
    }

    /// Enforce a report that passed the trust policy
    pub async fn enforce(&self, report: &ReportEvent) -> PipelineOutcome {
        let verdict = self.guard.check(&report.target()).await;
        if let Some(reason) = verdict.skip_reason() {
            tracing::info!("Skipping {} (report {}): {}", report.target(), report.id, reason);
            self.skip(report, &reason).await;
            return PipelineOutcome::Skipped(reason);
        }

        let outcome = self.executor.enforce(&report.target_id, &hide_reason(report)).await;

        if outcome.success {
            let decision = Decision::for_report(report, DecisionAction::AutoHidden, hide_reason(report));
            record_best_effort(self.log.as_ref(), &decision).await;
            PipelineOutcome::Hidden
        } else {
            let error = outcome.error.unwrap_or_else(|| "unknown error".to_string());
            let decision = Decision::for_report(report, DecisionAction::AutoHideFailed, error.clone());
            record_best_effort(self.log.as_ref(), &decision).await;
            PipelineOutcome::Failed(error)
        }
    }

    /// Record that a report was skipped
    pub async fn skip(&self, report: &ReportEvent, reason: &str) {
        let decision = Decision::for_report(report, DecisionAction::AutoHideSkipped, reason);
        record_best_effort(self.log.as_ref(), &decision).await;
    }
}

fn hide_reason(report: &ReportEvent) -> String {
    match &report.reporting_client {
        Some(client) => format!("auto-hide: {} reported via {}", report.category, client),
        None => format!("auto-hide: {}", report.category),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{MemoryDecisionLog, MemoryReviewMarkers};
    use crate::executor::{HideError, MockContentHider};
    use crate::report::TargetType;
    use chrono::Utc;
    use mockall::predicate::eq;

    fn report() -> ReportEvent {
        ReportEvent {
            id: "r1".to_string(),
            reporter_id: "pk".to_string(),
            target_type: TargetType::Event,
            target_id: "ev1".to_string(),
            category: "csam".to_string(),
            reporting_client: Some("clientX".to_string()),
            created_at: Utc::now(),
        }
    }

    fn pipeline(
        hider: MockContentHider,
    ) -> (EnforcementPipeline, Arc<MemoryDecisionLog>, Arc<MemoryReviewMarkers>) {
        let log = Arc::new(MemoryDecisionLog::new());
        let reviews = Arc::new(MemoryReviewMarkers::new());
        let guard = DedupGuard::new(log.clone(), reviews.clone());
        let pipeline = EnforcementPipeline::new(guard, Executor::new(Arc::new(hider)), log.clone());
        (pipeline, log, reviews)
    }

    #[tokio::test]
    async fn test_hidden_is_recorded() {
        let mut hider = MockContentHider::new();
        hider
            .expect_hide_content()
            .with(eq("ev1"), eq("auto-hide: csam reported via clientX"))
            .times(1)
            .returning(|_, _| Ok(true));
        let (pipeline, log, _) = pipeline(hider);

        assert_eq!(pipeline.enforce(&report()).await, PipelineOutcome::Hidden);

        let decisions = log.decisions();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].action, DecisionAction::AutoHidden);
        assert_eq!(decisions[0].report_id, "r1");
    }

    #[tokio::test]
    async fn test_failure_is_recorded_with_error_text() {
        let mut hider = MockContentHider::new();
        hider
            .expect_hide_content()
            .times(1)
            .returning(|_, _| Err(HideError::Other("connection reset".to_string())));
        let (pipeline, log, _) = pipeline(hider);

        let outcome = pipeline.enforce(&report()).await;
        assert_eq!(outcome, PipelineOutcome::Failed("Hide failed: connection reset".to_string()));

        let failed = log.with_action(DecisionAction::AutoHideFailed);
        assert_eq!(failed.len(), 1);
        assert!(failed[0].reason.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_second_enforcement_is_deduplicated() {
        let mut hider = MockContentHider::new();
        hider.expect_hide_content().times(1).returning(|_, _| Ok(true));
        let (pipeline, log, _) = pipeline(hider);

        assert_eq!(pipeline.enforce(&report()).await, PipelineOutcome::Hidden);
        let mut again = report();
        again.id = "r2".to_string();
        assert_eq!(
            pipeline.enforce(&again).await,
            PipelineOutcome::Skipped("already auto-hidden".to_string())
        );

        assert_eq!(log.with_action(DecisionAction::AutoHidden).len(), 1);
        assert_eq!(log.with_action(DecisionAction::AutoHideSkipped).len(), 1);
    }

    #[tokio::test]
    async fn test_human_review_blocks_first_report() {
        let mut hider = MockContentHider::new();
        hider.expect_hide_content().never();
        let (pipeline, log, reviews) = pipeline(hider);
        reviews.mark(report().target());

        let outcome = pipeline.enforce(&report()).await;
        assert!(matches!(outcome, PipelineOutcome::Skipped(_)));
        assert_eq!(log.with_action(DecisionAction::AutoHideSkipped).len(), 1);
    }

    #[tokio::test]
    async fn test_stores_down_still_enforces() {
        let mut hider = MockContentHider::new();
        hider.expect_hide_content().times(1).returning(|_, _| Ok(true));
        let (pipeline, log, reviews) = pipeline(hider);
        log.set_unavailable(true);
        reviews.set_unavailable(true);

        assert_eq!(pipeline.enforce(&report()).await, PipelineOutcome::Hidden);
        assert!(log.decisions().is_empty());
    }
}
