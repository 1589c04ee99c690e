//! Trust and category policy
//!
//! A report qualifies for automatic enforcement only when its category is in
//! the high-severity set *and* it names a trusted reporting client. A missing
//! client identifier counts as untrusted.

use crate::config::WatcherConfig;
use crate::report::{ReportEvent, TargetType};
use std::collections::HashSet;

/// Outcome of the trust gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyVerdict {
    /// Eligible for enforcement
    Qualifies,
    /// Not eligible, with the reason recorded in the audit log
    Skip(String),
}

impl PolicyVerdict {
    /// Whether the report is eligible
    pub fn qualifies(&self) -> bool {
        matches!(self, PolicyVerdict::Qualifies)
    }
}

/// Static trust list and category allow-list
#[derive(Debug, Clone, Default)]
pub struct TrustPolicy {
    enabled: bool,
    categories: HashSet<String>,
    trusted_clients: HashSet<String>,
}

impl TrustPolicy {
    /// Create a policy
    pub fn new(
        enabled: bool,
        categories: HashSet<String>,
        trusted_clients: HashSet<String>,
    ) -> Self {
        Self { enabled, categories, trusted_clients }
    }

    /// Policy described by a watcher configuration
    pub fn from_config(config: &WatcherConfig) -> Self {
        Self::new(
            config.auto_hide_enabled,
            config.categories.clone(),
            config.trusted_clients.clone(),
        )
    }

    /// Whether auto-hide is switched on
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the report qualifies for enforcement
    pub fn qualifies(&self, report: &ReportEvent) -> bool {
        self.evaluate(report).qualifies()
    }

    /// Evaluate the report and name the reason when it does not qualify
    pub fn evaluate(&self, report: &ReportEvent) -> PolicyVerdict {
        if !self.enabled {
            return PolicyVerdict::Skip("auto-hide disabled".to_string());
        }

        if !self.categories.contains(&report.category) {
            return PolicyVerdict::Skip(format!(
                "category '{}' is not high-severity",
                report.category
            ));
        }

        match report.reporting_client.as_deref() {
            None => return PolicyVerdict::Skip("no reporting client".to_string()),
            Some(client) if !self.trusted_clients.contains(client) => {
                return PolicyVerdict::Skip(format!("client '{}' is not trusted", client));
            }
            Some(_) => {}
        }

        if report.target_type == TargetType::Unknown {
            return PolicyVerdict::Skip("report has no target".to_string());
        }

        PolicyVerdict::Qualifies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn policy() -> TrustPolicy {
        let config = WatcherConfig::default().trusted_clients(["clientX", "clientY"]);
        TrustPolicy::from_config(&config)
    }

    fn report(category: &str, client: Option<&str>) -> ReportEvent {
        ReportEvent {
            id: "r1".to_string(),
            reporter_id: "pk-reporter".to_string(),
            target_type: TargetType::Event,
            target_id: "ev1".to_string(),
            category: category.to_string(),
            reporting_client: client.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_trusted_high_severity_qualifies() {
        let policy = policy();
        assert!(policy.qualifies(&report("sexual_minors", Some("clientX"))));
        assert!(policy.qualifies(&report("csam", Some("clientY"))));
        assert!(policy.qualifies(&report("NS-csam", Some("clientX"))));
    }

    #[test]
    fn test_low_severity_skipped() {
        let verdict = policy().evaluate(&report("spam", Some("clientX")));
        assert_eq!(verdict, PolicyVerdict::Skip("category 'spam' is not high-severity".to_string()));
    }

    #[test]
    fn test_category_match_is_exact() {
        assert!(!policy().qualifies(&report("CSAM", Some("clientX"))));
    }

    #[test]
    fn test_missing_client_is_untrusted() {
        let verdict = policy().evaluate(&report("csam", None));
        assert_eq!(verdict, PolicyVerdict::Skip("no reporting client".to_string()));
    }

    #[test]
    fn test_untrusted_client() {
        let verdict = policy().evaluate(&report("csam", Some("clientZ")));
        assert!(!verdict.qualifies());
    }

    #[test]
    fn test_unknown_target_never_qualifies() {
        let mut report = report("csam", Some("clientX"));
        report.target_type = TargetType::Unknown;
        report.target_id.clear();
        assert!(!policy().qualifies(&report));
    }

    #[test]
    fn test_disabled_skips_everything() {
        let config = WatcherConfig::default().trusted_clients(["clientX"]).auto_hide_enabled(false);
        let policy = TrustPolicy::from_config(&config);
        assert!(!policy.is_enabled());
        assert_eq!(
            policy.evaluate(&report("csam", Some("clientX"))),
            PolicyVerdict::Skip("auto-hide disabled".to_string())
        );
    }
}
