//! Report normalization
//!
//! Reporting clients evolved independently, so a report's category can arrive
//! in several places. [`ReportNormalizer`] runs an ordered list of
//! [`CategoryExtractor`] strategies and takes the first match:
//!
//! 1. a dedicated `["report-type", <category>]` tag
//! 2. a NIP-32 label in the `social.nos.ontology` namespace
//! 3. a NIP-32 label in the `MOD` namespace
//! 4. the qualifier on the target tag, `["e", <id>, <category>]` or
//!    `["p", <pubkey>, <category>]` (NIP-56)
//!
//! Anything else is categorised as `"unknown"`.

use chrono::{DateTime, TimeZone, Utc};
use nostr_client::Event;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Category used when no extractor matches
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// Label namespace used by the nos.social moderation ontology
pub const NAMESPACE_NOS_ONTOLOGY: &str = "social.nos.ontology";

/// Generic moderation label namespace
pub const NAMESPACE_MOD: &str = "MOD";

/// Errors raised while normalizing a report
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// The event is not a report
    #[error("Not a report: kind {0}")]
    NotAReport(u32),
}

/// Result type for normalization
pub type Result<T> = std::result::Result<T, NormalizeError>;

/// What a report points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    /// A single event
    Event,
    /// An account (public key)
    Account,
    /// No recognisable target
    Unknown,
}

impl TargetType {
    /// Stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Event => "event",
            TargetType::Account => "account",
            TargetType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a moderation target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetKey {
    /// Target type
    pub target_type: TargetType,
    /// Event id or public key
    pub target_id: String,
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.target_type, self.target_id)
    }
}

/// A report in canonical shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEvent {
    /// Report event id
    pub id: String,
    /// Public key of the reporter
    pub reporter_id: String,
    /// Kind of target
    pub target_type: TargetType,
    /// Reported event id or public key (empty when unknown)
    pub target_id: String,
    /// Resolved category
    pub category: String,
    /// Client application that produced the report
    pub reporting_client: Option<String>,
    /// When the report was created
    pub created_at: DateTime<Utc>,
}

impl ReportEvent {
    /// Key identifying the report's target
    pub fn target(&self) -> TargetKey {
        TargetKey { target_type: self.target_type, target_id: self.target_id.clone() }
    }
}

// =============================================================================
// Extractors
// =============================================================================

/// One convention for locating a report's category
pub trait CategoryExtractor: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Category found by this convention, if any
    fn extract(&self, event: &Event) -> Option<String>;
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// `["report-type", <category>]`
#[derive(Debug, Clone, Default)]
pub struct ReportTypeTag;

impl CategoryExtractor for ReportTypeTag {
    fn name(&self) -> &'static str {
        "report-type"
    }

    fn extract(&self, event: &Event) -> Option<String> {
        event.tags_named("report-type").find_map(|tag| non_empty(tag.value()))
    }
}

/// `["l", <category>, <namespace>]` for a fixed namespace
#[derive(Debug, Clone)]
pub struct LabelTag {
    namespace: String,
}

impl LabelTag {
    /// Match labels in `namespace`
    pub fn new(namespace: impl Into<String>) -> Self {
        Self { namespace: namespace.into() }
    }
}

impl CategoryExtractor for LabelTag {
    fn name(&self) -> &'static str {
        "label"
    }

    fn extract(&self, event: &Event) -> Option<String> {
        event
            .tags_named("l")
            .filter(|tag| tag.get(2) == Some(self.namespace.as_str()))
            .find_map(|tag| non_empty(tag.value()))
    }
}

/// Third element of the first `e` tag, then of the first `p` tag
#[derive(Debug, Clone, Default)]
pub struct TargetQualifier;

impl CategoryExtractor for TargetQualifier {
    fn name(&self) -> &'static str {
        "target-qualifier"
    }

    fn extract(&self, event: &Event) -> Option<String> {
        ["e", "p"]
            .iter()
            .filter_map(|name| event.first_tag(name))
            .find_map(|tag| non_empty(tag.get(2)))
    }
}

// =============================================================================
// Normalizer
// =============================================================================

/// Turns raw report events into [`ReportEvent`]s
pub struct ReportNormalizer {
    extractors: Vec<Box<dyn CategoryExtractor>>,
}

impl Default for ReportNormalizer {
    fn default() -> Self {
        Self {
            extractors: vec![
                Box::new(ReportTypeTag),
                Box::new(LabelTag::new(NAMESPACE_NOS_ONTOLOGY)),
                Box::new(LabelTag::new(NAMESPACE_MOD)),
                Box::new(TargetQualifier),
            ],
        }
    }
}

impl fmt::Debug for ReportNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.extractors.iter().map(|e| e.name()).collect();
        f.debug_struct("ReportNormalizer").field("extractors", &names).finish()
    }
}

impl ReportNormalizer {
    /// Normalizer with no extractors; every report is `"unknown"`
    pub fn empty() -> Self {
        Self { extractors: Vec::new() }
    }

    /// Append an extractor, consulted after the existing ones
    pub fn with_extractor(mut self, extractor: impl CategoryExtractor + 'static) -> Self {
        self.extractors.push(Box::new(extractor));
        self
    }

    /// Normalize a report event
    pub fn normalize(&self, event: &Event) -> Result<ReportEvent> {
        if !event.is_report() {
            return Err(NormalizeError::NotAReport(event.kind));
        }

        let category = self.resolve_category(event);

        let (target_type, target_id) = if let Some(id) = event.first_tag("e").and_then(|t| non_empty(t.value())) {
            (TargetType::Event, id)
        } else if let Some(pubkey) = event.first_tag("p").and_then(|t| non_empty(t.value())) {
            (TargetType::Account, pubkey)
        } else {
            (TargetType::Unknown, String::new())
        };

        let reporting_client = event.first_tag("client").and_then(|t| non_empty(t.value()));

        let created_at = i64::try_from(event.created_at)
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(Utc::now);

        Ok(ReportEvent {
            id: event.id.clone(),
            reporter_id: event.pubkey.clone(),
            target_type,
            target_id,
            category,
            reporting_client,
            created_at,
        })
    }

    fn resolve_category(&self, event: &Event) -> String {
        for extractor in &self.extractors {
            if let Some(category) = extractor.extract(event) {
                tracing::trace!("Category {} resolved by {}", category, extractor.name());
                return category;
            }
        }
        UNKNOWN_CATEGORY.to_string()
    }
}
