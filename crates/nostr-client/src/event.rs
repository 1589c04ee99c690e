//! Nostr event and subscription filter types
//!
//! Events are relayed as JSON objects; tags are arrays of strings whose first
//! element names the tag. Only the fields the watcher reads are modelled
//! strictly, everything else is carried through untouched.

use serde::{Deserialize, Serialize};

/// Event kind for content reports (NIP-56)
pub const KIND_REPORT: u32 = 1984;

// =============================================================================
// Tags
// =============================================================================

/// A single event tag, e.g. `["e", "<event id>", "illegal"]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(pub Vec<String>);

impl Tag {
    /// Build a tag from its parts
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Tag name (first element)
    pub fn name(&self) -> Option<&str> {
        self.get(0)
    }

    /// Primary value (second element)
    pub fn value(&self) -> Option<&str> {
        self.get(1)
    }

    /// Element at `index`, if present
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }
}

// =============================================================================
// Events
// =============================================================================

/// A signed Nostr event as delivered by a relay
///
/// Signatures are not verified here; the relay has already accepted the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event id (hex sha256)
    pub id: String,
    /// Author public key (hex)
    pub pubkey: String,
    /// Creation time, unix seconds
    pub created_at: u64,
    /// Event kind
    pub kind: u32,
    /// Event tags
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Event content
    #[serde(default)]
    pub content: String,
    /// Schnorr signature (hex)
    #[serde(default)]
    pub sig: String,
}

impl Event {
    /// Iterate over all tags with the given name
    pub fn tags_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Tag> + 'a {
        self.tags.iter().filter(move |tag| tag.name() == Some(name))
    }

    /// First tag with the given name
    pub fn first_tag(&self, name: &str) -> Option<&Tag> {
        self.tags.iter().find(|tag| tag.name() == Some(name))
    }

    /// Whether this event is a content report
    pub fn is_report(&self) -> bool {
        self.kind == KIND_REPORT
    }
}

// =============================================================================
// Filters
// =============================================================================

/// Subscription filter sent with a `REQ` frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Event ids to match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    /// Authors to match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    /// Kinds to match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<u32>>,
    /// Only events created at or after this time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<u64>,
    /// Only events created at or before this time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<u64>,
    /// Maximum number of stored events to return before EOSE
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl Filter {
    /// Create an empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a kind to match
    pub fn kind(mut self, kind: u32) -> Self {
        self.kinds.get_or_insert_with(Vec::new).push(kind);
        self
    }

    /// Set the lower time bound
    pub fn since(mut self, since: u64) -> Self {
        self.since = Some(since);
        self
    }

    /// Set the upper time bound
    pub fn until(mut self, until: u64) -> Self {
        self.until = Some(until);
        self
    }

    /// Set the stored-event limit
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Filter for live events of one kind only, with no stored backlog
    pub fn live(kind: u32, since: u64) -> Self {
        Self::new().kind(kind).since(since).limit(0)
    }
}
