use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier wrapper for quote records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuoteId(pub String);

impl QuoteId {
    /// Wrap a raw identifier, rejecting blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Quote record as stored by the managed database.
///
/// Pricing, client and service details belong to the pages that render them, so
/// everything except the id stays an untyped JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Quote {
    pub fn new(id: QuoteId) -> Self {
        Self {
            id,
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Well-known audit event kinds. The column is an open string, so unknown values
/// survive a round trip untouched.
pub mod event_types {
    pub const CREATED: &str = "created";
    pub const UPDATED: &str = "updated";
    pub const STATUS_CHANGED: &str = "status_changed";
    pub const DELETED: &str = "deleted";
}

/// Append-only audit entry attached to exactly one quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteEvent {
    pub id: String,
    pub quote_id: QuoteId,
    pub created_at: DateTime<Utc>,
    pub event_type: String,
    #[serde(default)]
    pub actor_type: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub diff: Option<Value>,
}

impl QuoteEvent {
    pub fn label(&self) -> &str {
        match self.event_type.as_str() {
            event_types::CREATED => "Created",
            event_types::UPDATED => "Updated",
            event_types::STATUS_CHANGED => "Status changed",
            event_types::DELETED => "Deleted",
            other => other,
        }
    }

    /// Keys touched by this event, when the diff is an object.
    pub fn changed_fields(&self) -> Vec<&str> {
        match &self.diff {
            Some(Value::Object(map)) => map.keys().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

/// Order events newest first. The sort is stable so equal timestamps keep the
/// order the store returned them in.
pub fn sort_newest_first(events: &mut [QuoteEvent]) {
    events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
