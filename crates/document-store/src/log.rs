use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AggregateId;

/// An append-only audit record describing a change made to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: Uuid,
    pub collection: String,
    pub document_id: AggregateId,
    /// Short machine-readable action name, e.g. "status_changed".
    pub action: String,
    /// Who performed the action, if known.
    pub actor: Option<String>,
    pub recorded_at: DateTime<Utc>,
    /// Free-form details of the change.
    pub details: serde_json::Value,
}

impl LogEntry {
    /// Creates a log entry recorded now.
    pub fn new(
        collection: impl Into<String>,
        document_id: AggregateId,
        action: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            collection: collection.into(),
            document_id,
            action: action.into(),
            actor: None,
            recorded_at: Utc::now(),
            details: serde_json::Value::Null,
        }
    }

    /// Sets the actor.
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Sets the details payload.
    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}
