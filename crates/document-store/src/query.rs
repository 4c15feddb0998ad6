use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::Document;

/// Builder for selecting documents from a collection.
///
/// The filter is a JSON object matched by containment against the document
/// body: every field in the filter must be present in the body with an equal
/// value. Results are ordered newest first.
#[derive(Debug, Clone, Default)]
pub struct DocumentQuery {
    /// Collection to search.
    pub collection: String,

    /// Containment filter over the document body.
    pub filter: Map<String, Value>,

    /// Only documents created at or after this timestamp.
    pub created_from: Option<DateTime<Utc>>,

    /// Only documents created at or before this timestamp.
    pub created_to: Option<DateTime<Utc>>,

    /// Maximum number of documents to return.
    pub limit: Option<usize>,

    /// Number of documents to skip.
    pub offset: Option<usize>,
}

impl DocumentQuery {
    /// Creates a query over all documents of a collection.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Default::default()
        }
    }

    /// Requires `field` to equal `value`.
    pub fn field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.insert(field.into(), value.into());
        self
    }

    /// Merges every field of `filter` into this query's filter.
    pub fn matching(mut self, filter: Map<String, Value>) -> Self {
        self.filter.extend(filter);
        self
    }

    /// Restricts results to documents created at or after `from`.
    pub fn created_from(mut self, from: DateTime<Utc>) -> Self {
        self.created_from = Some(from);
        self
    }

    /// Restricts results to documents created at or before `to`.
    pub fn created_to(mut self, to: DateTime<Utc>) -> Self {
        self.created_to = Some(to);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the number of documents to skip.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns the filter as a JSON object value.
    pub fn filter_value(&self) -> Value {
        Value::Object(self.filter.clone())
    }

    /// Returns true if `document` satisfies the collection, filter and date range.
    ///
    /// Expiry is not checked here; stores apply it against their own clock.
    pub fn matches(&self, document: &Document) -> bool {
        if document.collection != self.collection {
            return false;
        }
        if let Some(from) = self.created_from
            && document.created_at < from
        {
            return false;
        }
        if let Some(to) = self.created_to
            && document.created_at > to
        {
            return false;
        }
        self.filter
            .iter()
            .all(|(field, expected)| document.body.get(field).is_some_and(|v| contains(v, expected)))
    }
}

/// JSON containment with the semantics of PostgreSQL's `@>` for objects and scalars.
fn contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::Object(h), Value::Object(n)) => n
            .iter()
            .all(|(k, v)| h.get(k).is_some_and(|hv| contains(hv, v))),
        (Value::Array(h), Value::Array(n)) => n.iter().all(|nv| h.iter().any(|hv| contains(hv, nv))),
        _ => haystack == needle,
    }
}
