use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AggregateId;

/// Version number of a stored document, used for optimistic concurrency control.
///
/// A document that has never been written is at version 0; the first write
/// produces version 1 and each replacement increments it by one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) of a document that does not exist yet.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version (1) produced by the first write.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A stored document: a JSON body plus the bookkeeping the store needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Identifier, unique within the collection.
    pub id: AggregateId,

    /// Collection the document belongs to (e.g. "carts", "orders").
    pub collection: String,

    /// Version of the document after the write that produced it.
    pub version: Version,

    /// When the document was first written.
    pub created_at: DateTime<Utc>,

    /// When the document was last written.
    pub updated_at: DateTime<Utc>,

    /// Optional expiry; expired documents are invisible and eventually purged.
    pub expires_at: Option<DateTime<Utc>>,

    /// The aggregate state as JSON.
    pub body: serde_json::Value,
}

impl Document {
    /// Creates a document for writing.
    ///
    /// The version is assigned by the store on save.
    pub fn new(
        collection: impl Into<String>,
        id: AggregateId,
        body: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            collection: collection.into(),
            version: Version::initial(),
            created_at: now,
            updated_at: now,
            expires_at: None,
            body,
        }
    }

    /// Creates a document by serializing a value.
    pub fn from_value<T: Serialize>(
        collection: impl Into<String>,
        id: AggregateId,
        value: &T,
    ) -> serde_json::Result<Self> {
        Ok(Self::new(collection, id, serde_json::to_value(value)?))
    }

    /// Sets the expiry timestamp.
    pub fn with_expiry(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    /// Returns true if the document has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Deserializes the body into a typed value.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.body.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn version_sequence() {
        assert_eq!(Version::initial().next(), Version::first());
        assert_eq!(Version::first().next().as_i64(), 2);
    }

    #[test]
    fn document_expiry() {
        let now = Utc::now();
        let doc = Document::new("carts", AggregateId::new(), serde_json::json!({}))
            .with_expiry(Some(now - Duration::seconds(1)));
        assert!(doc.is_expired(now));

        let doc = doc.with_expiry(Some(now + Duration::days(30)));
        assert!(!doc.is_expired(now));

        let doc = doc.with_expiry(None);
        assert!(!doc.is_expired(now));
    }

    #[test]
    fn document_decodes_body() {
        #[derive(Debug, PartialEq, Deserialize, Serialize)]
        struct Body {
            name: String,
        }

        let body = Body {
            name: "widget".to_string(),
        };
        let doc = Document::from_value("products", AggregateId::new(), &body).unwrap();
        assert_eq!(doc.decode::<Body>().unwrap(), body);
    }
}
