//! Core aggregate trait.

use chrono::{DateTime, Utc};
use common::AggregateId;
use document_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for aggregates persisted as versioned documents.
///
/// An aggregate is a cluster of domain objects that can be treated as a single unit.
/// The aggregate root ensures consistency of changes being made within the aggregate.
///
/// Aggregates are stored whole:
/// - The serialized aggregate is the document body
/// - Every save is guarded by the version the aggregate was loaded at
/// - Business rules run in memory before anything is persisted
pub trait Aggregate: Serialize + DeserializeOwned + Send + Sync + Sized {
    /// The type of errors this aggregate can produce.
    type Error: std::error::Error + Send + Sync;

    /// Returns the aggregate type name, used in errors and logs.
    fn aggregate_type() -> &'static str;

    /// Returns the document collection the aggregate is stored in.
    fn collection() -> &'static str;

    /// Returns the aggregate's unique identifier.
    fn id(&self) -> AggregateId;

    /// Returns the current version of the aggregate.
    ///
    /// Version starts at 0 for an unsaved aggregate and increments with each save.
    fn version(&self) -> Version;

    /// Sets the aggregate version.
    ///
    /// Called by the repository after loading or saving.
    fn set_version(&mut self, version: Version);

    /// Returns the instant after which the stored document may be purged.
    fn expires_at(&self) -> Option<DateTime<Utc>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct TestAggregate {
        id: AggregateId,
        #[serde(skip)]
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("test error")]
    struct TestError;

    impl Aggregate for TestAggregate {
        type Error = TestError;

        fn aggregate_type() -> &'static str {
            "TestAggregate"
        }

        fn collection() -> &'static str {
            "tests"
        }

        fn id(&self) -> AggregateId {
            self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }
    }

    #[test]
    fn test_default_expiry_is_none() {
        let aggregate = TestAggregate {
            id: AggregateId::new(),
            version: Version::initial(),
        };
        assert!(aggregate.expires_at().is_none());
    }

    #[test]
    fn test_version_is_not_part_of_the_body() {
        let mut aggregate = TestAggregate {
            id: AggregateId::new(),
            version: Version::initial(),
        };
        aggregate.set_version(Version::new(3));

        let json = serde_json::to_value(&aggregate).unwrap();
        assert!(json.get("version").is_none());
        assert_eq!(aggregate.version(), Version::new(3));
    }
}
