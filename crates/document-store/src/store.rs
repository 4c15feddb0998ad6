use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{AggregateId, Document, DocumentQuery, LogEntry, Result, Version};

/// Options for saving a document.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveOptions {
    /// Version the writer last read. `Version::initial()` means the document
    /// must not exist yet.
    pub expected_version: Version,
}

impl SaveOptions {
    /// Expects the document to be new; the save is an insert.
    pub fn expect_new() -> Self {
        Self {
            expected_version: Version::initial(),
        }
    }

    /// Expects the stored document to be at `version`; the save is a replace.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: version,
        }
    }

    /// Returns true if this save creates the document.
    pub fn is_insert(&self) -> bool {
        self.expected_version == Version::initial()
    }
}

/// Core trait for document store implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Writes a document.
    ///
    /// Inserts when `options` expects a new document (failing with
    /// `DuplicateDocument` if the id is taken), otherwise replaces the stored
    /// document only if its version equals the expected one, failing with
    /// `ConcurrencyConflict` if not. `created_at` is preserved on replace.
    ///
    /// Returns the new version.
    async fn save(&self, document: Document, options: SaveOptions) -> Result<Version>;

    /// Loads a document by id. Expired documents are reported as absent.
    async fn get(&self, collection: &str, id: AggregateId) -> Result<Option<Document>>;

    /// Retrieves the documents matching a query, newest first.
    async fn find(&self, query: DocumentQuery) -> Result<Vec<Document>>;

    /// Deletes every document whose expiry is at or before `now`.
    ///
    /// Returns the number of documents removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Appends an entry to the audit log.
    async fn append_log(&self, entry: LogEntry) -> Result<()>;

    /// Returns the audit log of a document, oldest first.
    async fn log_for(&self, collection: &str, id: AggregateId) -> Result<Vec<LogEntry>>;
}

/// Extension trait providing convenience methods for document stores.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Returns the first (newest) document matching the query.
    async fn find_one(&self, query: DocumentQuery) -> Result<Option<Document>> {
        Ok(self.find(query.limit(1)).await?.into_iter().next())
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}

/// Error returned when a document cannot be written as given.
#[derive(Debug, Clone)]
pub struct SaveValidationError {
    pub message: String,
}

impl std::fmt::Display for SaveValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Save validation error: {}", self.message)
    }
}

impl std::error::Error for SaveValidationError {}

/// Validates a document before writing it.
pub fn validate_document_for_save(
    document: &Document,
) -> std::result::Result<(), SaveValidationError> {
    if document.collection.is_empty() {
        return Err(SaveValidationError {
            message: "Collection name must not be empty".to_string(),
        });
    }
    if !document.body.is_object() {
        return Err(SaveValidationError {
            message: "Document body must be a JSON object".to_string(),
        });
    }
    Ok(())
}
