use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    AggregateId, Document, DocumentQuery, DocumentStoreError, LogEntry, Result, Version,
    store::{DocumentStore, SaveOptions, validate_document_for_save},
};

type Key = (String, AggregateId);

/// In-memory document store implementation.
///
/// Used by the tests and by the server when no database is configured.
/// Provides the same interface and concurrency semantics as the PostgreSQL
/// implementation.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<HashMap<Key, Document>>>,
    log: Arc<RwLock<Vec<LogEntry>>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of stored documents, expired ones included.
    pub async fn document_count(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Clears all documents and log entries.
    pub async fn clear(&self) {
        self.documents.write().await.clear();
        self.log.write().await.clear();
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn save(&self, mut document: Document, options: SaveOptions) -> Result<Version> {
        validate_document_for_save(&document).map_err(|e| {
            DocumentStoreError::Serialization(serde_json::Error::io(std::io::Error::other(
                e.message,
            )))
        })?;

        let key = (document.collection.clone(), document.id);
        let mut store = self.documents.write().await;
        let now = Utc::now();

        match store.get(&key) {
            None if options.is_insert() => {}
            None => {
                return Err(DocumentStoreError::DocumentNotFound {
                    collection: document.collection,
                    id: document.id,
                });
            }
            Some(_) if options.is_insert() => {
                return Err(DocumentStoreError::DuplicateDocument {
                    collection: document.collection,
                    id: document.id,
                });
            }
            Some(existing) => {
                if existing.version != options.expected_version {
                    return Err(DocumentStoreError::ConcurrencyConflict {
                        collection: document.collection,
                        id: document.id,
                        expected: options.expected_version,
                        actual: existing.version,
                    });
                }
                document.created_at = existing.created_at;
            }
        }

        let new_version = options.expected_version.next();
        document.version = new_version;
        document.updated_at = now;
        store.insert(key, document);

        Ok(new_version)
    }

    async fn get(&self, collection: &str, id: AggregateId) -> Result<Option<Document>> {
        let store = self.documents.read().await;
        let now = Utc::now();
        Ok(store
            .get(&(collection.to_string(), id))
            .filter(|doc| !doc.is_expired(now))
            .cloned())
    }

    async fn find(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        let store = self.documents.read().await;
        let now = Utc::now();
        let mut documents: Vec<_> = store
            .values()
            .filter(|doc| !doc.is_expired(now) && query.matches(doc))
            .cloned()
            .collect();

        // Newest first, id as a stable tie-breaker
        documents.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(a.id.as_uuid().cmp(&b.id.as_uuid()))
        });

        let documents = documents
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect();

        Ok(documents)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut store = self.documents.write().await;
        let before = store.len();
        store.retain(|_, doc| !doc.is_expired(now));
        let purged = (before - store.len()) as u64;
        tracing::debug!(purged, "expired documents removed");
        Ok(purged)
    }

    async fn append_log(&self, entry: LogEntry) -> Result<()> {
        self.log.write().await.push(entry);
        Ok(())
    }

    async fn log_for(&self, collection: &str, id: AggregateId) -> Result<Vec<LogEntry>> {
        let log = self.log.read().await;
        let mut entries: Vec<_> = log
            .iter()
            .filter(|e| e.collection == collection && e.document_id == id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.recorded_at);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocumentStoreExt;
    use chrono::Duration;
    use serde_json::json;

    fn create_test_document(id: AggregateId, body: serde_json::Value) -> Document {
        Document::new("orders", id, body)
    }

    #[tokio::test]
    async fn insert_new_document() {
        let store = InMemoryDocumentStore::new();
        let id = AggregateId::new();

        let version = store
            .save(
                create_test_document(id, json!({"status": "processing"})),
                SaveOptions::expect_new(),
            )
            .await
            .unwrap();
        assert_eq!(version, Version::first());

        let doc = store.get("orders", id).await.unwrap().unwrap();
        assert_eq!(doc.version, Version::first());
        assert_eq!(doc.body["status"], "processing");
    }

    #[tokio::test]
    async fn insert_duplicate_fails() {
        let store = InMemoryDocumentStore::new();
        let id = AggregateId::new();

        store
            .save(create_test_document(id, json!({})), SaveOptions::expect_new())
            .await
            .unwrap();
        let result = store
            .save(create_test_document(id, json!({})), SaveOptions::expect_new())
            .await;

        assert!(matches!(
            result,
            Err(DocumentStoreError::DuplicateDocument { .. })
        ));
    }

    #[tokio::test]
    async fn replace_with_expected_version() {
        let store = InMemoryDocumentStore::new();
        let id = AggregateId::new();

        store
            .save(create_test_document(id, json!({"n": 1})), SaveOptions::expect_new())
            .await
            .unwrap();
        let created_at = store.get("orders", id).await.unwrap().unwrap().created_at;

        let version = store
            .save(
                create_test_document(id, json!({"n": 2})),
                SaveOptions::expect_version(Version::first()),
            )
            .await
            .unwrap();
        assert_eq!(version, Version::new(2));

        let doc = store.get("orders", id).await.unwrap().unwrap();
        assert_eq!(doc.body["n"], 2);
        assert_eq!(doc.created_at, created_at);
    }

    #[tokio::test]
    async fn concurrency_conflict_on_stale_version() {
        let store = InMemoryDocumentStore::new();
        let id = AggregateId::new();

        store
            .save(create_test_document(id, json!({"n": 1})), SaveOptions::expect_new())
            .await
            .unwrap();
        store
            .save(
                create_test_document(id, json!({"n": 2})),
                SaveOptions::expect_version(Version::first()),
            )
            .await
            .unwrap();

        // A second writer that also read version 1 loses
        let result = store
            .save(
                create_test_document(id, json!({"n": 3})),
                SaveOptions::expect_version(Version::first()),
            )
            .await;

        assert!(matches!(
            result,
            Err(DocumentStoreError::ConcurrencyConflict { .. })
        ));
        let doc = store.get("orders", id).await.unwrap().unwrap();
        assert_eq!(doc.body["n"], 2);
    }

    #[tokio::test]
    async fn replace_missing_document_fails() {
        let store = InMemoryDocumentStore::new();
        let result = store
            .save(
                create_test_document(AggregateId::new(), json!({})),
                SaveOptions::expect_version(Version::first()),
            )
            .await;
        assert!(matches!(
            result,
            Err(DocumentStoreError::DocumentNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn find_applies_filter_and_paging() {
        let store = InMemoryDocumentStore::new();
        for i in 0..5 {
            let body = json!({"isGuest": i % 2 == 0, "n": i});
            store
                .save(
                    create_test_document(AggregateId::new(), body),
                    SaveOptions::expect_new(),
                )
                .await
                .unwrap();
        }

        let guests = store
            .find(DocumentQuery::new("orders").field("isGuest", true))
            .await
            .unwrap();
        assert_eq!(guests.len(), 3);

        let page = store
            .find(DocumentQuery::new("orders").offset(1).limit(2))
            .await
            .unwrap();
        assert_eq!(page.len(), 2);

        let first = store.find_one(DocumentQuery::new("orders")).await.unwrap();
        assert!(first.is_some());
        assert!(store.find(DocumentQuery::new("carts")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expired_documents_are_hidden_and_purged() {
        let store = InMemoryDocumentStore::new();
        let now = Utc::now();
        let expired = AggregateId::new();
        let live = AggregateId::new();

        store
            .save(
                Document::new("carts", expired, json!({}))
                    .with_expiry(Some(now - Duration::minutes(1))),
                SaveOptions::expect_new(),
            )
            .await
            .unwrap();
        store
            .save(
                Document::new("carts", live, json!({})).with_expiry(Some(now + Duration::days(30))),
                SaveOptions::expect_new(),
            )
            .await
            .unwrap();

        assert!(store.get("carts", expired).await.unwrap().is_none());
        assert_eq!(store.find(DocumentQuery::new("carts")).await.unwrap().len(), 1);

        let purged = store.purge_expired(now).await.unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.document_count().await, 1);
    }

    #[tokio::test]
    async fn log_entries_are_scoped_and_ordered() {
        let store = InMemoryDocumentStore::new();
        let id = AggregateId::new();

        store
            .append_log(LogEntry::new("orders", id, "created"))
            .await
            .unwrap();
        store
            .append_log(LogEntry::new("orders", id, "status_changed").actor("admin"))
            .await
            .unwrap();
        store
            .append_log(LogEntry::new("orders", AggregateId::new(), "created"))
            .await
            .unwrap();

        let entries = store.log_for("orders", id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "created");
        assert_eq!(entries[1].actor.as_deref(), Some("admin"));
    }
}
