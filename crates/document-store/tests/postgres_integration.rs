//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p document-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use document_store::{
    AggregateId, Document, DocumentQuery, DocumentStore, DocumentStoreError,
    LogEntry, PostgresDocumentStore, SaveOptions, Version,
};
use serde_json::json;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_documents_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresDocumentStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE documents, document_log")
        .execute(&pool)
        .await
        .unwrap();

    PostgresDocumentStore::new(pool)
}

#[tokio::test]
async fn insert_and_get_document() {
    let store = get_test_store().await;
    let id = AggregateId::new();

    let version = store
        .save(
            Document::new("orders", id, json!({"status": "processing"})),
            SaveOptions::expect_new(),
        )
        .await
        .unwrap();
    assert_eq!(version, Version::first());

    let doc = store.get("orders", id).await.unwrap().unwrap();
    assert_eq!(doc.version, Version::first());
    assert_eq!(doc.body["status"], "processing");
    assert!(store.get("carts", id).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_insert_is_rejected() {
    let store = get_test_store().await;
    let id = AggregateId::new();

    store
        .save(Document::new("orders", id, json!({})), SaveOptions::expect_new())
        .await
        .unwrap();
    let err = store
        .save(Document::new("orders", id, json!({})), SaveOptions::expect_new())
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::DuplicateDocument { .. }));
}

#[tokio::test]
async fn optimistic_concurrency_conflict() {
    let store = get_test_store().await;
    let id = AggregateId::new();

    store
        .save(Document::new("carts", id, json!({"n": 1})), SaveOptions::expect_new())
        .await
        .unwrap();
    store
        .save(
            Document::new("carts", id, json!({"n": 2})),
            SaveOptions::expect_version(Version::first()),
        )
        .await
        .unwrap();

    let err = store
        .save(
            Document::new("carts", id, json!({"n": 3})),
            SaveOptions::expect_version(Version::first()),
        )
        .await
        .unwrap_err();

    match err {
        DocumentStoreError::ConcurrencyConflict {
            expected, actual, ..
        } => {
            assert_eq!(expected, Version::first());
            assert_eq!(actual, Version::new(2));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn replace_of_missing_document_reports_not_found() {
    let store = get_test_store().await;
    let err = store
        .save(
            Document::new("carts", AggregateId::new(), json!({})),
            SaveOptions::expect_version(Version::first()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::DocumentNotFound { .. }));
}

#[tokio::test]
async fn find_uses_jsonb_containment() {
    let store = get_test_store().await;

    for (email, guest) in [("a@b.com", true), ("a@b.com", false), ("c@d.com", true)] {
        store
            .save(
                Document::new(
                    "orders",
                    AggregateId::new(),
                    json!({"guestEmail": email, "isGuest": guest}),
                ),
                SaveOptions::expect_new(),
            )
            .await
            .unwrap();
    }

    let query = DocumentQuery::new("orders")
        .field("guestEmail", "a@b.com")
        .field("isGuest", true);
    let found = store.find(query).await.unwrap();
    assert_eq!(found.len(), 1);

    let all = store.find(DocumentQuery::new("orders")).await.unwrap();
    assert_eq!(all.len(), 3);

    let page = store
        .find(DocumentQuery::new("orders").limit(2).offset(2))
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
}

#[tokio::test]
async fn expired_documents_are_hidden_and_purged() {
    let store = get_test_store().await;
    let now = Utc::now();
    let expired = AggregateId::new();

    store
        .save(
            Document::new("carts", expired, json!({}))
                .with_expiry(Some(now - Duration::minutes(5))),
            SaveOptions::expect_new(),
        )
        .await
        .unwrap();
    store
        .save(
            Document::new("carts", AggregateId::new(), json!({}))
                .with_expiry(Some(now + Duration::days(30))),
            SaveOptions::expect_new(),
        )
        .await
        .unwrap();

    assert!(store.get("carts", expired).await.unwrap().is_none());
    assert_eq!(store.purge_expired(now).await.unwrap(), 1);
    assert_eq!(store.find(DocumentQuery::new("carts")).await.unwrap().len(), 1);
}

#[tokio::test]
async fn audit_log_round_trip() {
    let store = get_test_store().await;
    let id = AggregateId::new();

    store
        .append_log(LogEntry::new("orders", id, "created").details(json!({"total": 30.0})))
        .await
        .unwrap();
    store
        .append_log(LogEntry::new("orders", id, "deleted").actor("admin"))
        .await
        .unwrap();

    let entries = store.log_for("orders", id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, "created");
    assert_eq!(entries[0].details["total"], 30.0);
    assert_eq!(entries[1].actor.as_deref(), Some("admin"));
}
