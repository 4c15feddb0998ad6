use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, Document, DocumentQuery, DocumentStoreError, LogEntry, Result, Version,
    store::{DocumentStore, SaveOptions, validate_document_for_save},
};

const DOCUMENT_COLUMNS: &str = "collection, id, version, created_at, updated_at, expires_at, body";

/// PostgreSQL-backed document store. Bodies live in a JSONB column and
/// filters use JSONB containment (`@>`).
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_document(row: PgRow) -> Result<Document> {
        Ok(Document {
            id: AggregateId::from_uuid(row.try_get::<Uuid, _>("id")?),
            collection: row.try_get("collection")?,
            version: Version::new(row.try_get("version")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            expires_at: row.try_get("expires_at")?,
            body: row.try_get("body")?,
        })
    }

    fn row_to_log_entry(row: PgRow) -> Result<LogEntry> {
        Ok(LogEntry {
            id: row.try_get("id")?,
            collection: row.try_get("collection")?,
            document_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("document_id")?),
            action: row.try_get("action")?,
            actor: row.try_get("actor")?,
            recorded_at: row.try_get("recorded_at")?,
            details: row.try_get("details")?,
        })
    }

    async fn current_version(&self, collection: &str, id: AggregateId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        Ok(version.map(Version::new))
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn save(&self, document: Document, options: SaveOptions) -> Result<Version> {
        validate_document_for_save(&document).map_err(|e| {
            DocumentStoreError::Serialization(serde_json::Error::io(std::io::Error::other(
                e.message,
            )))
        })?;

        let new_version = options.expected_version.next();

        if options.is_insert() {
            sqlx::query(
                r#"
                INSERT INTO documents (collection, id, version, created_at, updated_at, expires_at, body)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(&document.collection)
            .bind(document.id.as_uuid())
            .bind(new_version.as_i64())
            .bind(document.created_at)
            .bind(Utc::now())
            .bind(document.expires_at)
            .bind(&document.body)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("documents_pkey")
                {
                    return DocumentStoreError::DuplicateDocument {
                        collection: document.collection.clone(),
                        id: document.id,
                    };
                }
                DocumentStoreError::Database(e)
            })?;

            return Ok(new_version);
        }

        let result = sqlx::query(
            r#"
            UPDATE documents
            SET version = $3, updated_at = $4, expires_at = $5, body = $6
            WHERE collection = $1 AND id = $2 AND version = $7
            "#,
        )
        .bind(&document.collection)
        .bind(document.id.as_uuid())
        .bind(new_version.as_i64())
        .bind(Utc::now())
        .bind(document.expires_at)
        .bind(&document.body)
        .bind(options.expected_version.as_i64())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.current_version(&document.collection, document.id).await? {
                Some(actual) => Err(DocumentStoreError::ConcurrencyConflict {
                    collection: document.collection,
                    id: document.id,
                    expected: options.expected_version,
                    actual,
                }),
                None => Err(DocumentStoreError::DocumentNotFound {
                    collection: document.collection,
                    id: document.id,
                }),
            };
        }

        Ok(new_version)
    }

    async fn get(&self, collection: &str, id: AggregateId) -> Result<Option<Document>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents \
             WHERE collection = $1 AND id = $2 AND (expires_at IS NULL OR expires_at > now())"
        );
        let row = sqlx::query(&sql)
            .bind(collection)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_document).transpose()
    }

    async fn find(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        let mut sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents \
             WHERE collection = $1 AND body @> $2 AND (expires_at IS NULL OR expires_at > now())"
        );
        let mut param_count = 2;

        if query.created_from.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at >= ${param_count}"));
        }
        if query.created_to.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at <= ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at DESC, id ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let filter = query.filter_value();
        let mut sqlx_query = sqlx::query(&sql).bind(&query.collection).bind(filter);

        if let Some(from) = query.created_from {
            sqlx_query = sqlx_query.bind(from);
        }
        if let Some(to) = query.created_to {
            sqlx_query = sqlx_query.bind(to);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_document).collect()
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM documents WHERE expires_at IS NOT NULL AND expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        tracing::debug!(purged = result.rows_affected(), "expired documents removed");
        Ok(result.rows_affected())
    }

    async fn append_log(&self, entry: LogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO document_log (id, collection, document_id, action, actor, recorded_at, details)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.collection)
        .bind(entry.document_id.as_uuid())
        .bind(&entry.action)
        .bind(&entry.actor)
        .bind(entry.recorded_at)
        .bind(&entry.details)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn log_for(&self, collection: &str, id: AggregateId) -> Result<Vec<LogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, collection, document_id, action, actor, recorded_at, details
            FROM document_log
            WHERE collection = $1 AND document_id = $2
            ORDER BY recorded_at ASC
            "#,
        )
        .bind(collection)
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_log_entry).collect()
    }
}
