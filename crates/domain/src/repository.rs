//! Loading and saving aggregates with optimistic concurrency.

use std::marker::PhantomData;

use common::AggregateId;
use document_store::{
    Document, DocumentQuery, DocumentStore, DocumentStoreExt, SaveOptions, Version,
};

use crate::aggregate::Aggregate;
use crate::error::DomainError;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A, T = ()> {
    /// The aggregate after the command was applied and saved.
    pub aggregate: A,

    /// Whatever the command produced besides the state change.
    pub output: T,

    /// The new version of the aggregate after the command.
    pub new_version: Version,
}

/// Repository for a single aggregate type.
///
/// Every mutation follows the same cycle:
/// 1. Load the aggregate (remembering its version)
/// 2. Run the command against the in-memory state
/// 3. Save the whole aggregate, expecting the loaded version
///
/// A concurrent writer that saved in between makes step 3 fail with a
/// concurrency conflict instead of being silently overwritten.
pub struct Repository<S, A>
where
    S: DocumentStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<fn() -> A>,
}

impl<S, A> Clone for Repository<S, A>
where
    S: DocumentStore + Clone,
    A: Aggregate,
{
    fn clone(&self) -> Self {
        Self::new(self.store.clone())
    }
}

impl<S, A> Repository<S, A>
where
    S: DocumentStore,
    A: Aggregate,
{
    /// Creates a new repository over the given document store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying document store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns a query over this aggregate's collection.
    pub fn query(&self) -> DocumentQuery {
        DocumentQuery::new(A::collection())
    }

    /// Loads an aggregate by id.
    pub async fn load(&self, id: AggregateId) -> Result<Option<A>, DomainError> {
        match self.store.get(A::collection(), id).await? {
            Some(document) => Ok(Some(Self::decode(document)?)),
            None => Ok(None),
        }
    }

    /// Loads an aggregate, failing with `NotFound` if it doesn't exist.
    pub async fn load_existing(&self, id: AggregateId) -> Result<A, DomainError> {
        self.load(id).await?.ok_or_else(|| DomainError::NotFound {
            aggregate_type: A::aggregate_type(),
            aggregate_id: id.to_string(),
        })
    }

    /// Returns every aggregate matching the query.
    pub async fn find(&self, query: DocumentQuery) -> Result<Vec<A>, DomainError> {
        self.store
            .find(query)
            .await?
            .into_iter()
            .map(Self::decode)
            .collect()
    }

    /// Returns the newest aggregate matching the query.
    pub async fn find_one(&self, query: DocumentQuery) -> Result<Option<A>, DomainError> {
        match self.store.find_one(query).await? {
            Some(document) => Ok(Some(Self::decode(document)?)),
            None => Ok(None),
        }
    }

    /// Persists a freshly created aggregate.
    pub async fn insert(&self, mut aggregate: A) -> Result<A, DomainError> {
        self.persist(&mut aggregate, Version::initial()).await?;
        Ok(aggregate)
    }

    /// Executes a command and persists the resulting state.
    ///
    /// The command function receives the aggregate as loaded and mutates it in
    /// place. If it fails nothing is written. An aggregate that was never saved
    /// is inserted; otherwise the save expects the version it was loaded at.
    pub async fn execute<F, T>(
        &self,
        mut aggregate: A,
        command_fn: F,
    ) -> Result<CommandResult<A, T>, DomainError>
    where
        F: FnOnce(&mut A) -> Result<T, A::Error>,
        DomainError: From<A::Error>,
    {
        let current_version = aggregate.version();

        let output = command_fn(&mut aggregate)?;

        let new_version = self.persist(&mut aggregate, current_version).await?;

        Ok(CommandResult {
            aggregate,
            output,
            new_version,
        })
    }

    async fn persist(
        &self,
        aggregate: &mut A,
        current_version: Version,
    ) -> Result<Version, DomainError> {
        let options = if current_version == Version::initial() {
            SaveOptions::expect_new()
        } else {
            SaveOptions::expect_version(current_version)
        };

        let document = Document::from_value(A::collection(), aggregate.id(), &*aggregate)?
            .with_expiry(aggregate.expires_at());

        let new_version = self.store.save(document, options).await?;
        aggregate.set_version(new_version);

        Ok(new_version)
    }

    fn decode(document: Document) -> Result<A, DomainError> {
        let mut aggregate: A = document.decode()?;
        aggregate.set_version(document.version);
        Ok(aggregate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use document_store::{DocumentStoreError, InMemoryDocumentStore};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Counter {
        id: AggregateId,
        value: i32,
        expires_at: Option<DateTime<Utc>>,
        #[serde(skip)]
        version: Version,
    }

    impl Counter {
        fn new() -> Self {
            Self {
                id: AggregateId::new(),
                value: 0,
                expires_at: None,
                version: Version::initial(),
            }
        }

        fn add(&mut self, delta: i32) -> Result<i32, CounterError> {
            if delta <= 0 {
                return Err(CounterError::InvalidDelta(delta));
            }
            self.value += delta;
            Ok(self.value)
        }
    }

    #[derive(Debug, thiserror::Error)]
    enum CounterError {
        #[error("invalid delta: {0}")]
        InvalidDelta(i32),
    }

    impl Aggregate for Counter {
        type Error = CounterError;

        fn aggregate_type() -> &'static str {
            "Counter"
        }

        fn collection() -> &'static str {
            "counters"
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

        fn expires_at(&self) -> Option<DateTime<Utc>> {
            self.expires_at
        }
    }

    impl From<CounterError> for DomainError {
        fn from(e: CounterError) -> Self {
            DomainError::NotFound {
                aggregate_type: "Counter",
                aggregate_id: e.to_string(),
            }
        }
    }

    #[tokio::test]
    async fn test_execute_inserts_new_aggregate() {
        let repo: Repository<_, Counter> = Repository::new(InMemoryDocumentStore::new());

        let result = repo.execute(Counter::new(), |c| c.add(5)).await.unwrap();

        assert_eq!(result.output, 5);
        assert_eq!(result.new_version, Version::first());
        assert_eq!(result.aggregate.version(), Version::first());

        let loaded = repo.load(result.aggregate.id()).await.unwrap().unwrap();
        assert_eq!(loaded.value, 5);
        assert_eq!(loaded.version(), Version::first());
    }

    #[tokio::test]
    async fn test_execute_updates_existing_aggregate() {
        let repo: Repository<_, Counter> = Repository::new(InMemoryDocumentStore::new());
        let counter = repo.insert(Counter::new()).await.unwrap();

        let loaded = repo.load_existing(counter.id()).await.unwrap();
        let result = repo.execute(loaded, |c| c.add(42)).await.unwrap();

        assert_eq!(result.new_version, Version::new(2));
        assert_eq!(result.aggregate.value, 42);
    }

    #[tokio::test]
    async fn test_failed_command_writes_nothing() {
        let store = InMemoryDocumentStore::new();
        let repo: Repository<_, Counter> = Repository::new(store.clone());

        let result = repo.execute(Counter::new(), |c| c.add(-1)).await;

        assert!(result.is_err());
        assert_eq!(store.document_count().await, 0);
    }

    #[tokio::test]
    async fn test_stale_copy_is_rejected() {
        let repo: Repository<_, Counter> = Repository::new(InMemoryDocumentStore::new());
        let counter = repo.insert(Counter::new()).await.unwrap();

        let first = repo.load_existing(counter.id()).await.unwrap();
        let second = repo.load_existing(counter.id()).await.unwrap();

        repo.execute(first, |c| c.add(1)).await.unwrap();
        let result = repo.execute(second, |c| c.add(1)).await;

        assert!(matches!(
            result,
            Err(DomainError::Store(DocumentStoreError::ConcurrencyConflict { .. }))
        ));
        let loaded = repo.load_existing(counter.id()).await.unwrap();
        assert_eq!(loaded.value, 1);
    }

    #[tokio::test]
    async fn test_load_existing_reports_not_found() {
        let repo: Repository<_, Counter> = Repository::new(InMemoryDocumentStore::new());

        let result = repo.load_existing(AggregateId::new()).await;

        assert!(matches!(
            result,
            Err(DomainError::NotFound {
                aggregate_type: "Counter",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_expiry_is_forwarded_to_store() {
        let repo: Repository<_, Counter> = Repository::new(InMemoryDocumentStore::new());
        let mut counter = Counter::new();
        counter.expires_at = Some(Utc::now() - Duration::seconds(1));

        let counter = repo.insert(counter).await.unwrap();

        assert!(repo.load(counter.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_decodes_matching_aggregates() {
        let repo: Repository<_, Counter> = Repository::new(InMemoryDocumentStore::new());
        for delta in [1, 2, 2] {
            repo.execute(Counter::new(), |c| c.add(delta)).await.unwrap();
        }

        let found = repo.find(repo.query().field("value", 2)).await.unwrap();

        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|c| c.value == 2 && c.version() == Version::first()));
    }
}
