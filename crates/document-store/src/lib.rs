//! Versioned JSON document store.
//!
//! Aggregates are persisted as whole JSON documents grouped into collections.
//! Every document carries a [`Version`]; writes are compare-and-swap on that
//! version so concurrent read-modify-write cycles cannot silently overwrite
//! each other.

pub mod document;
pub mod error;
pub mod log;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::AggregateId;
pub use document::{Document, Version};
pub use error::{DocumentStoreError, Result};
pub use log::LogEntry;
pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use query::DocumentQuery;
pub use store::{DocumentStore, DocumentStoreExt, SaveOptions};
