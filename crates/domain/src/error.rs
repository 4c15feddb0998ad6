//! Domain error types.

use document_store::DocumentStoreError;
use thiserror::Error;

use crate::access::AccessError;
use crate::cart::CartError;
use crate::catalog::CatalogError;
use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the document store.
    #[error("Document store error: {0}")]
    Store(#[from] DocumentStoreError),

    /// An error occurred in the cart aggregate.
    #[error("{0}")]
    Cart(CartError),

    /// An error occurred in the order aggregate.
    #[error("{0}")]
    Order(OrderError),

    /// An error occurred in the catalog.
    #[error("{0}")]
    Catalog(#[from] CatalogError),

    /// The requester could not be established.
    #[error("{0}")]
    Access(#[from] AccessError),

    /// Aggregate not found (or not visible to the requester).
    #[error("{aggregate_type} not found: {aggregate_id}")]
    NotFound {
        aggregate_type: &'static str,
        aggregate_id: String,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<OrderError> for DomainError {
    fn from(e: OrderError) -> Self {
        DomainError::Order(e)
    }
}

impl From<CartError> for DomainError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::Order(e) => DomainError::Order(e),
            e => DomainError::Cart(e),
        }
    }
}

impl DomainError {
    /// Returns true if the error was caused by a concurrent write.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(
            self,
            DomainError::Store(DocumentStoreError::ConcurrencyConflict { .. })
        )
    }
}
