//! Shared application state.

use analytics::AnalyticsService;
use document_store::DocumentStore;
use domain::{CartService, CatalogService, CommerceSettings, OrderService};

use crate::auth::TokenRegistry;

/// Services and credentials shared by all handlers.
pub struct AppState<S: DocumentStore> {
    pub catalog: CatalogService<S>,
    pub carts: CartService<S>,
    pub orders: OrderService<S>,
    pub analytics: AnalyticsService<S>,
    pub tokens: TokenRegistry,
}

impl<S: DocumentStore + Clone> AppState<S> {
    /// Builds every service over one document store.
    pub fn new(store: S, settings: CommerceSettings, tokens: TokenRegistry) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            carts: CartService::new(store.clone(), settings),
            orders: OrderService::new(store.clone(), settings),
            analytics: AnalyticsService::new(store),
            tokens,
        }
    }
}
