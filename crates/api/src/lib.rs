//! HTTP API server for the storefront backend.
//!
//! Provides REST endpoints for the product catalog, carts, orders and sales
//! reports under `/api/v1`, with structured logging (tracing) and Prometheus
//! metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod response;
pub mod routes;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, patch, post, put};
use document_store::DocumentStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Path prefix of the versioned API.
pub const API_PREFIX: &str = "/api/v1";

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: DocumentStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    let api = Router::new()
        .route(
            "/products",
            post(routes::products::create::<S>).get(routes::products::list::<S>),
        )
        .route("/products/{id}", get(routes::products::get::<S>))
        .route(
            "/products/{id}/price",
            patch(routes::products::update_price::<S>),
        )
        .route(
            "/products/{id}/deactivate",
            patch(routes::products::deactivate::<S>),
        )
        .route(
            "/products/{id}/price-history",
            get(routes::products::price_history::<S>),
        )
        .route("/cart", get(routes::cart::get::<S>))
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route(
            "/cart/items/{item_id}",
            patch(routes::cart::update_item::<S>).delete(routes::cart::remove_item::<S>),
        )
        .route(
            "/cart/payment-method",
            put(routes::cart::select_payment_method::<S>),
        )
        .route("/cart/checkout", post(routes::cart::checkout::<S>))
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::list::<S>),
        )
        .route(
            "/orders/analytics/summary",
            get(routes::analytics::summary::<S>),
        )
        .route(
            "/orders/analytics/status",
            get(routes::analytics::status::<S>),
        )
        .route(
            "/orders/analytics/top-products",
            get(routes::analytics::top_products::<S>),
        )
        .route(
            "/orders/analytics/customers",
            get(routes::analytics::customers::<S>),
        )
        .route("/orders/analytics/daily", get(routes::analytics::daily::<S>))
        .route(
            "/orders/{id}",
            get(routes::orders::get::<S>).delete(routes::orders::delete::<S>),
        )
        .route(
            "/orders/{id}/status",
            patch(routes::orders::update_status::<S>),
        )
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/orders/{id}/pay", patch(routes::orders::mark_paid::<S>))
        .route(
            "/orders/{id}/deliver",
            patch(routes::orders::mark_delivered::<S>),
        )
        .route(
            "/orders/{id}/mark-cancelled",
            patch(routes::orders::mark_cancelled::<S>),
        )
        .route("/orders/{id}/history", get(routes::orders::history::<S>))
        .with_state(state);

    Router::new()
        .route("/health", get(routes::system::health))
        .nest(API_PREFIX, api)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Periodically deletes carts whose expiry has passed.
///
/// `every` must be non-zero. Runs until the returned handle is aborted. A
/// failed sweep is logged and retried on the next tick.
pub fn spawn_cart_sweeper<S: DocumentStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if let Err(e) = state.carts.purge_expired(chrono::Utc::now()).await {
                tracing::warn!(error = %e, "Cart sweep failed");
            }
        }
    })
}
