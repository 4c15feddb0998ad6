//! Product catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use document_store::DocumentStore;
use domain::{Money, NewProduct};
use serde::Deserialize;
use serde_json::{Value, json};

use super::parse_product_id;
use crate::auth::{Identity, RequireAdmin};
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 200;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListProductsQuery {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
    /// Honoured for administrators only.
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePriceRequest {
    pub price: Money,
}

/// POST /products: add a product (admin).
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequireAdmin(_): RequireAdmin,
    payload: Result<Json<NewProduct>, JsonRejection>,
) -> Result<ApiResponse<Value>, ApiError> {
    let Json(new) = payload?;
    let product = state.catalog.create_product(new).await?;
    Ok(ApiResponse::created(json!({ "product": product })))
}

/// GET /products: list products, newest first.
#[tracing::instrument(skip(state, identity))]
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    query: Result<Query<ListProductsQuery>, QueryRejection>,
) -> Result<ApiResponse<Value>, ApiError> {
    let Query(query) = query?;
    let is_admin = identity.0.as_ref().is_some_and(|p| p.is_admin());
    let active_only = !(is_admin && query.include_inactive);

    let products = state
        .catalog
        .list_products(
            active_only,
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE),
            query.offset.unwrap_or(0),
        )
        .await?;

    Ok(ApiResponse::ok(
        json!({ "results": products.len(), "products": products }),
    ))
}

/// GET /products/{id}: load one product.
#[tracing::instrument(skip(state))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Value>, ApiError> {
    let product_id = parse_product_id(&id)?;
    let product = state
        .catalog
        .get_product(product_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {id} not found")))?;

    Ok(ApiResponse::ok(json!({ "product": product })))
}

/// PATCH /products/{id}/price: change the base price (admin).
#[tracing::instrument(skip(state, admin, payload))]
pub async fn update_price<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    payload: Result<Json<UpdatePriceRequest>, JsonRejection>,
) -> Result<ApiResponse<Value>, ApiError> {
    let product_id = parse_product_id(&id)?;
    let Json(request) = payload?;

    let product = state.catalog.update_price(product_id, request.price).await?;
    tracing::info!(%product_id, actor = %admin.user_id, price = %product.price(), "Price updated");

    Ok(ApiResponse::ok(json!({ "product": product })))
}

/// PATCH /products/{id}/deactivate: take a product off sale (admin).
#[tracing::instrument(skip(state, admin))]
pub async fn deactivate<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<ApiResponse<Value>, ApiError> {
    let product_id = parse_product_id(&id)?;
    let product = state.catalog.deactivate_product(product_id).await?;
    tracing::info!(%product_id, actor = %admin.user_id, "Product taken off sale");

    Ok(ApiResponse::ok(json!({ "product": product })))
}

/// GET /products/{id}/price-history: recorded price changes, oldest first.
#[tracing::instrument(skip(state))]
pub async fn price_history<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Value>, ApiError> {
    let product_id = parse_product_id(&id)?;
    let product = state
        .catalog
        .get_product(product_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {id} not found")))?;

    Ok(ApiResponse::ok(json!({
        "productId": product.product_id(),
        "currentPrice": product.price(),
        "priceHistory": product.price_history(),
    })))
}
