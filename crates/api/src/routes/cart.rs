//! Cart endpoints.
//!
//! Every route serves both signed-in shoppers and guests; guests identify
//! themselves with `guestEmail` in the query string or the body.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use document_store::DocumentStore;
use domain::{AddToCart, CheckoutRequest, PaymentMethod, Requester};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{GuestQuery, requester};
use crate::auth::Identity;
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    #[serde(flatten)]
    pub item: AddToCart,
    #[serde(default)]
    pub guest_email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
    #[serde(default)]
    pub guest_email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodRequest {
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub guest_email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    #[serde(flatten)]
    pub checkout: CheckoutRequest,
    #[serde(default)]
    pub guest_email: Option<String>,
}

/// Query string first, then body.
fn cart_requester(
    identity: Identity,
    query: &GuestQuery,
    body_email: Option<&str>,
) -> Result<Requester, ApiError> {
    requester(identity.0, query.guest_email.as_deref().or(body_email))
}

/// GET /cart: the caller's active cart, or null.
#[tracing::instrument(skip(state, identity, query))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    query: Result<Query<GuestQuery>, QueryRejection>,
) -> Result<ApiResponse<Value>, ApiError> {
    let Query(query) = query?;
    let requester = cart_requester(identity, &query, None)?;

    let cart = state.carts.active_cart(&requester).await?;
    Ok(ApiResponse::ok(json!({ "cart": cart })))
}

/// POST /cart/items: add a product, opening a cart if needed.
#[tracing::instrument(skip(state, identity, query, payload))]
pub async fn add_item<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    query: Result<Query<GuestQuery>, QueryRejection>,
    payload: Result<Json<AddItemRequest>, JsonRejection>,
) -> Result<ApiResponse<Value>, ApiError> {
    let Query(query) = query?;
    let Json(request) = payload?;
    let requester = cart_requester(identity, &query, request.guest_email.as_deref())?;

    let cart = state.carts.add_item(&requester, request.item).await?;
    Ok(ApiResponse::ok(json!({ "cart": cart })))
}

/// PATCH /cart/items/{itemId}: set a line's quantity.
#[tracing::instrument(skip(state, identity, query, payload))]
pub async fn update_item<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(item_id): Path<String>,
    query: Result<Query<GuestQuery>, QueryRejection>,
    payload: Result<Json<UpdateQuantityRequest>, JsonRejection>,
) -> Result<ApiResponse<Value>, ApiError> {
    let Query(query) = query?;
    let Json(request) = payload?;
    let requester = cart_requester(identity, &query, request.guest_email.as_deref())?;

    let cart = state
        .carts
        .update_item_quantity(&requester, &item_id, request.quantity)
        .await?;
    Ok(ApiResponse::ok(json!({ "cart": cart })))
}

/// DELETE /cart/items/{itemId}: drop a line.
#[tracing::instrument(skip(state, identity, query))]
pub async fn remove_item<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(item_id): Path<String>,
    query: Result<Query<GuestQuery>, QueryRejection>,
) -> Result<ApiResponse<Value>, ApiError> {
    let Query(query) = query?;
    let requester = cart_requester(identity, &query, None)?;

    let cart = state.carts.remove_item(&requester, &item_id).await?;
    Ok(ApiResponse::ok(json!({ "cart": cart })))
}

/// PUT /cart/payment-method: choose how the order will be paid.
#[tracing::instrument(skip(state, identity, query, payload))]
pub async fn select_payment_method<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    query: Result<Query<GuestQuery>, QueryRejection>,
    payload: Result<Json<PaymentMethodRequest>, JsonRejection>,
) -> Result<ApiResponse<Value>, ApiError> {
    let Query(query) = query?;
    let Json(request) = payload?;
    let requester = cart_requester(identity, &query, request.guest_email.as_deref())?;

    let cart = state
        .carts
        .select_payment_method(&requester, request.payment_method)
        .await?;
    Ok(ApiResponse::ok(json!({ "cart": cart })))
}

/// POST /cart/checkout: convert the cart into an order.
///
/// A guest without `guestEmail` is identified by the payer email.
#[tracing::instrument(skip(state, identity, query, payload))]
pub async fn checkout<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    query: Result<Query<GuestQuery>, QueryRejection>,
    payload: Result<Json<CheckoutBody>, JsonRejection>,
) -> Result<ApiResponse<Value>, ApiError> {
    let Query(query) = query?;
    let Json(body) = payload?;

    let payer_email = body
        .checkout
        .payment_details
        .as_ref()
        .and_then(|d| d.payer_email.as_deref());
    let guest_email = query.guest_email.as_deref().or(body.guest_email.as_deref());
    let requester = Requester::for_checkout(identity.0, guest_email, payer_email)?;

    let order = state.carts.checkout(&requester, body.checkout).await?;
    Ok(ApiResponse::created(json!({ "order": order })))
}
