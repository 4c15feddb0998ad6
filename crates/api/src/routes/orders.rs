//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::UserId;
use document_store::DocumentStore;
use domain::{DirectOrder, OrderFilter, OrderStatus, Requester};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{GuestQuery, parse_aggregate_id, requester};
use crate::auth::{Identity, RequireAdmin};
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(flatten)]
    pub order: DirectOrder,
    #[serde(default)]
    pub guest_email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersQuery {
    #[serde(default)]
    pub guest_email: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub user: Option<UserId>,
    /// Admin filter on guest orders; `guestEmail` identifies the caller.
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// POST /orders: buy a single product directly.
#[tracing::instrument(skip(state, identity, query, payload))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    query: Result<Query<GuestQuery>, QueryRejection>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<ApiResponse<Value>, ApiError> {
    let Query(query) = query?;
    let Json(request) = payload?;

    let payer_email = request
        .order
        .payment_details
        .as_ref()
        .and_then(|d| d.payer_email.as_deref());
    let guest_email = query
        .guest_email
        .as_deref()
        .or(request.guest_email.as_deref());
    let requester = Requester::for_checkout(identity.0, guest_email, payer_email)?;

    let order = state.orders.place_direct(&requester, request.order).await?;
    Ok(ApiResponse::created(json!({ "order": order })))
}

/// GET /orders: orders visible to the caller, newest first.
#[tracing::instrument(skip(state, identity, query))]
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    query: Result<Query<ListOrdersQuery>, QueryRejection>,
) -> Result<ApiResponse<Value>, ApiError> {
    let Query(query) = query?;
    let requester = requester(identity.0, query.guest_email.as_deref())?;

    let status = query
        .status
        .as_deref()
        .map(str::parse::<OrderStatus>)
        .transpose()
        .map_err(|_| ApiError::Validation("Invalid status filter".to_string()))?;

    let filter = OrderFilter {
        status,
        user: query.user,
        guest_email: query.customer_email,
        include_deleted: query.include_deleted,
        limit: query.limit,
        offset: query.offset,
    };

    let orders = state.orders.list(&requester, filter).await?;
    Ok(ApiResponse::ok(
        json!({ "results": orders.len(), "orders": orders }),
    ))
}

/// GET /orders/{id}: one order, if the caller may see it.
#[tracing::instrument(skip(state, identity, query))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<String>,
    query: Result<Query<GuestQuery>, QueryRejection>,
) -> Result<ApiResponse<Value>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let Query(query) = query?;
    let requester = requester(identity.0, query.guest_email.as_deref())?;

    let order = state.orders.get(&requester, order_id).await?;
    Ok(ApiResponse::ok(json!({ "order": order })))
}

/// PATCH /orders/{id}/status: move an order along its lifecycle (admin).
#[tracing::instrument(skip(state, admin, payload))]
pub async fn update_status<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<ApiResponse<Value>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let Json(request) = payload?;

    let order = state
        .orders
        .update_status(&admin, order_id, &request.status)
        .await?;
    Ok(ApiResponse::ok(json!({ "order": order })))
}

/// POST /orders/{id}/cancel: the owner cancels their order.
#[tracing::instrument(skip(state, identity, query))]
pub async fn cancel<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<String>,
    query: Result<Query<GuestQuery>, QueryRejection>,
) -> Result<ApiResponse<Value>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let Query(query) = query?;
    let requester = requester(identity.0, query.guest_email.as_deref())?;

    let order = state.orders.cancel_by_customer(&requester, order_id).await?;
    Ok(ApiResponse::ok(json!({ "order": order })))
}

/// PATCH /orders/{id}/pay: record payment (admin).
#[tracing::instrument(skip(state, admin))]
pub async fn mark_paid<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<ApiResponse<Value>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let order = state.orders.mark_paid(&admin, order_id).await?;
    Ok(ApiResponse::ok(json!({ "order": order })))
}

/// PATCH /orders/{id}/deliver: record delivery (admin).
#[tracing::instrument(skip(state, admin))]
pub async fn mark_delivered<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<ApiResponse<Value>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let order = state.orders.mark_delivered(&admin, order_id).await?;
    Ok(ApiResponse::ok(json!({ "order": order })))
}

/// PATCH /orders/{id}/mark-cancelled: cancel on the shop's side (admin).
#[tracing::instrument(skip(state, admin))]
pub async fn mark_cancelled<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<ApiResponse<Value>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let order = state.orders.mark_cancelled(&admin, order_id).await?;
    Ok(ApiResponse::ok(json!({ "order": order })))
}

/// DELETE /orders/{id}: soft delete (admin).
#[tracing::instrument(skip(state, admin))]
pub async fn delete<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    state.orders.soft_delete(&admin, order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /orders/{id}/history: the order's audit log (admin).
#[tracing::instrument(skip(state, admin))]
pub async fn history<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<ApiResponse<Value>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let history = state.orders.history(&admin, order_id).await?;
    Ok(ApiResponse::ok(json!({ "history": history })))
}
