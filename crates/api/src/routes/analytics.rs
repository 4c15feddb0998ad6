//! Sales report endpoints (admin).

use std::sync::Arc;

use analytics::ReportRange;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use document_store::DocumentStore;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::auth::RequireAdmin;
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ReportQuery {
    fn range(&self) -> ReportRange {
        ReportRange::new(self.from, self.to)
    }
}

/// GET /orders/analytics/summary
#[tracing::instrument(skip(state, query))]
pub async fn summary<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequireAdmin(_): RequireAdmin,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> Result<ApiResponse<Value>, ApiError> {
    let Query(query) = query?;
    let summary = state.analytics.summary(query.range()).await?;
    Ok(ApiResponse::ok(json!({ "summary": summary })))
}

/// GET /orders/analytics/status
#[tracing::instrument(skip(state, query))]
pub async fn status<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequireAdmin(_): RequireAdmin,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> Result<ApiResponse<Value>, ApiError> {
    let Query(query) = query?;
    let statuses = state.analytics.status_breakdown(query.range()).await?;
    Ok(ApiResponse::ok(json!({ "statuses": statuses })))
}

/// GET /orders/analytics/top-products
#[tracing::instrument(skip(state, query))]
pub async fn top_products<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequireAdmin(_): RequireAdmin,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> Result<ApiResponse<Value>, ApiError> {
    let Query(query) = query?;
    let products = state
        .analytics
        .top_products(query.range(), query.limit)
        .await?;
    Ok(ApiResponse::ok(json!({ "products": products })))
}

/// GET /orders/analytics/customers
#[tracing::instrument(skip(state, query))]
pub async fn customers<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequireAdmin(_): RequireAdmin,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> Result<ApiResponse<Value>, ApiError> {
    let Query(query) = query?;
    let customers = state.analytics.customers(query.range(), query.limit).await?;
    Ok(ApiResponse::ok(json!({ "customers": customers })))
}

/// GET /orders/analytics/daily
#[tracing::instrument(skip(state, query))]
pub async fn daily<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    RequireAdmin(_): RequireAdmin,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> Result<ApiResponse<Value>, ApiError> {
    let Query(query) = query?;
    let days = state.analytics.daily_revenue(query.range()).await?;
    Ok(ApiResponse::ok(json!({ "days": days })))
}
