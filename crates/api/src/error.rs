//! API error types with HTTP response mapping.
//!
//! Every failure leaves the server through [`ApiError`], rendered as
//! `{"status": "fail" | "error", "message": ...}`. Client errors use
//! `"fail"`, server errors use `"error"`.

use analytics::AnalyticsError;
use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use document_store::DocumentStoreError;
use domain::{AccessError, CartError, CatalogError, DomainError, OrderError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed input or a missing required field (400).
    Validation(String),
    /// A refused state change, e.g. converting a converted cart (400).
    Conflict(String),
    /// Missing resource, or one the caller may not see (404).
    NotFound(String),
    /// Authenticated but not allowed (403).
    Forbidden(String),
    /// Missing or unknown credentials (401).
    Unauthorized(String),
    /// The resource changed underneath the request (409).
    ConcurrencyConflict(String),
    /// Internal server error.
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::ConcurrencyConflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::Validation(msg)
            | ApiError::Conflict(msg)
            | ApiError::NotFound(msg)
            | ApiError::Forbidden(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::ConcurrencyConflict(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let (label, message) = if status.is_server_error() {
            tracing::error!(error = %self.message(), "internal server error");
            ("error", "Something went wrong".to_string())
        } else {
            ("fail", self.message().to_string())
        };

        let body = serde_json::json!({ "status": label, "message": message });
        (status, Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let message = err.to_string();
        match err {
            DomainError::NotFound { .. } => ApiError::NotFound(message),
            DomainError::Access(AccessError::IdentityRequired) => ApiError::Validation(
                "Authentication or a guest email is required".to_string(),
            ),
            DomainError::Access(_) => ApiError::Validation(message),
            DomainError::Order(OrderError::RequiresAdmin) => ApiError::Forbidden(message),
            DomainError::Order(e) if e.is_validation() => ApiError::Validation(message),
            DomainError::Order(_) => ApiError::Conflict(message),
            DomainError::Cart(CartError::ItemNotFound(_)) => ApiError::NotFound(message),
            DomainError::Cart(e) if e.is_validation() => ApiError::Validation(message),
            DomainError::Cart(_) => ApiError::Conflict(message),
            DomainError::Catalog(
                CatalogError::ProductNotFound(_) | CatalogError::VariantNotFound { .. },
            ) => ApiError::NotFound(message),
            DomainError::Catalog(_) => ApiError::Validation(message),
            DomainError::Store(
                DocumentStoreError::ConcurrencyConflict { .. }
                | DocumentStoreError::DuplicateDocument { .. },
            ) => ApiError::ConcurrencyConflict(
                "The resource was modified concurrently, please retry".to_string(),
            ),
            DomainError::Store(_) | DomainError::Serialization(_) => ApiError::Internal(message),
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        DomainError::from(err).into()
    }
}

impl From<AnalyticsError> for ApiError {
    fn from(err: AnalyticsError) -> Self {
        match err {
            AnalyticsError::Domain(e) => e.into(),
            e @ AnalyticsError::InvalidRange { .. } => ApiError::Validation(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}
