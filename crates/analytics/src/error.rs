//! Analytics error types.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while building reports.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Loading orders failed.
    #[error("Domain error: {0}")]
    Domain(#[from] domain::DomainError),

    /// The requested range ends before it starts.
    #[error("Invalid date range: {from} is after {to}")]
    InvalidRange {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

/// Result type for analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;
