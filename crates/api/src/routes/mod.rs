//! Route handlers, grouped by resource.

pub mod analytics;
pub mod cart;
pub mod orders;
pub mod products;
pub mod system;

use common::AggregateId;
use domain::{Principal, ProductId, Requester};
use serde::Deserialize;

use crate::error::ApiError;

/// `?guestEmail=` for routes that serve guests.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestQuery {
    #[serde(default)]
    pub guest_email: Option<String>,
}

/// Resolves the requester from the bearer identity or a guest email.
fn requester(
    principal: Option<Principal>,
    guest_email: Option<&str>,
) -> Result<Requester, ApiError> {
    Requester::resolve(principal, guest_email).map_err(ApiError::from)
}

fn parse_aggregate_id(id: &str) -> Result<AggregateId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::Validation(format!("Invalid ID format: {e}")))
}

fn parse_product_id(id: &str) -> Result<ProductId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::Validation(format!("Invalid product ID format: {e}")))
}
