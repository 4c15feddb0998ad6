//! Inputs for order creation and listing.

use common::{AggregateId, UserId};
use serde::Deserialize;

use crate::access::Ownership;
use crate::value_objects::{
    Money, PaymentDetails, PaymentDetailsInput, PaymentMethod, ProductId, ShippingAddress,
};

use super::{OrderItem, OrderStatus};

/// Everything needed to create an order, already resolved and priced.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub ownership: Ownership,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_details: PaymentDetails,
    pub shipping_cost: Money,
    /// Cart the order was converted from, if any.
    pub source_cart: Option<AggregateId>,
}

/// A single-product quick order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectOrder {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_details: Option<PaymentDetailsInput>,
    #[serde(default)]
    pub guest_name: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

/// Explicit filters for order listings.
///
/// `user`, `guest_email` and `include_deleted` only take effect for
/// administrators; everyone else is confined to their own live orders.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub user: Option<UserId>,
    pub guest_email: Option<String>,
    pub include_deleted: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}
