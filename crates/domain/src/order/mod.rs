//! Order aggregate and related types.

mod aggregate;
mod commands;
mod service;
mod state;

pub use aggregate::{Order, OrderItem};
pub use commands::{DirectOrder, OrderFilter, PlaceOrder};
pub use service::OrderService;
pub use state::{OrderStatus, PaymentStatus};

use thiserror::Error;

use crate::value_objects::ProductId;

/// Errors that can occur during order operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// A line item is incomplete.
    #[error("Invalid item {product_id}: {reason}")]
    InvalidItem {
        product_id: ProductId,
        reason: &'static str,
    },

    /// A required shipping address field is blank.
    #[error("Shipping address is missing {0}")]
    InvalidShippingAddress(&'static str),

    /// Totals exceed the representable amount.
    #[error("Order total is too large")]
    AmountOutOfRange,

    /// Status value is not one of the known statuses.
    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    /// Requested status equals the current one.
    #[error("Order is already {0}")]
    NoOpTransition(OrderStatus),

    /// Status changes are not allowed after delivery.
    #[error("Order has already been delivered")]
    AlreadyDelivered,

    /// Order was cancelled earlier.
    #[error("Order has already been cancelled")]
    AlreadyCancelled,

    /// Payment was recorded earlier.
    #[error("Order has already been paid")]
    AlreadyPaid,

    /// Order was soft-deleted earlier.
    #[error("Order has already been deleted")]
    AlreadyDeleted,

    /// Order has progressed too far to be cancelled.
    #[error("Cannot cancel an order that is {0}")]
    CannotCancel(OrderStatus),

    /// Status can only move forward along the fulfillment path.
    #[error("Invalid state transition: cannot move from {from} to {to}")]
    BackwardTransition { from: OrderStatus, to: OrderStatus },

    /// Paid orders that have shipped can only be cancelled by an administrator.
    #[error("Paid orders that have shipped can only be cancelled by an administrator")]
    RequiresAdmin,

    /// Deleted orders accept no further changes.
    #[error("Order has been deleted")]
    Deleted,
}

impl OrderError {
    /// Returns true for malformed input, as opposed to a refused transition.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            OrderError::NoItems
                | OrderError::InvalidItem { .. }
                | OrderError::InvalidShippingAddress(_)
                | OrderError::AmountOutOfRange
                | OrderError::InvalidStatus(_)
        )
    }
}
