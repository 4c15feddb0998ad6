//! Shopping cart aggregate and related types.

mod aggregate;
mod service;

pub use aggregate::{
    Cart, CartItem, Checkout, MAX_CART_ITEMS, MAX_ITEM_QUANTITY, MIN_ITEM_QUANTITY, NewCartItem,
    cart_totals,
};
pub use service::{AddToCart, CartService, CheckoutRequest};

use thiserror::Error;
use uuid::Uuid;

use crate::order::OrderError;
use crate::value_objects::ProductId;

/// Errors that can occur during cart operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    /// Cart was already turned into an order and is read-only.
    #[error("Cart has already been converted to an order")]
    AlreadyConverted,

    /// Cart has no items.
    #[error("Cart is empty")]
    Empty,

    /// No payment method was selected.
    #[error("Payment method is required")]
    PaymentMethodRequired,

    /// Cart is full.
    #[error("Cart cannot hold more than {max} items")]
    TooManyItems { max: usize },

    /// Quantity outside the allowed range.
    #[error("Invalid quantity: {quantity} (must be between 1 and 100)")]
    InvalidQuantity { quantity: u32 },

    /// Price must be greater than zero.
    #[error("Invalid price for product {product_id}")]
    InvalidPrice { product_id: ProductId },

    /// A line is missing its price or quantity.
    #[error("Item {item_id} is missing a price or quantity")]
    IncompleteItem { item_id: Uuid },

    /// Totals exceed the representable amount.
    #[error("Cart total is too large")]
    AmountOutOfRange,

    /// No line matches the given item, product or variant id.
    #[error("Item not found in cart: {0}")]
    ItemNotFound(String),

    /// The order built from the cart was rejected.
    #[error(transparent)]
    Order(#[from] OrderError),
}

impl CartError {
    /// Returns true for input that can never succeed, as opposed to a
    /// refused state change or a missing line.
    pub fn is_validation(&self) -> bool {
        match self {
            CartError::AlreadyConverted | CartError::ItemNotFound(_) => false,
            CartError::Order(e) => e.is_validation(),
            _ => true,
        }
    }
}
