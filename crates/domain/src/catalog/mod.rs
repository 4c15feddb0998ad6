//! Product catalog: prices, variants and stock.

mod product;
mod service;

pub use product::{MAX_PRICE, NewProduct, NewVariant, PriceChange, Product, Quote, Variant};
pub use service::{CatalogService, StockLine};

use thiserror::Error;

use crate::value_objects::{Money, ProductId};

/// Errors that can occur during catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Product data failed validation.
    #[error("Invalid product: {0}")]
    InvalidProduct(String),

    /// Product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Product exists but is not for sale.
    #[error("Product is not available: {0}")]
    ProductUnavailable(ProductId),

    /// Variant does not exist on the product.
    #[error("Variant {variant_id} not found for product {product_id}")]
    VariantNotFound {
        product_id: ProductId,
        variant_id: String,
    },

    /// Not enough stock to cover the request.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// Prices must be positive and no higher than [`MAX_PRICE`].
    #[error("Invalid price: {0} (must be greater than 0 and at most $1000000.00)")]
    InvalidPrice(Money),
}
