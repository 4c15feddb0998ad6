//! Domain layer for the storefront backend.
//!
//! This crate provides the core domain abstractions including:
//! - Aggregate trait and Repository for versioned, document-backed entities
//! - Requester, ownership and access scope for guest and registered shoppers
//! - Product catalog with variants, stock and price history
//! - Cart aggregate with totals and at-most-once conversion into an order
//! - Order aggregate with its status state machine

pub mod access;
pub mod aggregate;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod order;
pub mod repository;
pub mod settings;
pub mod value_objects;

pub use access::{AccessError, AccessScope, Ownership, Principal, Requester, Role};
pub use aggregate::Aggregate;
pub use cart::{AddToCart, Cart, CartError, CartItem, CartService, CheckoutRequest};
pub use catalog::{CatalogError, CatalogService, NewProduct, NewVariant, Product};
pub use error::DomainError;
pub use order::{
    DirectOrder, Order, OrderError, OrderFilter, OrderItem, OrderService, OrderStatus,
    PaymentStatus,
};
pub use repository::{CommandResult, Repository};
pub use settings::CommerceSettings;
pub use value_objects::{
    Money, PaymentDetails, PaymentDetailsInput, PaymentMethod, ProductId, ShippingAddress,
    VariantSelection,
};
