//! Runtime settings shared by the cart and order services.

use chrono::Duration;

use crate::value_objects::Money;

/// Days of inactivity after which a cart expires.
pub const DEFAULT_CART_TTL_DAYS: i64 = 30;

/// Settings passed explicitly into the services at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommerceSettings {
    /// Flat shipping cost added to every cart and order.
    pub shipping_cost: Money,
    /// How long an untouched cart survives.
    pub cart_ttl: Duration,
}

impl Default for CommerceSettings {
    fn default() -> Self {
        Self {
            shipping_cost: Money::zero(),
            cart_ttl: Duration::days(DEFAULT_CART_TTL_DAYS),
        }
    }
}

impl CommerceSettings {
    pub fn with_shipping_cost(mut self, shipping_cost: Money) -> Self {
        self.shipping_cost = shipping_cost;
        self
    }

    pub fn with_cart_ttl(mut self, cart_ttl: Duration) -> Self {
        self.cart_ttl = cart_ttl;
        self
    }
}
