//! Value objects shared by the catalog, cart and order aggregates.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a catalog product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(Uuid);

impl ProductId {
    /// Creates a new random product ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a product ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ProductId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ProductId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Money amount represented in cents to avoid floating point drift.
///
/// Serialized as a decimal number with two fractional digits; decimal input
/// is rounded to the nearest cent. Operators saturate at the `i64` range;
/// totals that must be exact go through the `checked_*` methods.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(from = "f64", into = "f64")]
pub struct Money {
    /// Amount in cents (e.g., 1000 = $10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub const fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a Money amount from a decimal value, rounded to 2 places.
    pub fn from_decimal(amount: f64) -> Self {
        Self {
            cents: (amount * 100.0).round() as i64,
        }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the amount as a decimal value.
    pub fn as_decimal(&self) -> f64 {
        self.cents as f64 / 100.0
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents.saturating_mul(i64::from(quantity)),
        }
    }

    /// Multiplies by a quantity, returning `None` on overflow.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
    }

    /// Adds two amounts, returning `None` on overflow.
    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.cents.checked_add(rhs.cents).map(Money::from_cents)
    }
}

impl From<f64> for Money {
    fn from(amount: f64) -> Self {
        Self::from_decimal(amount)
    }
}

impl From<Money> for f64 {
    fn from(money: Money) -> Self {
        money.as_decimal()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents.saturating_add(rhs.cents),
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents.saturating_sub(rhs.cents),
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents = self.cents.saturating_add(rhs.cents);
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// A concrete variant choice attached to a cart or order line.
///
/// Two selections are the same when the variant id and every attribute are
/// equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSelection {
    pub id: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl VariantSelection {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// How the customer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on delivery.
    #[serde(alias = "cod", alias = "cash_on_delivery", alias = "Cash")]
    Cash,
    #[serde(alias = "Card")]
    Card,
    #[serde(alias = "PayPal")]
    Paypal,
    BankTransfer,
}

impl PaymentMethod {
    /// Returns true for cash on delivery.
    pub fn is_cash(&self) -> bool {
        matches!(self, PaymentMethod::Cash)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shipping address snapshot stored on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[serde(default)]
    pub full_name: Option<String>,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl ShippingAddress {
    /// Returns the name of the first required field that is blank.
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("address", &self.address),
            ("city", &self.city),
            ("postalCode", &self.postal_code),
            ("country", &self.country),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}

/// Client-supplied payment details; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetailsInput {
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub payer_email: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Payment details snapshot stored on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub payment_id: String,
    pub payer_email: Option<String>,
    pub status: Option<String>,
    pub update_time: DateTime<Utc>,
}

impl PaymentDetails {
    /// Completes client input, generating `pay_<millis>` when no payment id is
    /// given and falling back to `owner_email` for the payer.
    pub fn complete(
        input: Option<PaymentDetailsInput>,
        owner_email: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        let input = input.unwrap_or_default();
        let payment_id = input
            .payment_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("pay_{}", now.timestamp_millis()));
        let payer_email = input
            .payer_email
            .filter(|e| !e.trim().is_empty())
            .or_else(|| owner_email.map(str::to_string));

        Self {
            payment_id,
            payer_email,
            status: input.status,
            update_time: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_from_decimal_rounds_to_cents() {
        assert_eq!(Money::from_decimal(19.99).cents(), 1999);
        assert_eq!(Money::from_decimal(0.105).cents(), 11);
        assert_eq!(Money::from_decimal(10.0).cents(), 1000);
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(1234).to_string(), "$12.34");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-$12.34");
    }

    #[test]
    fn test_money_serializes_as_decimal() {
        let json = serde_json::to_value(Money::from_cents(2500)).unwrap();
        assert_eq!(json, serde_json::json!(25.0));

        let money: Money = serde_json::from_value(serde_json::json!(19.99)).unwrap();
        assert_eq!(money.cents(), 1999);

        let money: Money = serde_json::from_value(serde_json::json!(5)).unwrap();
        assert_eq!(money.cents(), 500);
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!(a.multiply(3).cents(), 3000);
        assert_eq!(vec![a, b, b].into_iter().sum::<Money>().cents(), 2000);
    }

    #[test]
    fn test_money_overflow() {
        let huge = Money::from_decimal(1e17);
        assert_eq!(huge.cents(), i64::MAX);

        assert_eq!(huge.checked_multiply(2), None);
        assert_eq!(huge.checked_add(Money::from_cents(1)), None);
        assert_eq!(
            Money::from_cents(1000).checked_multiply(3),
            Some(Money::from_cents(3000))
        );

        assert_eq!(huge.multiply(2).cents(), i64::MAX);
        assert_eq!((huge + huge).cents(), i64::MAX);
        assert_eq!(
            Money::from_cents(i64::MIN).to_string(),
            "-$92233720368547758.08"
        );
    }

    #[test]
    fn test_variant_selection_structural_equality() {
        let a = VariantSelection::new("v1")
            .with_attribute("size", "M")
            .with_attribute("color", "red");
        let b = VariantSelection::new("v1")
            .with_attribute("color", "red")
            .with_attribute("size", "M");
        let c = VariantSelection::new("v1").with_attribute("size", "L");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_payment_method_parsing() {
        let m: PaymentMethod = serde_json::from_str("\"cash\"").unwrap();
        assert!(m.is_cash());
        let m: PaymentMethod = serde_json::from_str("\"cod\"").unwrap();
        assert!(m.is_cash());
        let m: PaymentMethod = serde_json::from_str("\"bank_transfer\"").unwrap();
        assert_eq!(m, PaymentMethod::BankTransfer);
        assert!(serde_json::from_str::<PaymentMethod>("\"bitcoin\"").is_err());
    }

    #[test]
    fn test_shipping_address_missing_field() {
        let mut address = ShippingAddress {
            full_name: None,
            address: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            postal_code: "12345".to_string(),
            country: "US".to_string(),
            phone: None,
        };
        assert_eq!(address.missing_field(), None);

        address.city = "  ".to_string();
        assert_eq!(address.missing_field(), Some("city"));
    }

    #[test]
    fn test_payment_details_defaults() {
        let now = Utc::now();
        let details = PaymentDetails::complete(None, Some("owner@example.com"), now);
        assert_eq!(details.payment_id, format!("pay_{}", now.timestamp_millis()));
        assert_eq!(details.payer_email.as_deref(), Some("owner@example.com"));

        let details = PaymentDetails::complete(
            Some(PaymentDetailsInput {
                payment_id: Some("ch_123".to_string()),
                payer_email: Some("payer@example.com".to_string()),
                status: Some("COMPLETED".to_string()),
            }),
            Some("owner@example.com"),
            now,
        );
        assert_eq!(details.payment_id, "ch_123");
        assert_eq!(details.payer_email.as_deref(), Some("payer@example.com"));
    }
}
