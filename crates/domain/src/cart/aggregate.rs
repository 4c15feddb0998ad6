//! Cart aggregate implementation.

use chrono::{DateTime, Duration, Utc};
use common::AggregateId;
use document_store::Version;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::Ownership;
use crate::aggregate::Aggregate;
use crate::catalog::Quote;
use crate::order::{Order, OrderItem, PlaceOrder};
use crate::value_objects::{
    Money, PaymentDetails, PaymentDetailsInput, PaymentMethod, ProductId, ShippingAddress,
    VariantSelection,
};

use super::CartError;

/// Maximum number of lines in a cart.
pub const MAX_CART_ITEMS: usize = 50;

/// Smallest quantity a line may hold.
pub const MIN_ITEM_QUANTITY: u32 = 1;

/// Largest quantity a line may hold.
pub const MAX_ITEM_QUANTITY: u32 = 100;

/// A line in the cart, with the price and name captured when it was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: ProductId,
    pub variant: Option<VariantSelection>,
    pub name: String,
    pub price: Money,
    pub image: Option<String>,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    /// Returns the total price for this line (price * quantity).
    pub fn line_total(&self) -> Money {
        self.price.multiply(self.quantity)
    }

    fn is_same_line(&self, product_id: ProductId, variant: Option<&VariantSelection>) -> bool {
        self.product_id == product_id && self.variant.as_ref() == variant
    }

    fn to_order_item(&self) -> OrderItem {
        OrderItem {
            product_id: self.product_id,
            name: self.name.clone(),
            quantity: self.quantity,
            price: self.price,
            image: self.image.clone(),
            variant: self.variant.clone(),
        }
    }
}

/// A line to add to the cart.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCartItem {
    pub product_id: ProductId,
    pub variant: Option<VariantSelection>,
    pub name: String,
    pub price: Money,
    pub image: Option<String>,
    pub quantity: u32,
}

impl NewCartItem {
    /// Builds a line from a catalog quote.
    pub fn from_quote(quote: Quote, quantity: u32) -> Self {
        Self {
            product_id: quote.product_id,
            variant: quote.variant,
            name: quote.name,
            price: quote.unit_price,
            image: quote.image,
            quantity,
        }
    }
}

/// Inputs for converting a cart into an order.
#[derive(Debug, Clone)]
pub struct Checkout {
    pub ownership: Ownership,
    pub shipping_address: ShippingAddress,
    /// Overrides the payment method stored on the cart.
    pub payment_method: Option<PaymentMethod>,
    pub payment_details: Option<PaymentDetailsInput>,
    /// Used as the payer email when the payment details don't carry one.
    pub owner_email: Option<String>,
}

/// Computes `(subtotal, total)` for a set of lines.
///
/// Every line needs a non-zero price and quantity. Amounts are kept in cents
/// so both values are exact to two decimals.
pub fn cart_totals(
    items: &[CartItem],
    shipping_cost: Money,
) -> Result<(Money, Money), CartError> {
    let mut subtotal = Money::zero();
    for item in items {
        if item.quantity == 0 || !item.price.is_positive() {
            return Err(CartError::IncompleteItem { item_id: item.id });
        }
        subtotal = item
            .price
            .checked_multiply(item.quantity)
            .and_then(|line| subtotal.checked_add(line))
            .ok_or(CartError::AmountOutOfRange)?;
    }
    let total = subtotal
        .checked_add(shipping_cost)
        .ok_or(CartError::AmountOutOfRange)?;
    Ok((subtotal, total))
}

/// Cart aggregate root.
///
/// Owned by exactly one user or guest. Becomes read-only once converted into
/// an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    id: AggregateId,

    #[serde(skip)]
    version: Version,

    #[serde(flatten)]
    ownership: Ownership,

    items: Vec<CartItem>,
    payment_method: Option<PaymentMethod>,

    subtotal: Money,
    shipping_cost: Money,
    total_amount: Money,

    converted: bool,
    order_id: Option<AggregateId>,

    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Aggregate for Cart {
    type Error = CartError;

    fn aggregate_type() -> &'static str {
        "Cart"
    }

    fn collection() -> &'static str {
        "carts"
    }

    fn id(&self) -> AggregateId {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        Some(self.expires_at)
    }
}

// Query methods
impl Cart {
    pub fn ownership(&self) -> &Ownership {
        &self.ownership
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn shipping_cost(&self) -> Money {
        self.shipping_cost
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn is_converted(&self) -> bool {
        self.converted
    }

    pub fn order_id(&self) -> Option<AggregateId> {
        self.order_id
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the index of the line `item_ref` refers to.
    ///
    /// Matched against line ids first, then product ids, then variant ids.
    fn find_line(&self, item_ref: &str) -> Option<usize> {
        let item_ref = item_ref.trim();
        self.items
            .iter()
            .position(|i| i.id.to_string().eq_ignore_ascii_case(item_ref))
            .or_else(|| {
                self.items
                    .iter()
                    .position(|i| i.product_id.to_string().eq_ignore_ascii_case(item_ref))
            })
            .or_else(|| {
                self.items
                    .iter()
                    .position(|i| i.variant.as_ref().is_some_and(|v| v.id == item_ref))
            })
    }

    /// Checks that the cart can be turned into an order.
    pub fn can_convert_to_order(&self) -> Result<(), CartError> {
        self.conversion_guard(self.payment_method).map(|_| ())
    }

    fn conversion_guard(
        &self,
        payment_method: Option<PaymentMethod>,
    ) -> Result<PaymentMethod, CartError> {
        if self.converted {
            return Err(CartError::AlreadyConverted);
        }
        if self.items.is_empty() {
            return Err(CartError::Empty);
        }
        let payment_method = payment_method.ok_or(CartError::PaymentMethodRequired)?;
        cart_totals(&self.items, self.shipping_cost)?;
        Ok(payment_method)
    }
}

// Command methods
impl Cart {
    /// Opens an empty cart for an owner.
    pub fn open(
        id: AggregateId,
        ownership: Ownership,
        shipping_cost: Money,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            version: Version::initial(),
            ownership,
            items: Vec::new(),
            payment_method: None,
            subtotal: Money::zero(),
            shipping_cost,
            total_amount: shipping_cost,
            converted: false,
            order_id: None,
            created_at: now,
            updated_at: now,
            expires_at: now + ttl,
        }
    }

    /// Adds a line, or increases the quantity of the matching line.
    ///
    /// Returns the id of the affected line.
    pub fn add_item(&mut self, item: NewCartItem, now: DateTime<Utc>) -> Result<Uuid, CartError> {
        self.ensure_mutable()?;
        validate_quantity(item.quantity)?;
        if !item.price.is_positive() {
            return Err(CartError::InvalidPrice {
                product_id: item.product_id,
            });
        }

        let existing = self
            .items
            .iter_mut()
            .find(|i| i.is_same_line(item.product_id, item.variant.as_ref()));

        let line_id = match existing {
            Some(line) => {
                let quantity = line.quantity + item.quantity;
                validate_quantity(quantity)?;
                line.quantity = quantity;
                line.id
            }
            None => {
                if self.items.len() >= MAX_CART_ITEMS {
                    return Err(CartError::TooManyItems {
                        max: MAX_CART_ITEMS,
                    });
                }
                let id = Uuid::new_v4();
                self.items.push(CartItem {
                    id,
                    product_id: item.product_id,
                    variant: item.variant,
                    name: item.name,
                    price: item.price,
                    image: item.image,
                    quantity: item.quantity,
                    added_at: now,
                });
                id
            }
        };

        self.calculate_totals()?;
        self.updated_at = now;
        Ok(line_id)
    }

    /// Removes the line `item_ref` refers to.
    pub fn remove_item(
        &mut self,
        item_ref: &str,
        now: DateTime<Utc>,
    ) -> Result<CartItem, CartError> {
        self.ensure_mutable()?;
        let index = self
            .find_line(item_ref)
            .ok_or_else(|| CartError::ItemNotFound(item_ref.to_string()))?;

        let removed = self.items.remove(index);
        self.calculate_totals()?;
        self.updated_at = now;
        Ok(removed)
    }

    /// Sets the quantity of the line `item_ref` refers to.
    pub fn update_item_quantity(
        &mut self,
        item_ref: &str,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<(), CartError> {
        self.ensure_mutable()?;
        validate_quantity(quantity)?;
        let index = self
            .find_line(item_ref)
            .ok_or_else(|| CartError::ItemNotFound(item_ref.to_string()))?;

        self.items[index].quantity = quantity;
        self.calculate_totals()?;
        self.updated_at = now;
        Ok(())
    }

    /// Recomputes subtotal and total from the current lines.
    pub fn calculate_totals(&mut self) -> Result<(), CartError> {
        let (subtotal, total) = cart_totals(&self.items, self.shipping_cost)?;
        self.subtotal = subtotal;
        self.total_amount = total;
        Ok(())
    }

    /// Chooses how the order will be paid.
    pub fn select_payment_method(
        &mut self,
        payment_method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Result<(), CartError> {
        self.ensure_mutable()?;
        self.payment_method = Some(payment_method);
        self.updated_at = now;
        Ok(())
    }

    /// Builds an order from the cart and marks the cart converted.
    ///
    /// The cart is left untouched if anything is rejected, so a failed or
    /// repeated conversion never changes its state.
    pub fn convert_to_order(
        &mut self,
        checkout: Checkout,
        now: DateTime<Utc>,
    ) -> Result<Order, CartError> {
        let payment_method =
            self.conversion_guard(checkout.payment_method.or(self.payment_method))?;
        let (subtotal, total) = cart_totals(&self.items, self.shipping_cost)?;

        let owner_email = checkout
            .owner_email
            .or_else(|| self.ownership.guest_email.clone());

        let order = Order::place(
            AggregateId::new(),
            PlaceOrder {
                ownership: checkout.ownership,
                items: self.items.iter().map(CartItem::to_order_item).collect(),
                shipping_address: checkout.shipping_address,
                payment_method,
                payment_details: PaymentDetails::complete(
                    checkout.payment_details,
                    owner_email.as_deref(),
                    now,
                ),
                shipping_cost: self.shipping_cost,
                source_cart: Some(self.id),
            },
            now,
        )?;

        self.payment_method = Some(payment_method);
        self.subtotal = subtotal;
        self.total_amount = total;
        self.converted = true;
        self.order_id = Some(order.id());
        self.updated_at = now;

        Ok(order)
    }

    /// Undoes a conversion whose order could not be stored.
    ///
    /// Returns false if the cart was not converted into `order_id`.
    pub fn revert_conversion(&mut self, order_id: AggregateId, now: DateTime<Utc>) -> bool {
        if !self.converted || self.order_id != Some(order_id) {
            return false;
        }
        self.converted = false;
        self.order_id = None;
        self.updated_at = now;
        true
    }

    /// Pushes expiry out to `ttl` after `now`.
    pub fn refresh_expiry(&mut self, ttl: Duration, now: DateTime<Utc>) {
        self.expires_at = now + ttl;
    }

    fn ensure_mutable(&self) -> Result<(), CartError> {
        if self.converted {
            Err(CartError::AlreadyConverted)
        } else {
            Ok(())
        }
    }
}

fn validate_quantity(quantity: u32) -> Result<(), CartError> {
    if (MIN_ITEM_QUANTITY..=MAX_ITEM_QUANTITY).contains(&quantity) {
        Ok(())
    } else {
        Err(CartError::InvalidQuantity { quantity })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Requester;
    use crate::order::{OrderError, OrderStatus, PaymentStatus};

    fn guest() -> Requester {
        Requester::guest("a@b.com").unwrap()
    }

    fn cart(shipping_cents: i64) -> Cart {
        Cart::open(
            AggregateId::new(),
            Ownership::for_requester(&guest(), None),
            Money::from_cents(shipping_cents),
            Duration::days(30),
            Utc::now(),
        )
    }

    fn line(product_id: ProductId, cents: i64, quantity: u32) -> NewCartItem {
        NewCartItem {
            product_id,
            variant: None,
            name: "Widget".to_string(),
            price: Money::from_cents(cents),
            image: None,
            quantity,
        }
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: None,
            address: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            postal_code: "12345".to_string(),
            country: "US".to_string(),
            phone: None,
        }
    }

    fn checkout(payment_method: Option<PaymentMethod>) -> Checkout {
        Checkout {
            ownership: Ownership::for_requester(&guest(), Some("Sam")),
            shipping_address: address(),
            payment_method,
            payment_details: None,
            owner_email: Some("a@b.com".to_string()),
        }
    }

    fn filled_cart() -> Cart {
        let mut cart = cart(500);
        let now = Utc::now();
        cart.add_item(line(ProductId::new(), 1000, 2), now).unwrap();
        cart.add_item(line(ProductId::new(), 500, 1), now).unwrap();
        cart
    }

    #[test]
    fn test_totals_example() {
        let cart = filled_cart();
        assert_eq!(cart.subtotal(), Money::from_decimal(25.0));
        assert_eq!(cart.total_amount(), Money::from_decimal(30.0));
    }

    #[test]
    fn test_totals_track_every_mutation() {
        let mut cart = cart(499);
        let now = Utc::now();
        let a = ProductId::new();
        let b = ProductId::new();

        cart.add_item(line(a, 1999, 3), now).unwrap();
        cart.add_item(line(b, 1, 7), now).unwrap();
        cart.update_item_quantity(&a.to_string(), 5, now).unwrap();
        cart.remove_item(&b.to_string(), now).unwrap();
        cart.add_item(line(b, 333, 3), now).unwrap();

        let expected: Money = cart.items().iter().map(CartItem::line_total).sum();
        assert_eq!(cart.subtotal(), expected);
        assert_eq!(cart.subtotal(), Money::from_cents(1999 * 5 + 333 * 3));
        assert_eq!(cart.total_amount(), cart.subtotal() + Money::from_cents(499));
    }

    #[test]
    fn test_totals_reject_overflow() {
        let now = Utc::now();
        let mut free_shipping = cart(0);
        let mut costly_shipping = cart(i64::MAX);

        let result = free_shipping.add_item(line(ProductId::new(), i64::MAX / 2, 3), now);
        assert_eq!(result.unwrap_err(), CartError::AmountOutOfRange);
        assert!(CartError::AmountOutOfRange.is_validation());

        let result = costly_shipping.add_item(line(ProductId::new(), 100, 1), now);
        assert_eq!(result.unwrap_err(), CartError::AmountOutOfRange);
    }

    #[test]
    fn test_same_product_and_variant_merges() {
        let mut cart = cart(0);
        let now = Utc::now();
        let product_id = ProductId::new();
        let red = VariantSelection::new("v1").with_attribute("color", "red");

        let mut first = line(product_id, 1000, 1);
        first.variant = Some(red.clone());
        let first_id = cart.add_item(first.clone(), now).unwrap();
        let second_id = cart.add_item(first, now).unwrap();

        assert_eq!(first_id, second_id);
        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.items()[0].quantity, 2);

        let mut blue = line(product_id, 1000, 1);
        blue.variant = Some(VariantSelection::new("v1").with_attribute("color", "blue"));
        cart.add_item(blue, now).unwrap();
        assert_eq!(cart.item_count(), 2);
    }

    #[test]
    fn test_quantity_limits() {
        let mut cart = cart(0);
        let now = Utc::now();
        let product_id = ProductId::new();

        assert_eq!(
            cart.add_item(line(product_id, 100, 0), now).unwrap_err(),
            CartError::InvalidQuantity { quantity: 0 }
        );
        cart.add_item(line(product_id, 100, 60), now).unwrap();
        assert_eq!(
            cart.add_item(line(product_id, 100, 41), now).unwrap_err(),
            CartError::InvalidQuantity { quantity: 101 }
        );
        assert_eq!(cart.items()[0].quantity, 60);

        assert!(cart.update_item_quantity(&product_id.to_string(), 101, now).is_err());
    }

    #[test]
    fn test_line_limit() {
        let mut cart = cart(0);
        let now = Utc::now();
        for _ in 0..MAX_CART_ITEMS {
            cart.add_item(line(ProductId::new(), 100, 1), now).unwrap();
        }

        assert_eq!(
            cart.add_item(line(ProductId::new(), 100, 1), now).unwrap_err(),
            CartError::TooManyItems {
                max: MAX_CART_ITEMS
            }
        );
    }

    #[test]
    fn test_zero_price_rejected() {
        let mut cart = cart(0);
        assert!(matches!(
            cart.add_item(line(ProductId::new(), 0, 1), Utc::now()),
            Err(CartError::InvalidPrice { .. })
        ));
        assert!(cart.items().is_empty());
    }

    #[test]
    fn test_item_reference_precedence() {
        let mut cart = cart(0);
        let now = Utc::now();
        let product_id = ProductId::new();

        let mut variant_line = line(product_id, 100, 1);
        variant_line.variant = Some(VariantSelection::new("size-m"));
        let line_id = cart.add_item(variant_line, now).unwrap();
        cart.add_item(line(ProductId::new(), 200, 1), now).unwrap();

        cart.update_item_quantity(&line_id.to_string().to_uppercase(), 4, now)
            .unwrap();
        assert_eq!(cart.items()[0].quantity, 4);

        cart.update_item_quantity("size-m", 2, now).unwrap();
        assert_eq!(cart.items()[0].quantity, 2);

        let removed = cart.remove_item(&product_id.to_string(), now).unwrap();
        assert_eq!(removed.id, line_id);

        assert_eq!(
            cart.remove_item("missing", now).unwrap_err(),
            CartError::ItemNotFound("missing".to_string())
        );
    }

    #[test]
    fn test_cannot_convert_empty_or_without_payment_method() {
        let mut empty = cart(0);
        assert_eq!(
            empty
                .convert_to_order(checkout(Some(PaymentMethod::Card)), Utc::now())
                .unwrap_err(),
            CartError::Empty
        );

        let mut cart = filled_cart();
        assert_eq!(cart.can_convert_to_order(), Err(CartError::PaymentMethodRequired));
        assert_eq!(
            cart.convert_to_order(checkout(None), Utc::now()).unwrap_err(),
            CartError::PaymentMethodRequired
        );
        assert!(!cart.is_converted());
    }

    #[test]
    fn test_convert_builds_order_snapshot() {
        let mut cart = filled_cart();
        cart.select_payment_method(PaymentMethod::Cash, Utc::now()).unwrap();
        cart.can_convert_to_order().unwrap();

        let order = cart.convert_to_order(checkout(None), Utc::now()).unwrap();

        assert!(cart.is_converted());
        assert_eq!(cart.order_id(), Some(order.id()));
        assert_eq!(order.source_cart(), Some(cart.id()));
        assert_eq!(order.items().len(), 2);
        assert_eq!(order.total_amount(), Money::from_cents(3000));
        assert_eq!(order.status(), OrderStatus::Processing);
        assert_eq!(order.payment_status(), PaymentStatus::Pending);
        assert_eq!(order.ownership().guest_name.as_deref(), Some("Sam"));
        assert_eq!(
            order.payment_details().payer_email.as_deref(),
            Some("a@b.com")
        );
        assert!(order.payment_details().payment_id.starts_with("pay_"));
    }

    #[test]
    fn test_second_conversion_conflicts_and_leaves_cart_unchanged() {
        let mut cart = filled_cart();
        let order = cart
            .convert_to_order(checkout(Some(PaymentMethod::Card)), Utc::now())
            .unwrap();
        let before = serde_json::to_value(&cart).unwrap();

        let result = cart.convert_to_order(checkout(Some(PaymentMethod::Card)), Utc::now());

        assert_eq!(result.unwrap_err(), CartError::AlreadyConverted);
        assert_eq!(serde_json::to_value(&cart).unwrap(), before);
        assert_eq!(cart.order_id(), Some(order.id()));
    }

    #[test]
    fn test_converted_cart_is_immutable() {
        let mut cart = filled_cart();
        cart.convert_to_order(checkout(Some(PaymentMethod::Card)), Utc::now())
            .unwrap();
        let now = Utc::now();
        let first = cart.items()[0].id.to_string();

        assert_eq!(
            cart.add_item(line(ProductId::new(), 100, 1), now).unwrap_err(),
            CartError::AlreadyConverted
        );
        assert_eq!(
            cart.remove_item(&first, now).unwrap_err(),
            CartError::AlreadyConverted
        );
        assert_eq!(
            cart.update_item_quantity(&first, 3, now).unwrap_err(),
            CartError::AlreadyConverted
        );
        assert_eq!(
            cart.select_payment_method(PaymentMethod::Cash, now).unwrap_err(),
            CartError::AlreadyConverted
        );
    }

    #[test]
    fn test_invalid_address_fails_conversion_without_side_effects() {
        let mut cart = filled_cart();
        let mut request = checkout(Some(PaymentMethod::Card));
        request.shipping_address.city.clear();

        assert_eq!(
            cart.convert_to_order(request, Utc::now()).unwrap_err(),
            CartError::Order(OrderError::InvalidShippingAddress("city"))
        );
        assert!(!cart.is_converted());
        assert_eq!(cart.payment_method(), None);
    }

    #[test]
    fn test_revert_conversion() {
        let mut cart = filled_cart();
        let order = cart
            .convert_to_order(checkout(Some(PaymentMethod::Card)), Utc::now())
            .unwrap();

        assert!(!cart.revert_conversion(AggregateId::new(), Utc::now()));
        assert!(cart.revert_conversion(order.id(), Utc::now()));
        assert!(!cart.is_converted());
        cart.can_convert_to_order().unwrap();
    }

    #[test]
    fn test_expiry_refresh() {
        let mut cart = cart(0);
        let later = Utc::now() + Duration::days(10);
        cart.refresh_expiry(Duration::days(30), later);
        assert_eq!(cart.expires_at(), Some(later + Duration::days(30)));
    }
}
