//! Cart service providing a simplified API for cart operations.

use chrono::{DateTime, Utc};
use common::AggregateId;
use document_store::DocumentStore;
use serde::Deserialize;

use crate::access::{Ownership, Requester};
use crate::aggregate::Aggregate;
use crate::catalog::CatalogService;
use crate::error::DomainError;
use crate::order::{Order, OrderService};
use crate::repository::Repository;
use crate::settings::CommerceSettings;
use crate::value_objects::{PaymentDetailsInput, PaymentMethod, ProductId, ShippingAddress};

use super::{Cart, CartError, Checkout, NewCartItem};

/// Request to put a product in the cart.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCart {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

/// Request to turn a cart into an order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Converts this cart instead of the active one.
    #[serde(default)]
    pub cart_id: Option<AggregateId>,
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub payment_details: Option<PaymentDetailsInput>,
    #[serde(default)]
    pub guest_name: Option<String>,
}

/// Service for managing carts.
///
/// Carts are always scoped to their owner, administrators included. Each
/// owner has at most one active (unconverted) cart, created lazily on the
/// first add.
pub struct CartService<S: DocumentStore> {
    carts: Repository<S, Cart>,
    catalog: CatalogService<S>,
    orders: OrderService<S>,
    settings: CommerceSettings,
}

impl<S: DocumentStore + Clone> CartService<S> {
    /// Creates a new cart service with the given document store.
    pub fn new(store: S, settings: CommerceSettings) -> Self {
        Self {
            carts: Repository::new(store.clone()),
            catalog: CatalogService::new(store.clone()),
            orders: OrderService::new(store, settings),
            settings,
        }
    }
}

impl<S: DocumentStore> CartService<S> {
    /// Returns a reference to the cart repository.
    pub fn repository(&self) -> &Repository<S, Cart> {
        &self.carts
    }

    /// Returns the requester's unconverted cart, if any.
    pub async fn active_cart(&self, requester: &Requester) -> Result<Option<Cart>, DomainError> {
        let query = self
            .carts
            .query()
            .matching(requester.owner_scope().filter())
            .field("converted", false);
        self.carts.find_one(query).await
    }

    /// Adds a product to the requester's cart, creating the cart if needed.
    ///
    /// Name, price and image come from the catalog, never from the client.
    #[tracing::instrument(skip(self, requester), fields(actor = %requester.actor()))]
    pub async fn add_item(
        &self,
        requester: &Requester,
        request: AddToCart,
    ) -> Result<Cart, DomainError> {
        let quote = self
            .catalog
            .quote(request.product_id, request.variant_id.as_deref(), request.quantity)
            .await?;
        let now = Utc::now();

        let cart = match self.active_cart(requester).await? {
            Some(cart) => cart,
            None => Cart::open(
                AggregateId::new(),
                Ownership::for_requester(requester, None),
                self.settings.shipping_cost,
                self.settings.cart_ttl,
                now,
            ),
        };

        let item = NewCartItem::from_quote(quote, request.quantity);
        let cart = self
            .mutate(cart, now, |c| c.add_item(item, now).map(|_| ()))
            .await?;

        metrics::counter!("cart_items_added_total").increment(1);
        Ok(cart)
    }

    /// Sets the quantity of a line in the requester's cart.
    #[tracing::instrument(skip(self, requester), fields(actor = %requester.actor()))]
    pub async fn update_item_quantity(
        &self,
        requester: &Requester,
        item_ref: &str,
        quantity: u32,
    ) -> Result<Cart, DomainError> {
        let cart = self.require_active_cart(requester).await?;
        let now = Utc::now();
        self.mutate(cart, now, |c| c.update_item_quantity(item_ref, quantity, now))
            .await
    }

    /// Removes a line from the requester's cart.
    #[tracing::instrument(skip(self, requester), fields(actor = %requester.actor()))]
    pub async fn remove_item(
        &self,
        requester: &Requester,
        item_ref: &str,
    ) -> Result<Cart, DomainError> {
        let cart = self.require_active_cart(requester).await?;
        let now = Utc::now();
        self.mutate(cart, now, |c| c.remove_item(item_ref, now).map(|_| ()))
            .await
    }

    /// Chooses the payment method for the requester's cart.
    #[tracing::instrument(skip(self, requester), fields(actor = %requester.actor()))]
    pub async fn select_payment_method(
        &self,
        requester: &Requester,
        payment_method: PaymentMethod,
    ) -> Result<Cart, DomainError> {
        let cart = self.require_active_cart(requester).await?;
        let now = Utc::now();
        self.mutate(cart, now, |c| c.select_payment_method(payment_method, now))
            .await
    }

    /// Converts a cart into an order.
    ///
    /// The converted cart is saved with a version check before the order is
    /// stored, so at most one of several concurrent checkouts of the same cart
    /// gets through. The others fail with [`CartError::AlreadyConverted`], as
    /// does a repeated checkout once the owner has no active cart left. If
    /// storing the order fails the conversion is undone.
    #[tracing::instrument(skip(self, requester, request), fields(actor = %requester.actor()))]
    pub async fn checkout(
        &self,
        requester: &Requester,
        request: CheckoutRequest,
    ) -> Result<Order, DomainError> {
        let cart = match request.cart_id {
            Some(cart_id) => {
                let query = self
                    .carts
                    .query()
                    .field("id", cart_id.to_string())
                    .matching(requester.owner_scope().filter());
                self.carts
                    .find_one(query)
                    .await?
                    .ok_or_else(|| Self::cart_not_found(cart_id.to_string()))?
            }
            None => match self.active_cart(requester).await? {
                Some(cart) => cart,
                None => return Err(self.missing_active_cart(requester).await),
            },
        };
        let cart_id = cart.id();

        let checkout = Checkout {
            ownership: Ownership::for_requester(requester, request.guest_name.as_deref()),
            shipping_address: request.shipping_address,
            payment_method: request.payment_method,
            payment_details: request.payment_details,
            owner_email: requester.email().map(str::to_string),
        };
        let now = Utc::now();

        let converted = match self
            .carts
            .execute(cart, |c| c.convert_to_order(checkout, now))
            .await
        {
            Ok(converted) => converted,
            Err(e) if e.is_concurrency_conflict() => {
                return Err(self.conversion_conflict(cart_id, e).await);
            }
            Err(e) => return Err(e),
        };
        let cart = converted.aggregate;
        let order = converted.output;
        let order_id = order.id();

        match self.orders.insert_placed(order, requester, "cart").await {
            Ok(order) => {
                metrics::counter!("carts_converted_total").increment(1);
                tracing::info!(cart_id = %cart.id(), order_id = %order_id, "Cart converted");
                Ok(order)
            }
            Err(e) => {
                self.revert_conversion(cart, order_id).await;
                Err(e)
            }
        }
    }

    /// Deletes every cart whose expiry has passed.
    #[tracing::instrument(skip(self))]
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let purged = self.carts.store().purge_expired(now).await?;
        if purged > 0 {
            metrics::counter!("carts_expired_total").increment(purged);
            tracing::info!(purged, "Purged expired carts");
        }
        Ok(purged)
    }

    /// Explains why there is no active cart to check out: the owner's newest
    /// cart was already converted, or there never was one.
    async fn missing_active_cart(&self, requester: &Requester) -> DomainError {
        let query = self
            .carts
            .query()
            .matching(requester.owner_scope().filter());
        match self.carts.find_one(query).await {
            Ok(Some(cart)) if cart.is_converted() => CartError::AlreadyConverted.into(),
            Ok(_) => Self::cart_not_found("active".to_string()),
            Err(e) => e,
        }
    }

    /// Resolves a lost conversion race. When the competing write converted the
    /// cart the loser sees the same conflict as a repeated checkout.
    async fn conversion_conflict(
        &self,
        cart_id: AggregateId,
        conflict: DomainError,
    ) -> DomainError {
        match self.carts.load(cart_id).await {
            Ok(Some(cart)) if cart.is_converted() => CartError::AlreadyConverted.into(),
            _ => conflict,
        }
    }

    async fn revert_conversion(&self, cart: Cart, order_id: AggregateId) {
        let cart_id = cart.id();
        let result = self
            .carts
            .execute(cart, |c| {
                c.revert_conversion(order_id, Utc::now());
                Ok::<_, CartError>(())
            })
            .await;

        match result {
            Ok(_) => tracing::warn!(
                cart_id = %cart_id,
                order_id = %order_id,
                "Cart conversion reverted"
            ),
            Err(e) => tracing::error!(
                cart_id = %cart_id,
                order_id = %order_id,
                error = %e,
                "Failed to revert cart conversion"
            ),
        }
    }

    /// Runs a cart command, refreshes the expiry and saves.
    async fn mutate<F>(
        &self,
        cart: Cart,
        now: DateTime<Utc>,
        command_fn: F,
    ) -> Result<Cart, DomainError>
    where
        F: FnOnce(&mut Cart) -> Result<(), CartError>,
    {
        let ttl = self.settings.cart_ttl;
        let result = self
            .carts
            .execute(cart, |c| {
                command_fn(c)?;
                c.refresh_expiry(ttl, now);
                Ok(())
            })
            .await?;
        Ok(result.aggregate)
    }

    async fn require_active_cart(&self, requester: &Requester) -> Result<Cart, DomainError> {
        self.active_cart(requester)
            .await?
            .ok_or_else(|| Self::cart_not_found("active".to_string()))
    }

    fn cart_not_found(id: String) -> DomainError {
        DomainError::NotFound {
            aggregate_type: Cart::aggregate_type(),
            aggregate_id: id,
        }
    }
}
