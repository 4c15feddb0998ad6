//! Order service providing a simplified API for order operations.

use chrono::Utc;
use common::AggregateId;
use document_store::{DocumentStore, LogEntry};
use serde_json::json;

use crate::access::{Ownership, Principal, Requester, normalize_email};
use crate::aggregate::Aggregate;
use crate::catalog::{CatalogService, StockLine};
use crate::error::DomainError;
use crate::repository::Repository;
use crate::settings::CommerceSettings;
use crate::value_objects::PaymentDetails;

use super::{DirectOrder, Order, OrderError, OrderFilter, OrderItem, PlaceOrder};

/// Page size used when a listing doesn't ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Largest page a listing may request.
pub const MAX_PAGE_SIZE: usize = 200;

/// Service for managing orders.
///
/// Every read and write goes through the requester's access scope, so an
/// order outside the scope is indistinguishable from a missing one.
pub struct OrderService<S: DocumentStore> {
    orders: Repository<S, Order>,
    catalog: CatalogService<S>,
    settings: CommerceSettings,
}

impl<S: DocumentStore + Clone> OrderService<S> {
    /// Creates a new order service with the given document store.
    pub fn new(store: S, settings: CommerceSettings) -> Self {
        Self {
            orders: Repository::new(store.clone()),
            catalog: CatalogService::new(store),
            settings,
        }
    }
}

impl<S: DocumentStore> OrderService<S> {
    /// Returns a reference to the order repository.
    pub fn repository(&self) -> &Repository<S, Order> {
        &self.orders
    }

    /// Places a single-product quick order.
    #[tracing::instrument(skip(self, requester, cmd), fields(actor = %requester.actor(), product_id = %cmd.product_id))]
    pub async fn place_direct(
        &self,
        requester: &Requester,
        cmd: DirectOrder,
    ) -> Result<Order, DomainError> {
        let quote = self
            .catalog
            .quote(cmd.product_id, cmd.variant_id.as_deref(), cmd.quantity)
            .await?;
        let now = Utc::now();

        let item = OrderItem {
            product_id: quote.product_id,
            name: quote.name,
            quantity: cmd.quantity,
            price: quote.unit_price,
            image: quote.image,
            variant: quote.variant,
        };

        let order = Order::place(
            AggregateId::new(),
            PlaceOrder {
                ownership: Ownership::for_requester(requester, cmd.guest_name.as_deref()),
                items: vec![item],
                shipping_address: cmd.shipping_address,
                payment_method: cmd.payment_method,
                payment_details: PaymentDetails::complete(
                    cmd.payment_details,
                    requester.email(),
                    now,
                ),
                shipping_cost: self.settings.shipping_cost,
                source_cart: None,
            },
            now,
        )?;

        self.insert_placed(order, requester, "direct").await
    }

    /// Persists a newly placed order and runs the follow-ups: audit log,
    /// metrics and stock decrement.
    pub(crate) async fn insert_placed(
        &self,
        order: Order,
        requester: &Requester,
        source: &'static str,
    ) -> Result<Order, DomainError> {
        let order = self.orders.insert(order).await?;

        self.append_log(
            LogEntry::new(Order::collection(), order.id(), "created")
                .actor(requester.actor())
                .details(json!({
                    "source": source,
                    "sourceCart": order.source_cart(),
                    "totalAmount": order.total_amount(),
                    "paymentMethod": order.payment_method(),
                })),
        )
        .await;

        metrics::counter!("orders_created_total", "source" => source).increment(1);
        tracing::info!(
            order_id = %order.id(),
            total = %order.total_amount(),
            source,
            "Order placed"
        );

        let lines: Vec<StockLine<'_>> = order
            .items()
            .iter()
            .map(|item| StockLine {
                product_id: item.product_id,
                variant_id: item.variant.as_ref().map(|v| v.id.as_str()),
                quantity: item.quantity,
            })
            .collect();
        self.catalog.decrement_stock(&lines).await;

        Ok(order)
    }

    /// Gets an order visible to the requester.
    ///
    /// Deleted orders are visible to administrators only.
    pub async fn get(&self, requester: &Requester, id: AggregateId) -> Result<Order, DomainError> {
        let mut query = self
            .orders
            .query()
            .field("id", id.to_string())
            .matching(requester.scope().filter());
        if !requester.is_admin() {
            query = query.field("isDeleted", false);
        }

        self.orders
            .find_one(query)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                aggregate_type: Order::aggregate_type(),
                aggregate_id: id.to_string(),
            })
    }

    /// Lists orders visible to the requester, newest first.
    pub async fn list(
        &self,
        requester: &Requester,
        filter: OrderFilter,
    ) -> Result<Vec<Order>, DomainError> {
        let mut query = self
            .orders
            .query()
            .matching(requester.scope().filter())
            .limit(filter.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE))
            .offset(filter.offset.unwrap_or(0));

        if let Some(status) = filter.status {
            query = query.field("status", status.as_str());
        }

        let is_admin = requester.is_admin();
        if is_admin {
            if let Some(user) = filter.user {
                query = query.field("user", user.to_string());
            }
            if let Some(email) = filter.guest_email.as_deref().and_then(normalize_email) {
                query = query.field("guestEmail", email);
            }
        }
        if !(is_admin && filter.include_deleted) {
            query = query.field("isDeleted", false);
        }

        self.orders.find(query).await
    }

    /// Moves an order to a new status.
    #[tracing::instrument(skip(self, admin), fields(actor = %admin.user_id))]
    pub async fn update_status(
        &self,
        admin: &Principal,
        id: AggregateId,
        status: &str,
    ) -> Result<Order, DomainError> {
        self.transition(&Self::as_requester(admin), id, "status_changed", |order| {
            order.update_status(status, Utc::now())
        })
        .await
    }

    /// Cancels an order on behalf of its owner.
    #[tracing::instrument(skip(self, requester), fields(actor = %requester.actor()))]
    pub async fn cancel_by_customer(
        &self,
        requester: &Requester,
        id: AggregateId,
    ) -> Result<Order, DomainError> {
        self.transition(requester, id, "cancelled_by_customer", |order| {
            order.cancel_by_customer(Utc::now())
        })
        .await
    }

    /// Records payment for an order.
    #[tracing::instrument(skip(self, admin), fields(actor = %admin.user_id))]
    pub async fn mark_paid(
        &self,
        admin: &Principal,
        id: AggregateId,
    ) -> Result<Order, DomainError> {
        self.transition(&Self::as_requester(admin), id, "marked_paid", |order| {
            order.mark_paid(Utc::now())
        })
        .await
    }

    /// Records delivery of an order.
    #[tracing::instrument(skip(self, admin), fields(actor = %admin.user_id))]
    pub async fn mark_delivered(
        &self,
        admin: &Principal,
        id: AggregateId,
    ) -> Result<Order, DomainError> {
        self.transition(&Self::as_requester(admin), id, "marked_delivered", |order| {
            order.mark_delivered(Utc::now())
        })
        .await
    }

    /// Cancels an order administratively.
    #[tracing::instrument(skip(self, admin), fields(actor = %admin.user_id))]
    pub async fn mark_cancelled(
        &self,
        admin: &Principal,
        id: AggregateId,
    ) -> Result<Order, DomainError> {
        self.transition(&Self::as_requester(admin), id, "marked_cancelled", |order| {
            order.mark_cancelled(Utc::now())
        })
        .await
    }

    /// Soft-deletes an order.
    #[tracing::instrument(skip(self, admin), fields(actor = %admin.user_id))]
    pub async fn soft_delete(
        &self,
        admin: &Principal,
        id: AggregateId,
    ) -> Result<Order, DomainError> {
        self.transition(&Self::as_requester(admin), id, "deleted", |order| {
            order.soft_delete(Utc::now())
        })
        .await
    }

    /// Returns the audit log of an order, oldest first.
    pub async fn history(
        &self,
        admin: &Principal,
        id: AggregateId,
    ) -> Result<Vec<LogEntry>, DomainError> {
        let order = self.get(&Self::as_requester(admin), id).await?;
        Ok(self
            .orders
            .store()
            .log_for(Order::collection(), order.id())
            .await?)
    }

    async fn transition<F, T>(
        &self,
        requester: &Requester,
        id: AggregateId,
        action: &'static str,
        command_fn: F,
    ) -> Result<Order, DomainError>
    where
        F: FnOnce(&mut Order) -> Result<T, OrderError>,
    {
        let order = self.get(requester, id).await?;
        let previous = order.status();

        let result = self.orders.execute(order, command_fn).await?;
        let order = result.aggregate;

        self.append_log(
            LogEntry::new(Order::collection(), id, action)
                .actor(requester.actor())
                .details(json!({
                    "from": previous,
                    "to": order.status(),
                    "version": result.new_version,
                })),
        )
        .await;

        metrics::counter!("order_status_transitions_total", "action" => action).increment(1);
        tracing::info!(
            order_id = %id,
            action,
            from = %previous,
            to = %order.status(),
            "Order updated"
        );

        Ok(order)
    }

    // The change is already committed; a lost audit entry is reported, not
    // turned into a failed request.
    async fn append_log(&self, entry: LogEntry) {
        let order_id = entry.document_id;
        let action = entry.action.clone();
        if let Err(e) = self.orders.store().append_log(entry).await {
            tracing::error!(
                order_id = %order_id,
                action = %action,
                error = %e,
                "Failed to append order log"
            );
        }
    }

    fn as_requester(principal: &Principal) -> Requester {
        Requester::Authenticated(principal.clone())
    }
}
