//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::AggregateId;
use document_store::Version;
use serde::{Deserialize, Serialize};

use crate::access::Ownership;
use crate::aggregate::Aggregate;
use crate::value_objects::{
    Money, PaymentDetails, PaymentMethod, ProductId, ShippingAddress, VariantSelection,
};

use super::{OrderError, OrderStatus, PaymentStatus, PlaceOrder};

/// A line item snapshot, frozen when the order is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    /// Unit price at the time of purchase.
    pub price: Money,
    pub image: Option<String>,
    pub variant: Option<VariantSelection>,
}

impl OrderItem {
    /// Returns the total price for this line (price * quantity).
    pub fn line_total(&self) -> Money {
        self.price.multiply(self.quantity)
    }
}

/// Order aggregate root.
///
/// Represents an order from placement to delivery or cancellation. Items and
/// amounts are fixed at creation; afterwards only the status and the
/// payment/delivery flags change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: AggregateId,

    #[serde(skip)]
    version: Version,

    #[serde(flatten)]
    ownership: Ownership,

    order_items: Vec<OrderItem>,
    shipping_address: ShippingAddress,
    payment_method: PaymentMethod,
    payment_details: PaymentDetails,
    payment_status: PaymentStatus,
    status: OrderStatus,

    items_price: Money,
    shipping_price: Money,
    total_amount: Money,

    is_paid: bool,
    paid_at: Option<DateTime<Utc>>,
    is_delivered: bool,
    delivered_at: Option<DateTime<Utc>>,
    is_cancelled: bool,
    cancelled_at: Option<DateTime<Utc>>,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,

    source_cart: Option<AggregateId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Aggregate for Order {
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn collection() -> &'static str {
        "orders"
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
}

// Query methods
impl Order {
    pub fn ownership(&self) -> &Ownership {
        &self.ownership
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.order_items
    }

    pub fn item_count(&self) -> usize {
        self.order_items.len()
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn payment_details(&self) -> &PaymentDetails {
        &self.payment_details
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn items_price(&self) -> Money {
        self.items_price
    }

    pub fn shipping_price(&self) -> Money {
        self.shipping_price
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn is_paid(&self) -> bool {
        self.is_paid
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn is_delivered(&self) -> bool {
        self.is_delivered
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn is_cancelled(&self) -> bool {
        self.is_cancelled
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    pub fn source_cart(&self) -> Option<AggregateId> {
        self.source_cart
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// Command methods
impl Order {
    /// Validates and builds a new order.
    ///
    /// Cash orders start unpaid; every other method is treated as paid at
    /// creation. All orders start in `processing`.
    pub fn place(
        id: AggregateId,
        cmd: PlaceOrder,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if cmd.items.is_empty() {
            return Err(OrderError::NoItems);
        }
        for item in &cmd.items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidItem {
                    product_id: item.product_id,
                    reason: "quantity must be greater than 0",
                });
            }
            if !item.price.is_positive() {
                return Err(OrderError::InvalidItem {
                    product_id: item.product_id,
                    reason: "price must be greater than 0",
                });
            }
        }
        if let Some(field) = cmd.shipping_address.missing_field() {
            return Err(OrderError::InvalidShippingAddress(field));
        }

        let items_price = cmd
            .items
            .iter()
            .try_fold(Money::zero(), |sum, item| {
                item.price
                    .checked_multiply(item.quantity)
                    .and_then(|line| sum.checked_add(line))
            })
            .ok_or(OrderError::AmountOutOfRange)?;
        let total_amount = items_price
            .checked_add(cmd.shipping_cost)
            .ok_or(OrderError::AmountOutOfRange)?;
        let paid = !cmd.payment_method.is_cash();

        Ok(Self {
            id,
            version: Version::initial(),
            ownership: cmd.ownership,
            order_items: cmd.items,
            shipping_address: cmd.shipping_address,
            payment_method: cmd.payment_method,
            payment_details: cmd.payment_details,
            payment_status: if paid {
                PaymentStatus::Paid
            } else {
                PaymentStatus::Pending
            },
            status: OrderStatus::Processing,
            items_price,
            shipping_price: cmd.shipping_cost,
            total_amount,
            is_paid: paid,
            paid_at: paid.then_some(now),
            is_delivered: false,
            delivered_at: None,
            is_cancelled: false,
            cancelled_at: None,
            is_deleted: false,
            deleted_at: None,
            source_cart: cmd.source_cart,
            created_at: now,
            updated_at: now,
        })
    }

    /// Moves the order to `target`, returning the previous status.
    pub fn update_status(
        &mut self,
        target: &str,
        now: DateTime<Utc>,
    ) -> Result<OrderStatus, OrderError> {
        let target: OrderStatus = target.parse().map_err(OrderError::InvalidStatus)?;
        self.ensure_not_deleted()?;

        if target == self.status {
            return Err(OrderError::NoOpTransition(target));
        }
        match self.status {
            OrderStatus::Delivered => return Err(OrderError::AlreadyDelivered),
            OrderStatus::Cancelled => return Err(OrderError::AlreadyCancelled),
            _ => {}
        }
        if target == OrderStatus::Cancelled {
            if !self.status.can_cancel() {
                return Err(OrderError::CannotCancel(self.status));
            }
        } else if target.rank() < self.status.rank() {
            return Err(OrderError::BackwardTransition {
                from: self.status,
                to: target,
            });
        }

        let previous = self.status;
        self.enter(target, now);
        Ok(previous)
    }

    /// Cancellation requested by the customer who owns the order.
    pub fn cancel_by_customer(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.ensure_not_deleted()?;

        if self.is_cancelled {
            return Err(OrderError::AlreadyCancelled);
        }
        if self.is_delivered {
            return Err(OrderError::AlreadyDelivered);
        }
        if self.status == OrderStatus::Shipped && self.is_paid {
            return Err(OrderError::RequiresAdmin);
        }
        if !self.status.can_cancel() {
            return Err(OrderError::CannotCancel(self.status));
        }

        self.enter(OrderStatus::Cancelled, now);
        Ok(())
    }

    /// Records payment. Also marks the order delivered.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.ensure_not_deleted()?;

        if self.is_cancelled {
            return Err(OrderError::AlreadyCancelled);
        }
        if self.is_paid {
            return Err(OrderError::AlreadyPaid);
        }

        self.settle_payment(now);
        self.enter(OrderStatus::Delivered, now);
        Ok(())
    }

    /// Records delivery, settling cash payment.
    pub fn mark_delivered(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.ensure_not_deleted()?;

        if self.is_cancelled {
            return Err(OrderError::AlreadyCancelled);
        }
        if self.is_delivered {
            return Err(OrderError::AlreadyDelivered);
        }

        self.enter(OrderStatus::Delivered, now);
        Ok(())
    }

    /// Administrative cancellation; allowed at any point before delivery.
    pub fn mark_cancelled(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.ensure_not_deleted()?;

        if self.is_delivered {
            return Err(OrderError::AlreadyDelivered);
        }
        if self.is_cancelled {
            return Err(OrderError::AlreadyCancelled);
        }

        self.enter(OrderStatus::Cancelled, now);
        Ok(())
    }

    /// Hides the order from customers. The document is kept.
    pub fn soft_delete(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        if self.is_deleted {
            return Err(OrderError::AlreadyDeleted);
        }

        self.is_deleted = true;
        self.deleted_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    fn ensure_not_deleted(&self) -> Result<(), OrderError> {
        if self.is_deleted {
            Err(OrderError::Deleted)
        } else {
            Ok(())
        }
    }

    fn enter(&mut self, status: OrderStatus, now: DateTime<Utc>) {
        self.status = status;
        match status {
            OrderStatus::Delivered => {
                self.is_delivered = true;
                self.delivered_at = Some(now);
                // Cash on delivery is settled by the delivery itself.
                if self.payment_method.is_cash() && !self.is_paid {
                    self.settle_payment(now);
                }
            }
            OrderStatus::Cancelled => {
                self.is_cancelled = true;
                self.cancelled_at = Some(now);
            }
            _ => {}
        }
        self.updated_at = now;
    }

    fn settle_payment(&mut self, now: DateTime<Utc>) {
        self.is_paid = true;
        self.payment_status = PaymentStatus::Paid;
        self.paid_at = Some(now);
    }
}
