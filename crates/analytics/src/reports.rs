//! Report builders.
//!
//! Each function folds a slice of orders into one report. Callers decide
//! which orders are in scope; nothing here touches the store.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use common::UserId;
use domain::{Money, Order, OrderStatus, ProductId};
use serde::Serialize;

/// Headline sales figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub order_count: u64,
    /// Total of all orders that were not cancelled.
    pub revenue: Money,
    pub average_order_value: Money,
    pub items_sold: u64,
    pub paid_orders: u64,
    pub cancelled_orders: u64,
}

/// Number of orders and their value in one status.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: u64,
    pub total_amount: Money,
}

/// Units and revenue for one product.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSales {
    pub product_id: ProductId,
    pub name: String,
    pub units_sold: u64,
    pub revenue: Money,
}

/// Spending of one customer, registered or guest.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    pub user: Option<UserId>,
    pub guest_email: Option<String>,
    pub order_count: u64,
    pub total_spent: Money,
    pub last_order_at: DateTime<Utc>,
}

/// Revenue booked on one calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub order_count: u64,
    pub revenue: Money,
}

/// Builds the headline summary.
pub fn sales_summary(orders: &[Order]) -> SalesSummary {
    let mut summary = SalesSummary {
        order_count: orders.len() as u64,
        revenue: Money::zero(),
        average_order_value: Money::zero(),
        items_sold: 0,
        paid_orders: 0,
        cancelled_orders: 0,
    };

    let mut billable = 0u64;
    for order in orders {
        if order.is_paid() {
            summary.paid_orders += 1;
        }
        if order.is_cancelled() {
            summary.cancelled_orders += 1;
            continue;
        }
        billable += 1;
        summary.revenue += order.total_amount();
        summary.items_sold += order
            .items()
            .iter()
            .map(|item| u64::from(item.quantity))
            .sum::<u64>();
    }

    if billable > 0 {
        summary.average_order_value =
            Money::from_cents((summary.revenue.cents() as f64 / billable as f64).round() as i64);
    }
    summary
}

/// Counts orders per status; every status is listed, in lifecycle order.
pub fn status_breakdown(orders: &[Order]) -> Vec<StatusCount> {
    OrderStatus::ALL
        .into_iter()
        .map(|status| {
            let matching = orders.iter().filter(|o| o.status() == status);
            let (count, total_amount) = matching.fold((0u64, Money::zero()), |(n, sum), o| {
                (n + 1, sum + o.total_amount())
            });
            StatusCount {
                status,
                count,
                total_amount,
            }
        })
        .collect()
}

/// Best selling products by units, then revenue. Cancelled orders are skipped.
pub fn top_products(orders: &[Order], limit: usize) -> Vec<ProductSales> {
    let mut by_product: HashMap<ProductId, ProductSales> = HashMap::new();

    for order in orders.iter().filter(|o| !o.is_cancelled()) {
        for item in order.items() {
            let entry = by_product
                .entry(item.product_id)
                .or_insert_with(|| ProductSales {
                    product_id: item.product_id,
                    name: item.name.clone(),
                    units_sold: 0,
                    revenue: Money::zero(),
                });
            entry.units_sold += u64::from(item.quantity);
            entry.revenue += item.line_total();
        }
    }

    let mut products: Vec<_> = by_product.into_values().collect();
    products.sort_by(|a, b| {
        b.units_sold
            .cmp(&a.units_sold)
            .then(b.revenue.cmp(&a.revenue))
            .then(a.product_id.cmp(&b.product_id))
    });
    products.truncate(limit);
    products
}

/// Customers ordered by total spent. Guests are keyed by email.
pub fn customer_summaries(orders: &[Order], limit: usize) -> Vec<CustomerSummary> {
    let mut by_customer: HashMap<(Option<UserId>, Option<String>), CustomerSummary> =
        HashMap::new();

    for order in orders {
        let ownership = order.ownership();
        let key = (ownership.user, ownership.guest_email.clone());
        let entry = by_customer.entry(key).or_insert_with(|| CustomerSummary {
            user: ownership.user,
            guest_email: ownership.guest_email.clone(),
            order_count: 0,
            total_spent: Money::zero(),
            last_order_at: order.created_at(),
        });

        entry.order_count += 1;
        if !order.is_cancelled() {
            entry.total_spent += order.total_amount();
        }
        entry.last_order_at = entry.last_order_at.max(order.created_at());
    }

    let mut customers: Vec<_> = by_customer.into_values().collect();
    customers.sort_by(|a, b| {
        b.total_spent
            .cmp(&a.total_spent)
            .then(b.order_count.cmp(&a.order_count))
            .then(b.last_order_at.cmp(&a.last_order_at))
    });
    customers.truncate(limit);
    customers
}

/// Revenue per day, oldest first. Days without orders are omitted.
pub fn daily_revenue(orders: &[Order]) -> Vec<DailyRevenue> {
    let mut by_day: BTreeMap<NaiveDate, DailyRevenue> = BTreeMap::new();

    for order in orders.iter().filter(|o| !o.is_cancelled()) {
        let date = order.created_at().date_naive();
        let entry = by_day.entry(date).or_insert(DailyRevenue {
            date,
            order_count: 0,
            revenue: Money::zero(),
        });
        entry.order_count += 1;
        entry.revenue += order.total_amount();
    }

    by_day.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::AggregateId;
    use domain::order::PlaceOrder;
    use domain::{
        OrderItem, Ownership, PaymentDetails, PaymentMethod, Principal, Requester, Role,
        ShippingAddress,
    };

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

    fn order(
        requester: &Requester,
        method: PaymentMethod,
        lines: &[(ProductId, i64, u32)],
        at: DateTime<Utc>,
    ) -> Order {
        Order::place(
            AggregateId::new(),
            PlaceOrder {
                ownership: Ownership::for_requester(requester, None),
                items: lines
                    .iter()
                    .map(|(product_id, cents, quantity)| OrderItem {
                        product_id: *product_id,
                        name: format!("Product {cents}"),
                        quantity: *quantity,
                        price: Money::from_cents(*cents),
                        image: None,
                        variant: None,
                    })
                    .collect(),
                shipping_address: address(),
                payment_method: method,
                payment_details: PaymentDetails::complete(None, requester.email(), at),
                shipping_cost: Money::zero(),
                source_cart: None,
            },
            at,
        )
        .unwrap()
    }

    struct Sample {
        orders: Vec<Order>,
        widget: ProductId,
        gadget: ProductId,
        user: UserId,
    }

    fn sample() -> Sample {
        let widget = ProductId::new();
        let gadget = ProductId::new();
        let user = UserId::new();
        let customer = Requester::Authenticated(Principal::new(user, Role::Customer));
        let guest = Requester::guest("a@b.com").unwrap();
        let day1 = Utc::now() - Duration::days(2);
        let day2 = Utc::now();

        let mut cancelled = order(&guest, PaymentMethod::Cash, &[(gadget, 9900, 5)], day2);
        cancelled.mark_cancelled(day2).unwrap();

        let mut delivered = order(&guest, PaymentMethod::Cash, &[(widget, 1000, 1)], day2);
        delivered.mark_delivered(day2).unwrap();

        Sample {
            orders: vec![
                order(&customer, PaymentMethod::Card, &[(widget, 1000, 2)], day1),
                order(
                    &customer,
                    PaymentMethod::Card,
                    &[(widget, 1000, 1), (gadget, 500, 1)],
                    day2,
                ),
                delivered,
                cancelled,
            ],
            widget,
            gadget,
            user,
        }
    }

    #[test]
    fn test_sales_summary_excludes_cancelled_revenue() {
        let sample = sample();
        let summary = sales_summary(&sample.orders);

        assert_eq!(summary.order_count, 4);
        assert_eq!(summary.revenue, Money::from_cents(2000 + 1500 + 1000));
        assert_eq!(summary.average_order_value, Money::from_cents(1500));
        assert_eq!(summary.items_sold, 5);
        assert_eq!(summary.paid_orders, 3);
        assert_eq!(summary.cancelled_orders, 1);
    }

    #[test]
    fn test_sales_summary_of_nothing() {
        let summary = sales_summary(&[]);
        assert_eq!(summary.order_count, 0);
        assert_eq!(summary.average_order_value, Money::zero());
    }

    #[test]
    fn test_status_breakdown_lists_every_status() {
        let sample = sample();
        let breakdown = status_breakdown(&sample.orders);

        assert_eq!(breakdown.len(), 5);
        assert_eq!(breakdown[0].status, OrderStatus::Processing);
        assert_eq!(breakdown[0].count, 2);
        assert_eq!(breakdown[1].count, 0);
        assert_eq!(breakdown[3].status, OrderStatus::Delivered);
        assert_eq!(breakdown[3].count, 1);
        assert_eq!(breakdown[4].count, 1);
        assert_eq!(breakdown[4].total_amount, Money::from_cents(49500));
    }

    #[test]
    fn test_top_products_by_units() {
        let sample = sample();
        let top = top_products(&sample.orders, 10);

        assert_eq!(top.len(), 2);
        assert_eq!(top[0].product_id, sample.widget);
        assert_eq!(top[0].units_sold, 4);
        assert_eq!(top[0].revenue, Money::from_cents(4000));
        assert_eq!(top[1].product_id, sample.gadget);
        assert_eq!(top[1].units_sold, 1);

        assert_eq!(top_products(&sample.orders, 1).len(), 1);
    }

    #[test]
    fn test_customer_summaries_separate_users_and_guests() {
        let sample = sample();
        let customers = customer_summaries(&sample.orders, 10);

        assert_eq!(customers.len(), 2);
        assert_eq!(customers[0].user, Some(sample.user));
        assert_eq!(customers[0].order_count, 2);
        assert_eq!(customers[0].total_spent, Money::from_cents(3500));
        assert_eq!(customers[1].guest_email.as_deref(), Some("a@b.com"));
        assert_eq!(customers[1].order_count, 2);
        assert_eq!(customers[1].total_spent, Money::from_cents(1000));
    }

    #[test]
    fn test_daily_revenue_groups_by_day() {
        let sample = sample();
        let days = daily_revenue(&sample.orders);

        assert_eq!(days.len(), 2);
        assert!(days[0].date < days[1].date);
        assert_eq!(days[0].revenue, Money::from_cents(2000));
        assert_eq!(days[1].order_count, 2);
        assert_eq!(days[1].revenue, Money::from_cents(2500));
    }
}
