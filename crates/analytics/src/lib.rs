//! Read-only reporting over orders.
//!
//! This crate provides sales reports computed from the orders collection:
//! - [`reports`] holds the pure functions that fold a set of orders into a report
//! - [`AnalyticsService`] loads the orders in a date range and runs them
//!
//! Soft-deleted orders never count; cancelled orders count in the status
//! breakdown but not in revenue.

pub mod error;
pub mod reports;
pub mod service;

pub use error::{AnalyticsError, Result};
pub use reports::{
    CustomerSummary, DailyRevenue, ProductSales, SalesSummary, StatusCount, customer_summaries,
    daily_revenue, sales_summary, status_breakdown, top_products,
};
pub use service::{AnalyticsService, ReportRange};
