//! Loads the orders a report covers and runs the report over them.

use chrono::{DateTime, Utc};
use document_store::DocumentStore;
use domain::{Order, Repository};
use serde::Deserialize;

use crate::error::{AnalyticsError, Result};
use crate::reports::{
    self, CustomerSummary, DailyRevenue, ProductSales, SalesSummary, StatusCount,
};

/// Default number of rows in ranked reports.
pub const DEFAULT_REPORT_LIMIT: usize = 10;

/// Upper bound on rows in ranked reports.
pub const MAX_REPORT_LIMIT: usize = 100;

/// Optional bounds on order creation time, both inclusive.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ReportRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl ReportRange {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    fn validate(&self) -> Result<()> {
        if let (Some(from), Some(to)) = (self.from, self.to)
            && from > to
        {
            return Err(AnalyticsError::InvalidRange { from, to });
        }
        Ok(())
    }
}

/// Read-only reports over the orders collection.
pub struct AnalyticsService<S: DocumentStore> {
    orders: Repository<S, Order>,
}

impl<S: DocumentStore> AnalyticsService<S> {
    pub fn new(store: S) -> Self {
        Self {
            orders: Repository::new(store),
        }
    }

    /// Order count, revenue and payment figures.
    #[tracing::instrument(skip(self))]
    pub async fn summary(&self, range: ReportRange) -> Result<SalesSummary> {
        let orders = self.load(range, "summary").await?;
        Ok(reports::sales_summary(&orders))
    }

    /// Orders per status.
    #[tracing::instrument(skip(self))]
    pub async fn status_breakdown(&self, range: ReportRange) -> Result<Vec<StatusCount>> {
        let orders = self.load(range, "status").await?;
        Ok(reports::status_breakdown(&orders))
    }

    /// Best selling products.
    #[tracing::instrument(skip(self))]
    pub async fn top_products(
        &self,
        range: ReportRange,
        limit: Option<usize>,
    ) -> Result<Vec<ProductSales>> {
        let orders = self.load(range, "top_products").await?;
        Ok(reports::top_products(&orders, clamp_limit(limit)))
    }

    /// Customers ranked by spend.
    #[tracing::instrument(skip(self))]
    pub async fn customers(
        &self,
        range: ReportRange,
        limit: Option<usize>,
    ) -> Result<Vec<CustomerSummary>> {
        let orders = self.load(range, "customers").await?;
        Ok(reports::customer_summaries(&orders, clamp_limit(limit)))
    }

    /// Revenue per day.
    #[tracing::instrument(skip(self))]
    pub async fn daily_revenue(&self, range: ReportRange) -> Result<Vec<DailyRevenue>> {
        let orders = self.load(range, "daily").await?;
        Ok(reports::daily_revenue(&orders))
    }

    async fn load(&self, range: ReportRange, report: &'static str) -> Result<Vec<Order>> {
        range.validate()?;

        let mut query = self.orders.query().field("isDeleted", false);
        if let Some(from) = range.from {
            query = query.created_from(from);
        }
        if let Some(to) = range.to {
            query = query.created_to(to);
        }

        let orders = self.orders.find(query).await?;
        metrics::counter!("analytics_reports_total", "report" => report).increment(1);
        tracing::debug!(report, orders = orders.len(), "Report input loaded");
        Ok(orders)
    }
}

fn clamp_limit(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(DEFAULT_REPORT_LIMIT)
        .clamp(1, MAX_REPORT_LIMIT)
}
