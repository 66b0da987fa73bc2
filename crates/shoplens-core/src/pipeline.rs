use std::path::Path;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::info;

use crate::{
    aggregations, breakdown,
    config::PipelineConfig,
    error::Result,
    events::EventTable,
    frequency, products, summary,
    types::{
        BreakdownRow, CategoryTotal, DailyPurchases, DateRange, Metric, MonthlyTotal,
        ProductStats, Summary,
    },
};

/// An event snapshot bundled with the settings its views are computed under.
///
/// Every method only reads the snapshot, so one pipeline can serve any number
/// of callers and repeated filter changes.
#[derive(Debug, Clone)]
pub struct MetricsPipeline {
    events: EventTable,
    config: PipelineConfig,
}

/// Every view of the dashboard's initial render.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub summary: Summary,
    pub time_bounds: Option<(NaiveDateTime, NaiveDateTime)>,
    pub main_categories: Vec<String>,
    pub monthly_totals: Vec<MonthlyTotal>,
    pub top_categories_by_purchase: Vec<CategoryTotal>,
    pub top_categories_by_view: Vec<CategoryTotal>,
    pub daily_purchases: Vec<DailyPurchases>,
    pub frequency_user_id: i64,
    pub user_purchase_frequency: Vec<DailyPurchases>,
    pub at_risk_threshold: f64,
    pub at_risk_products: Vec<ProductStats>,
}

impl MetricsPipeline {
    pub fn new(events: EventTable, config: PipelineConfig) -> Self {
        Self { events, config }
    }

    pub fn load(path: impl AsRef<Path>, config: PipelineConfig) -> Result<Self> {
        Ok(Self::new(EventTable::load(path)?, config))
    }

    pub fn events(&self) -> &EventTable {
        &self.events
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn summarize(&self) -> Result<Summary> {
        summary::summarize(&self.events)
    }

    pub fn monthly_totals(&self) -> Result<Vec<MonthlyTotal>> {
        aggregations::monthly_totals(&self.events)
    }

    pub fn product_stats(&self) -> Result<Vec<ProductStats>> {
        products::product_stats(&self.events)
    }

    /// At-risk products under the configured threshold.
    pub fn at_risk_products(&self) -> Result<Vec<ProductStats>> {
        let stats = self.product_stats()?;
        Ok(products::at_risk_products(&stats, self.config.at_risk_threshold))
    }

    /// Top categories, `k` taken from the config.
    pub fn top_categories(&self, metric: Metric) -> Result<Vec<CategoryTotal>> {
        aggregations::top_categories(&self.events, metric, self.config.top_categories)
    }

    pub fn daily_purchases(&self) -> Result<Vec<DailyPurchases>> {
        aggregations::daily_purchases(&self.events)
    }

    pub fn user_purchase_frequency(&self, user_id: i64) -> Result<Vec<DailyPurchases>> {
        frequency::user_purchase_frequency(&self.events, user_id)
    }

    pub fn filtered_breakdown(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        categories: Option<&[String]>,
        metric: Metric,
    ) -> Result<Vec<BreakdownRow>> {
        breakdown::filtered_breakdown(&self.events, start, end, categories, metric)
    }

    pub fn breakdown_in_range(
        &self,
        range: &DateRange,
        categories: &[String],
        metric: Metric,
    ) -> Result<Vec<BreakdownRow>> {
        breakdown::breakdown_in_range(&self.events, range, categories, metric)
    }

    pub fn report(&self) -> Result<Report> {
        let report = Report {
            summary: self.summarize()?,
            time_bounds: self.events.time_bounds()?,
            main_categories: self.events.main_categories()?,
            monthly_totals: self.monthly_totals()?,
            top_categories_by_purchase: self.top_categories(Metric::Purchase)?,
            top_categories_by_view: self.top_categories(Metric::View)?,
            daily_purchases: self.daily_purchases()?,
            frequency_user_id: self.config.frequency_user_id,
            user_purchase_frequency: self.user_purchase_frequency(self.config.frequency_user_id)?,
            at_risk_threshold: self.config.at_risk_threshold,
            at_risk_products: self.at_risk_products()?,
        };

        info!(
            months = report.monthly_totals.len(),
            at_risk = report.at_risk_products.len(),
            "built report"
        );
        Ok(report)
    }
}
