use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::events::{PURCHASE, VIEW};

/// Interaction counter an aggregate is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    View,
    Purchase,
}

impl Metric {
    pub fn column(&self) -> &'static str {
        match self {
            Metric::View => VIEW,
            Metric::Purchase => PURCHASE,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Metric {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "view" | "views" => Ok(Metric::View),
            "purchase" | "purchases" => Ok(Metric::Purchase),
            other => Err(PipelineError::UnknownMetric(other.to_string())),
        }
    }
}

/// Inclusive `event_time` window used by the filtered breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl DateRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start > end {
            return Err(PipelineError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Whole-day window: midnight of `start` through the last microsecond of `end`.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        let start = start.and_time(NaiveTime::MIN);
        let end = end.and_time(NaiveTime::MIN) + TimeDelta::days(1) - TimeDelta::microseconds(1);
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start <= ts && ts <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Summary {
    pub total_products: usize,
    pub total_views: i64,
    pub total_purchases: i64,
    pub total_brands: usize,
    pub total_categories: usize,
    pub total_subcategories: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyTotal {
    pub year_month: String,
    pub views: i64,
    pub purchases: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductStats {
    pub product_id: i64,
    pub total_views: i64,
    pub total_purchases: i64,
    pub view_to_purchase_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTotal {
    pub category_code: String,
    pub value: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyPurchases {
    pub day: NaiveDate,
    pub purchases: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownRow {
    pub category_code: String,
    pub brand: String,
    pub price: f64,
    pub value: i64,
}
