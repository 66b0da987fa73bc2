use std::collections::HashSet;

use chrono::NaiveDateTime;
use polars::prelude::*;
use tracing::debug;

use crate::error::Result;
use crate::events::{EventTable, BRAND, CATEGORY_CODE, EVENT_TIME, MAIN_CATEGORY, PRICE, PURCHASE};
use crate::types::{BreakdownRow, DateRange, Metric};

/// Category/brand/price table for an inclusive `event_time` window.
///
/// Fails with `InvalidRange` when `start > end`. `None` and an empty slice both
/// disable the main-category filter.
pub fn filtered_breakdown(
    events: &EventTable,
    start: NaiveDateTime,
    end: NaiveDateTime,
    categories: Option<&[String]>,
    metric: Metric,
) -> Result<Vec<BreakdownRow>> {
    let range = DateRange::new(start, end)?;
    breakdown_in_range(events, &range, categories.unwrap_or_default(), metric)
}

/// Same as [`filtered_breakdown`] with an already validated window.
///
/// For [`Metric::Purchase`] each category code is first reduced to a 0/1 flag
/// (any purchase inside the window), and every (category, brand, price) row
/// reports its category's flag. For [`Metric::View`] rows carry raw view sums.
/// Rows with a null category code, brand or price are dropped. Output is sorted
/// by value descending, then by category, brand and price ascending.
pub fn breakdown_in_range(
    events: &EventTable,
    range: &DateRange,
    categories: &[String],
    metric: Metric,
) -> Result<Vec<BreakdownRow>> {
    let df = events.dataframe();
    let mask = window_mask(df, range, categories)?;
    let filtered = df.filter(&mask)?;
    debug!(
        matched = filtered.height(),
        total = df.height(),
        "filtered events for breakdown"
    );

    let value = metric.column();
    let keys = [col(CATEGORY_CODE), col(BRAND), col(PRICE)];
    let base = filtered.lazy();
    let keyed = base.clone().filter(
        col(CATEGORY_CODE)
            .is_not_null()
            .and(col(BRAND).is_not_null())
            .and(col(PRICE).is_not_null()),
    );

    let grouped = match metric {
        Metric::View => keyed
            .group_by(keys.clone())
            .agg([col(value).sum().alias(value)]),
        Metric::Purchase => {
            let category_flags = base
                .filter(col(CATEGORY_CODE).is_not_null())
                .group_by([col(CATEGORY_CODE)])
                .agg([col(PURCHASE)
                    .sum()
                    .gt(lit(0))
                    .cast(DataType::Int64)
                    .alias(PURCHASE)]);

            keyed
                .select(keys.clone())
                .join(
                    category_flags,
                    [col(CATEGORY_CODE)],
                    [col(CATEGORY_CODE)],
                    JoinArgs::new(JoinType::Left),
                )
                .group_by(keys.clone())
                .agg([col(PURCHASE).max().alias(PURCHASE)])
        }
    };

    let out = grouped
        .sort(
            [value, CATEGORY_CODE, BRAND, PRICE],
            SortMultipleOptions::default().with_order_descending_multi([true, false, false, false]),
        )
        .collect()?;

    let codes = out.column(CATEGORY_CODE)?.str()?;
    let brands = out.column(BRAND)?.str()?;
    let prices = out.column(PRICE)?.f64()?;
    let values = out.column(value)?.i64()?;

    let mut rows = Vec::with_capacity(out.height());
    for idx in 0..out.height() {
        let (Some(category_code), Some(brand), Some(price)) =
            (codes.get(idx), brands.get(idx), prices.get(idx))
        else {
            continue;
        };
        rows.push(BreakdownRow {
            category_code: category_code.to_string(),
            brand: brand.to_string(),
            price,
            value: values.get(idx).unwrap_or(0),
        });
    }

    debug!(%metric, rows = rows.len(), "computed filtered breakdown");
    Ok(rows)
}

fn window_mask(df: &DataFrame, range: &DateRange, categories: &[String]) -> Result<BooleanChunked> {
    let times = df.column(EVENT_TIME)?.datetime()?;
    let main_categories = df.column(MAIN_CATEGORY)?.str()?;
    let start = range.start().and_utc().timestamp_micros();
    let end = range.end().and_utc().timestamp_micros();
    let selected: HashSet<&str> = categories.iter().map(String::as_str).collect();

    let mut mask = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let in_window = times
            .get(idx)
            .is_some_and(|ts| start <= ts && ts <= end);
        let in_categories = selected.is_empty()
            || main_categories
                .get(idx)
                .is_some_and(|category| selected.contains(category));
        mask.push(in_window && in_categories);
    }

    Ok(BooleanChunked::from_slice("window".into(), &mask))
}
