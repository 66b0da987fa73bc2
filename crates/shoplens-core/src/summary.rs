use std::collections::HashSet;

use polars::prelude::*;
use tracing::info;

use crate::error::Result;
use crate::events::{EventTable, BRAND, CATEGORY_CODE, MAIN_CATEGORY, PRODUCT_ID, PURCHASE, VIEW};
use crate::types::Summary;

/// Headline scalars. Null ids, brands and category codes are not counted as
/// distinct values; the category count also skips empty first segments.
pub fn summarize(events: &EventTable) -> Result<Summary> {
    let df = events.dataframe();

    let total_products = distinct_non_null(df, PRODUCT_ID)?;
    let total_brands = distinct_non_null(df, BRAND)?;
    let total_subcategories = distinct_non_null(df, CATEGORY_CODE)?;

    let total_categories = df
        .column(MAIN_CATEGORY)?
        .str()?
        .into_iter()
        .flatten()
        .filter(|category| !category.is_empty())
        .collect::<HashSet<_>>()
        .len();

    let total_views = df.column(VIEW)?.i64()?.sum().unwrap_or(0);
    let total_purchases = df.column(PURCHASE)?.i64()?.sum().unwrap_or(0);

    let summary = Summary {
        total_products,
        total_views,
        total_purchases,
        total_brands,
        total_categories,
        total_subcategories,
    };
    info!(?summary, "computed summary scalars");

    Ok(summary)
}

fn distinct_non_null(df: &DataFrame, column: &str) -> Result<usize> {
    let series = df.column(column)?.as_materialized_series().drop_nulls();
    Ok(series.n_unique()?)
}
