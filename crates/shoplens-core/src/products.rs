use polars::prelude::*;
use tracing::debug;

use crate::error::Result;
use crate::events::{EventTable, PRODUCT_ID, PURCHASE, VIEW};
use crate::types::ProductStats;

pub const DEFAULT_AT_RISK_THRESHOLD: f64 = 10.0;

const TOTAL_VIEWS: &str = "total_views";
const TOTAL_PURCHASES: &str = "total_purchases";
const RATIO: &str = "view_to_purchase_ratio";

/// Per-product view and purchase totals, ordered by product id.
///
/// `view_to_purchase_ratio` is `total_views / (total_purchases + 1)`, so it is
/// finite for products that were never bought.
pub fn product_stats(events: &EventTable) -> Result<Vec<ProductStats>> {
    let out = events
        .dataframe()
        .clone()
        .lazy()
        .filter(col(PRODUCT_ID).is_not_null())
        .group_by([col(PRODUCT_ID)])
        .agg([
            col(VIEW).sum().alias(TOTAL_VIEWS),
            col(PURCHASE).sum().alias(TOTAL_PURCHASES),
        ])
        .with_column(
            (col(TOTAL_VIEWS).cast(DataType::Float64)
                / (col(TOTAL_PURCHASES).cast(DataType::Float64) + lit(1.0)))
            .alias(RATIO),
        )
        .sort([PRODUCT_ID], SortMultipleOptions::default())
        .collect()?;

    let ids = out.column(PRODUCT_ID)?.i64()?;
    let views = out.column(TOTAL_VIEWS)?.i64()?;
    let purchases = out.column(TOTAL_PURCHASES)?.i64()?;
    let ratios = out.column(RATIO)?.f64()?;

    let mut stats = Vec::with_capacity(out.height());
    for idx in 0..out.height() {
        let Some(product_id) = ids.get(idx) else {
            continue;
        };
        let total_views = views.get(idx).unwrap_or(0);
        let total_purchases = purchases.get(idx).unwrap_or(0);
        let view_to_purchase_ratio = ratios
            .get(idx)
            .unwrap_or_else(|| total_views as f64 / (total_purchases as f64 + 1.0));

        stats.push(ProductStats {
            product_id,
            total_views,
            total_purchases,
            view_to_purchase_ratio,
        });
    }

    debug!(products = stats.len(), "computed product stats");
    Ok(stats)
}

/// Products whose ratio is strictly above `threshold`: they draw attention but
/// rarely convert.
pub fn at_risk_products(stats: &[ProductStats], threshold: f64) -> Vec<ProductStats> {
    stats
        .iter()
        .filter(|product| product.view_to_purchase_ratio > threshold)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(product_id: i64, views: i64, purchases: i64) -> ProductStats {
        ProductStats {
            product_id,
            total_views: views,
            total_purchases: purchases,
            view_to_purchase_ratio: views as f64 / (purchases as f64 + 1.0),
        }
    }

    #[test]
    fn threshold_is_exclusive() {
        let stats = vec![stat(1, 11, 0), stat(2, 10, 0), stat(3, 9, 0)];
        let flagged = at_risk_products(&stats, DEFAULT_AT_RISK_THRESHOLD);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].product_id, 1);
    }

    #[test]
    fn raising_threshold_never_grows_result() {
        let stats: Vec<ProductStats> = (0..40).map(|i| stat(i, i * 3, i % 4)).collect();
        let mut previous = usize::MAX;
        for threshold in [0.0, 1.0, 5.0, 10.0, 20.0, 50.0, 200.0] {
            let size = at_risk_products(&stats, threshold).len();
            assert!(size <= previous);
            previous = size;
        }
    }
}
