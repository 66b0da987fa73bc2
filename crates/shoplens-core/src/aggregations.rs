use polars::prelude::*;
use tracing::debug;

use crate::error::Result;
use crate::events::{date_from_epoch_days, EventTable, CATEGORY_CODE, DAY, PURCHASE, VIEW, YEAR_MONTH};
use crate::types::{CategoryTotal, DailyPurchases, Metric, MonthlyTotal};

/// View and purchase sums per `year_month`, oldest month first.
pub fn monthly_totals(events: &EventTable) -> Result<Vec<MonthlyTotal>> {
    let out = events
        .dataframe()
        .clone()
        .lazy()
        .group_by([col(YEAR_MONTH)])
        .agg([col(VIEW).sum().alias(VIEW), col(PURCHASE).sum().alias(PURCHASE)])
        .sort([YEAR_MONTH], SortMultipleOptions::default())
        .collect()?;

    let months = out.column(YEAR_MONTH)?.str()?;
    let views = out.column(VIEW)?.i64()?;
    let purchases = out.column(PURCHASE)?.i64()?;

    let rows: Vec<MonthlyTotal> = months
        .into_iter()
        .zip(views)
        .zip(purchases)
        .filter_map(|((month, views), purchases)| {
            Some(MonthlyTotal {
                year_month: month?.to_string(),
                views: views.unwrap_or(0),
                purchases: purchases.unwrap_or(0),
            })
        })
        .collect();

    debug!(months = rows.len(), "computed monthly totals");
    Ok(rows)
}

/// The `k` category codes with the largest sum of `metric`. Equal sums are
/// ordered by category code so the cut at `k` is reproducible; events without
/// a category code are ignored.
pub fn top_categories(events: &EventTable, metric: Metric, k: usize) -> Result<Vec<CategoryTotal>> {
    if k == 0 {
        return Ok(Vec::new());
    }

    let value = metric.column();
    let out = events
        .dataframe()
        .clone()
        .lazy()
        .filter(col(CATEGORY_CODE).is_not_null())
        .group_by([col(CATEGORY_CODE)])
        .agg([col(value).sum().alias(value)])
        .sort(
            [value, CATEGORY_CODE],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .limit(IdxSize::try_from(k).unwrap_or(IdxSize::MAX))
        .collect()?;

    let codes = out.column(CATEGORY_CODE)?.str()?;
    let sums = out.column(value)?.i64()?;

    let rows: Vec<CategoryTotal> = codes
        .into_iter()
        .zip(sums)
        .filter_map(|(code, sum)| {
            Some(CategoryTotal {
                category_code: code?.to_string(),
                value: sum.unwrap_or(0),
            })
        })
        .collect();

    debug!(%metric, k, returned = rows.len(), "computed top categories");
    Ok(rows)
}

/// Purchase sums per calendar day that has at least one event.
pub fn daily_purchases(events: &EventTable) -> Result<Vec<DailyPurchases>> {
    let out = events
        .dataframe()
        .clone()
        .lazy()
        .group_by([col(DAY)])
        .agg([col(PURCHASE).sum().alias(PURCHASE)])
        .sort([DAY], SortMultipleOptions::default())
        .with_column(col(DAY).cast(DataType::Int32))
        .collect()?;

    let days = out.column(DAY)?.i32()?;
    let purchases = out.column(PURCHASE)?.i64()?;

    let rows: Vec<DailyPurchases> = days
        .into_iter()
        .zip(purchases)
        .filter_map(|(day, purchases)| {
            Some(DailyPurchases {
                day: date_from_epoch_days(day?)?,
                purchases: purchases.unwrap_or(0),
            })
        })
        .collect();

    debug!(days = rows.len(), "computed daily purchases");
    Ok(rows)
}
