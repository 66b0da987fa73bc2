use std::collections::BTreeMap;

use polars::prelude::*;
use tracing::debug;

use crate::error::Result;
use crate::events::{date_from_epoch_days, EventTable, DAY, PURCHASE, USER_ID};
use crate::types::DailyPurchases;

/// Daily purchase sums for one user, resampled to a gap-free calendar from the
/// user's first to last active day. Days without events carry 0; an unknown
/// user yields an empty series.
pub fn user_purchase_frequency(events: &EventTable, user_id: i64) -> Result<Vec<DailyPurchases>> {
    let df = events.dataframe();
    let users = df.column(USER_ID)?.i64()?;
    let days_column = df.column(DAY)?.cast(&DataType::Int32)?;
    let days = days_column.i32()?;
    let purchases = df.column(PURCHASE)?.i64()?;

    let mut per_day: BTreeMap<i32, i64> = BTreeMap::new();
    for idx in 0..df.height() {
        if users.get(idx) != Some(user_id) {
            continue;
        }
        let Some(day) = days.get(idx) else {
            continue;
        };
        *per_day.entry(day).or_insert(0) += purchases.get(idx).unwrap_or(0);
    }

    let (Some(&first), Some(&last)) = (per_day.keys().next(), per_day.keys().next_back()) else {
        debug!(user_id, "no events for user");
        return Ok(Vec::new());
    };

    let mut series = Vec::with_capacity((last - first + 1) as usize);
    for day in first..=last {
        let Some(date) = date_from_epoch_days(day) else {
            continue;
        };
        series.push(DailyPurchases {
            day: date,
            purchases: per_day.get(&day).copied().unwrap_or(0),
        });
    }

    debug!(user_id, days = series.len(), "resampled user purchase frequency");
    Ok(series)
}
