use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};

pub const EVENT_TIME: &str = "event_time";
pub const USER_ID: &str = "user_id";
pub const PRODUCT_ID: &str = "product_id";
pub const CATEGORY_CODE: &str = "category_code";
pub const BRAND: &str = "brand";
pub const PRICE: &str = "price";
pub const VIEW: &str = "view";
pub const PURCHASE: &str = "purchase";
pub const MAIN_CATEGORY: &str = "main_category";
pub const YEAR_MONTH: &str = "year_month";
pub const DAY: &str = "day";

pub const REQUIRED_COLUMNS: [&str; 8] = [
    EVENT_TIME,
    USER_ID,
    PRODUCT_ID,
    CATEGORY_CODE,
    BRAND,
    PRICE,
    VIEW,
    PURCHASE,
];

static TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
];

/// Immutable, normalized snapshot of the event dataset.
///
/// Columns: the eight input columns coerced to their schema types
/// (`event_time` as naive-UTC microsecond datetime, ids and counters as
/// `Int64`, `price` as `Float64`, `category_code`/`brand` as nullable
/// strings) plus the derived `main_category`, `year_month` (`YYYY-MM`)
/// and `day` (`Date`).
#[derive(Debug, Clone)]
pub struct EventTable {
    df: DataFrame,
}

impl EventTable {
    /// Reads a serialized event table and normalizes it. The format is chosen
    /// from the file extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = read_frame(path)?;
        info!(
            path = %path.display(),
            rows = raw.height(),
            columns = raw.width(),
            "read event dataset"
        );
        Self::from_dataframe(raw)
    }

    /// Normalizes an in-memory frame that follows the event schema.
    pub fn from_dataframe(raw: DataFrame) -> Result<Self> {
        let df = normalize(&raw)?;
        debug!(rows = df.height(), "normalized event table");
        Ok(Self { df })
    }

    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    pub fn len(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// Earliest and latest `event_time`, or `None` for an empty table.
    pub fn time_bounds(&self) -> Result<Option<(NaiveDateTime, NaiveDateTime)>> {
        let times = self.df.column(EVENT_TIME)?.datetime()?;
        let mut bounds: Option<(i64, i64)> = None;
        for idx in 0..self.df.height() {
            let Some(ts) = times.get(idx) else {
                continue;
            };
            bounds = Some(match bounds {
                Some((lo, hi)) => (lo.min(ts), hi.max(ts)),
                None => (ts, ts),
            });
        }

        Ok(bounds.and_then(|(lo, hi)| {
            Some((datetime_from_micros(lo)?, datetime_from_micros(hi)?))
        }))
    }

    /// Sorted distinct non-empty main categories.
    pub fn main_categories(&self) -> Result<Vec<String>> {
        let categories = self.df.column(MAIN_CATEGORY)?.str()?;
        let distinct: BTreeSet<&str> = categories
            .into_iter()
            .flatten()
            .filter(|category| !category.is_empty())
            .collect();
        Ok(distinct.into_iter().map(str::to_string).collect())
    }
}

fn read_frame(path: &Path) -> Result<DataFrame> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let df = match extension.as_str() {
        "parquet" => ParquetReader::new(File::open(path)?).finish()?,
        "csv" => CsvReadOptions::default()
            .with_has_header(true)
            .into_reader_with_file_handle(File::open(path)?)
            .finish()?,
        "jsonl" | "ndjson" => JsonReader::new(File::open(path)?)
            .with_json_format(JsonFormat::JsonLines)
            .finish()?,
        "json" => JsonReader::new(File::open(path)?).finish()?,
        other => return Err(PipelineError::UnsupportedFormat(other.to_string())),
    };

    Ok(df)
}

fn normalize(raw: &DataFrame) -> Result<DataFrame> {
    for name in REQUIRED_COLUMNS {
        if raw.get_column_index(name).is_none() {
            return Err(PipelineError::MissingColumn(name));
        }
    }

    if raw.get_column_index(DAY).is_some() {
        warn!("input column 'day' replaced by the date derived from event_time");
    }

    let event_micros = event_time_micros(raw.column(EVENT_TIME)?)?;

    let user_id = coerce(raw, USER_ID, DataType::Int64, "integer id")?;
    let product_id = coerce(raw, PRODUCT_ID, DataType::Int64, "integer id")?;
    let category_code = coerce(raw, CATEGORY_CODE, DataType::String, "string")?;
    let brand = coerce(raw, BRAND, DataType::String, "string")?;
    let price = coerce(raw, PRICE, DataType::Float64, "number")?;
    let view = coerce(raw, VIEW, DataType::Int64, "integer counter")?;
    let purchase = coerce(raw, PURCHASE, DataType::Int64, "integer counter")?;

    let main_category: Vec<Option<&str>> = category_code
        .str()?
        .into_iter()
        .map(|code| code.map(main_segment))
        .collect();

    let mut year_months = Vec::with_capacity(event_micros.len());
    let mut days = Vec::with_capacity(event_micros.len());
    for (row, &ts) in event_micros.iter().enumerate() {
        let dt = datetime_from_micros(ts).ok_or_else(|| PipelineError::InvalidTimestamp {
            column: EVENT_TIME,
            row,
            value: ts.to_string(),
        })?;
        year_months.push(dt.format("%Y-%m").to_string());
        days.push(epoch_days(dt.date()));
    }

    let event_time = Series::new(EVENT_TIME.into(), event_micros)
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;
    let main_category = Series::new(MAIN_CATEGORY.into(), main_category);
    let year_month = Series::new(YEAR_MONTH.into(), year_months);
    let day = Series::new(DAY.into(), days).cast(&DataType::Date)?;

    let df = DataFrame::new(vec![
        event_time.into(),
        user_id.into(),
        product_id.into(),
        category_code.into(),
        brand.into(),
        price.into(),
        view.into(),
        purchase.into(),
        main_category.into(),
        year_month.into(),
        day.into(),
    ])?;

    Ok(df)
}

fn coerce(
    raw: &DataFrame,
    name: &'static str,
    dtype: DataType,
    expected: &'static str,
) -> Result<Series> {
    raw.column(name)?
        .as_materialized_series()
        .strict_cast(&dtype)
        .map_err(|err| PipelineError::ColumnType {
            column: name,
            expected,
            message: err.to_string(),
        })
}

fn event_time_micros(column: &Column) -> Result<Vec<i64>> {
    match column.dtype() {
        DataType::String => {
            let values = column.str()?;
            let mut micros = Vec::with_capacity(column.len());
            for (row, value) in values.into_iter().enumerate() {
                let parsed = value.and_then(parse_event_time).ok_or_else(|| {
                    PipelineError::InvalidTimestamp {
                        column: EVENT_TIME,
                        row,
                        value: value.unwrap_or("<null>").to_string(),
                    }
                })?;
                micros.push(parsed.and_utc().timestamp_micros());
            }
            Ok(micros)
        }
        DataType::Datetime(_, tz) => {
            let cast = column.cast(&DataType::Datetime(TimeUnit::Microseconds, tz.clone()))?;
            physical_micros(&cast)
        }
        DataType::Date => {
            let cast = column.cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;
            physical_micros(&cast)
        }
        other => Err(PipelineError::ColumnType {
            column: EVENT_TIME,
            expected: "timestamp",
            message: format!("found {other}"),
        }),
    }
}

// Datetime physical values are UTC instants, so tz-aware input lands on naive UTC.
fn physical_micros(column: &Column) -> Result<Vec<i64>> {
    let values = column.datetime()?;
    let mut micros = Vec::with_capacity(column.len());
    for row in 0..column.len() {
        let ts = values.get(row).ok_or_else(|| PipelineError::InvalidTimestamp {
            column: EVENT_TIME,
            row,
            value: "<null>".to_string(),
        })?;
        micros.push(ts);
    }
    Ok(micros)
}

/// Parses the timestamp spellings accepted for `event_time`.
pub fn parse_event_time(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    let naive = trimmed.strip_suffix(" UTC").unwrap_or(trimmed);

    for fmt in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(dt);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }

    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}

fn main_segment(code: &str) -> &str {
    code.split_once('.').map_or(code, |(head, _)| head)
}

pub(crate) fn datetime_from_micros(micros: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_micros(micros).map(|dt| dt.naive_utc())
}

pub(crate) fn epoch_days(date: NaiveDate) -> i32 {
    (date - DateTime::UNIX_EPOCH.date_naive()).num_days() as i32
}

pub(crate) fn date_from_epoch_days(days: i32) -> Option<NaiveDate> {
    DateTime::UNIX_EPOCH
        .date_naive()
        .checked_add_signed(chrono::Duration::days(i64::from(days)))
}
