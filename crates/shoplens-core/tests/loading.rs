use std::fs::{self, File};

use chrono::{NaiveDate, TimeZone, Utc};
use polars::prelude::*;
use tempfile::tempdir;

use shoplens_core::aggregations::{daily_purchases, monthly_totals};
use shoplens_core::summary::summarize;
use shoplens_core::{EventTable, PipelineError};

const CSV_HEADER: &str = "event_time,user_id,product_id,category_code,brand,price,view,purchase";

#[test]
fn csv_snapshot_is_normalized() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.csv");
    fs::write(
        &path,
        format!(
            "{CSV_HEADER}\n\
             2019-10-31 23:59:00 UTC,7,1001,electronics.smartphone,apple,799,1,0\n\
             2019-11-01 00:01:00 UTC,7,1001,electronics.smartphone,apple,799,0,1\n\
             2019-11-03 10:00:00 UTC,8,1002,,,12.5,1,0\n"
        ),
    )
    .unwrap();

    let events = EventTable::load(&path).unwrap();
    assert_eq!(events.len(), 3);

    let df = events.dataframe();
    assert_eq!(
        df.column("event_time").unwrap().dtype(),
        &DataType::Datetime(TimeUnit::Microseconds, None)
    );
    assert_eq!(df.column("price").unwrap().dtype(), &DataType::Float64);

    let main = df.column("main_category").unwrap().str().unwrap();
    assert_eq!(main.get(0), Some("electronics"));
    assert_eq!(main.get(2), None);

    let months: Vec<String> = monthly_totals(&events)
        .unwrap()
        .into_iter()
        .map(|m| m.year_month)
        .collect();
    assert_eq!(months, ["2019-10", "2019-11"]);

    let summary = summarize(&events).unwrap();
    assert_eq!(summary.total_brands, 1);
    assert_eq!(summary.total_subcategories, 1);
}

#[test]
fn json_lines_snapshot_loads() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    fs::write(
        &path,
        concat!(
            r#"{"event_time":"2020-02-01T08:00:00","user_id":1,"product_id":5,"category_code":"kids.toys","brand":"lego","price":30.0,"view":1,"purchase":0}"#,
            "\n",
            r#"{"event_time":"2020-02-02T08:00:00","user_id":1,"product_id":5,"category_code":"kids.toys","brand":"lego","price":30.0,"view":0,"purchase":1}"#,
            "\n",
        ),
    )
    .unwrap();

    let events = EventTable::load(&path).unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events.main_categories().unwrap(), ["kids"]);
}

#[test]
fn parquet_snapshot_with_utc_timestamps_loads() -> PolarsResult<()> {
    let first = Utc.with_ymd_and_hms(2019, 10, 1, 23, 30, 0).unwrap();
    let second = Utc.with_ymd_and_hms(2019, 10, 2, 0, 30, 0).unwrap();

    let event_time = Series::new(
        "event_time".into(),
        vec![first.timestamp_micros(), second.timestamp_micros()],
    )
    .cast(&DataType::Datetime(
        TimeUnit::Microseconds,
        Some(polars::prelude::TimeZone::UTC),
    ))?;

    let mut df = DataFrame::new(vec![
        event_time.into(),
        Series::new("user_id".into(), vec![1i64, 1]).into(),
        Series::new("product_id".into(), vec![9i64, 9]).into(),
        Series::new("category_code".into(), vec![Some("sport.bicycle"), None]).into(),
        Series::new("brand".into(), vec![Some("trek"), Some("trek")]).into(),
        Series::new("price".into(), vec![450.0f64, 450.0]).into(),
        Series::new("view".into(), vec![1i64, 1]).into(),
        Series::new("purchase".into(), vec![1i64, 0]).into(),
    ])?;

    let dir = tempdir().unwrap();
    let path = dir.path().join("events.parquet");
    ParquetWriter::new(File::create(&path).unwrap()).finish(&mut df)?;

    let events = EventTable::load(&path).unwrap();
    let (lo, hi) = events.time_bounds().unwrap().unwrap();
    assert_eq!(lo, first.naive_utc());
    assert_eq!(hi, second.naive_utc());

    let days: Vec<NaiveDate> = daily_purchases(&events)
        .unwrap()
        .into_iter()
        .map(|d| d.day)
        .collect();
    assert_eq!(
        days,
        [
            NaiveDate::from_ymd_opt(2019, 10, 1).unwrap(),
            NaiveDate::from_ymd_opt(2019, 10, 2).unwrap()
        ]
    );

    Ok(())
}

#[test]
fn missing_column_is_a_data_format_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.csv");
    fs::write(
        &path,
        "event_time,user_id,product_id,category_code,price,view,purchase\n\
         2019-10-01 00:00:00 UTC,1,1,a.b,1.0,1,0\n",
    )
    .unwrap();

    let err = EventTable::load(&path).unwrap_err();
    assert!(matches!(err, PipelineError::MissingColumn("brand")));
    assert!(err.is_data_format());
}

#[test]
fn unparseable_timestamp_reports_its_row() -> PolarsResult<()> {
    let df = df!(
        "event_time" => &["2019-10-01 00:00:00", "first of october"],
        "user_id" => &[1i64, 1],
        "product_id" => &[1i64, 1],
        "category_code" => &["a.b", "a.b"],
        "brand" => &["x", "x"],
        "price" => &[1.0f64, 1.0],
        "view" => &[1i64, 1],
        "purchase" => &[0i64, 0],
    )?;

    match EventTable::from_dataframe(df) {
        Err(PipelineError::InvalidTimestamp { row, value, .. }) => {
            assert_eq!(row, 1);
            assert_eq!(value, "first of october");
        }
        other => panic!("expected InvalidTimestamp, got {other:?}"),
    }

    Ok(())
}

#[test]
fn non_numeric_counter_is_rejected() -> PolarsResult<()> {
    let df = df!(
        "event_time" => &["2019-10-01 00:00:00"],
        "user_id" => &[1i64],
        "product_id" => &[1i64],
        "category_code" => &["a.b"],
        "brand" => &["x"],
        "price" => &[1.0f64],
        "view" => &["lots"],
        "purchase" => &[0i64],
    )?;

    let err = EventTable::from_dataframe(df).unwrap_err();
    assert!(matches!(err, PipelineError::ColumnType { column: "view", .. }));
    assert!(err.is_data_format());

    Ok(())
}

#[test]
fn input_day_column_is_rederived() -> PolarsResult<()> {
    let df = df!(
        "event_time" => &["2019-10-05 12:00:00"],
        "user_id" => &[1i64],
        "product_id" => &[1i64],
        "category_code" => &["a.b"],
        "brand" => &["x"],
        "price" => &[1.0f64],
        "view" => &[0i64],
        "purchase" => &[3i64],
        "day" => &["not a date"],
    )?;

    let events = EventTable::from_dataframe(df).unwrap();
    let daily = daily_purchases(&events).unwrap();
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].day, NaiveDate::from_ymd_opt(2019, 10, 5).unwrap());
    assert_eq!(daily[0].purchases, 3);

    Ok(())
}

#[test]
fn unknown_extension_is_rejected() {
    let err = EventTable::load("sample_final.pkl").unwrap_err();
    assert!(matches!(err, PipelineError::UnsupportedFormat(ext) if ext == "pkl"));
}
