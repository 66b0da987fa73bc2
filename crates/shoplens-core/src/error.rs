// crates/shoplens-core/src/error.rs

use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("dataset is missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("column '{column}' row {row} has unparseable timestamp '{value}'")]
    InvalidTimestamp {
        column: &'static str,
        row: usize,
        value: String,
    },

    #[error("column '{column}' cannot be read as {expected}: {message}")]
    ColumnType {
        column: &'static str,
        expected: &'static str,
        message: String,
    },

    #[error("unsupported dataset format '{0}' (expected parquet, csv, json, jsonl or ndjson)")]
    UnsupportedFormat(String),

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("unknown metric '{0}' (expected 'view' or 'purchase')")]
    UnknownMetric(String),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),
}

impl PipelineError {
    /// True for errors caused by input that does not match the event schema.
    pub fn is_data_format(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingColumn(_)
                | PipelineError::InvalidTimestamp { .. }
                | PipelineError::ColumnType { .. }
                | PipelineError::UnsupportedFormat(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
