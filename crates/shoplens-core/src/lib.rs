pub mod aggregations;
pub mod breakdown;
pub mod config;
pub mod error;
pub mod events;
pub mod frequency;
pub mod pipeline;
pub mod products;
pub mod summary;
pub mod types;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use events::EventTable;
pub use pipeline::{MetricsPipeline, Report};
pub use types::{
    BreakdownRow, CategoryTotal, DailyPurchases, DateRange, Metric, MonthlyTotal, ProductStats,
    Summary,
};
