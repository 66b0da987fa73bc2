use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::error::Result;
use crate::products::DEFAULT_AT_RISK_THRESHOLD;

pub const DEFAULT_TOP_CATEGORIES: usize = 5;
pub const DEFAULT_FREQUENCY_USER_ID: i64 = 568_782_581;

/// Tunables for the metrics pipeline, read from a TOML file.
///
/// ```toml
/// dataset = "data/events.parquet"
/// at_risk_threshold = 10.0
/// top_categories = 5
/// frequency_user_id = 568782581
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub dataset: Option<PathBuf>,
    pub at_risk_threshold: f64,
    pub top_categories: usize,
    pub frequency_user_id: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset: None,
            at_risk_threshold: DEFAULT_AT_RISK_THRESHOLD,
            top_categories: DEFAULT_TOP_CATEGORIES,
            frequency_user_id: DEFAULT_FREQUENCY_USER_ID,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "loaded pipeline config");
        Ok(config)
    }
}
