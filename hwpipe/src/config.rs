//! Configuration types and defaults

use hwpipe_core::{HwPipeResult, PipelineConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Global hwpipe configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Settings handed to every session
    pub pipeline: PipelineConfig,
    /// Log filter directive used when `RUST_LOG` is unset
    pub log_filter: Option<String>,
    /// Enable debug logging
    pub debug_logging: bool,
}

impl GlobalConfig {
    /// Read a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> HwPipeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parse a JSON configuration document
    pub fn from_json_str(json: &str) -> HwPipeResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.pipeline.validate()?;
        Ok(config)
    }

    /// Directive passed to the subscriber
    pub fn effective_log_filter(&self) -> String {
        match (&self.log_filter, self.debug_logging) {
            (Some(filter), _) => filter.clone(),
            (None, true) => "debug".to_string(),
            (None, false) => "info".to_string(),
        }
    }
}
