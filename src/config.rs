//! Exporter configuration
//!
//! Loaded from the environment with defaults for every value:
//! - `EXPORTER_INDEX_PREFIX` (default `operate`)
//! - `EXPORTER_BULK_CHUNK_SIZE` (default 500)
//! - `EXPORTER_CONTINUE_ON_MAPPING_ERROR` (default `true`)

use serde::{Deserialize, Serialize};

use crate::infra::{ExporterError, Result, DEFAULT_CHUNK_SIZE};

pub const DEFAULT_INDEX_PREFIX: &str = "operate";

/// Configuration of the projection runner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExporterConfig {
    /// Prefix of every target index, joined to the index name with `-`
    pub index_prefix: String,
    /// Maximum number of write requests per bulk call
    pub bulk_chunk_size: usize,
    /// When false, a batch with any mapping failure is rejected before
    /// anything is written so the caller can redeliver it
    pub continue_on_mapping_error: bool,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            index_prefix: DEFAULT_INDEX_PREFIX.to_string(),
            bulk_chunk_size: DEFAULT_CHUNK_SIZE,
            continue_on_mapping_error: true,
        }
    }
}

impl ExporterConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let index_prefix = std::env::var("EXPORTER_INDEX_PREFIX")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.index_prefix);

        let bulk_chunk_size = std::env::var("EXPORTER_BULK_CHUNK_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.bulk_chunk_size);

        let continue_on_mapping_error = std::env::var("EXPORTER_CONTINUE_ON_MAPPING_ERROR")
            .ok()
            .map(|s| s == "true" || s == "1")
            .unwrap_or(defaults.continue_on_mapping_error);

        Self {
            index_prefix,
            bulk_chunk_size,
            continue_on_mapping_error,
        }
    }

    pub fn with_index_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.index_prefix = prefix.into();
        self
    }

    pub fn with_bulk_chunk_size(mut self, size: usize) -> Self {
        self.bulk_chunk_size = size;
        self
    }

    pub fn with_continue_on_mapping_error(mut self, enabled: bool) -> Self {
        self.continue_on_mapping_error = enabled;
        self
    }

    /// Full name of the index `name`
    pub fn index_name(&self, name: &str) -> String {
        if self.index_prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}-{}", self.index_prefix, name)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.bulk_chunk_size == 0 {
            return Err(ExporterError::Configuration(
                "bulk chunk size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExporterConfig::default();
        assert_eq!(config.index_prefix, "operate");
        assert_eq!(config.bulk_chunk_size, 500);
        assert!(config.continue_on_mapping_error);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_index_name() {
        let config = ExporterConfig::default().with_index_prefix("camunda");
        assert_eq!(config.index_name("list-view"), "camunda-list-view");
        assert_eq!(
            ExporterConfig::default().with_index_prefix("").index_name("task"),
            "task"
        );
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let config = ExporterConfig::default().with_bulk_chunk_size(0);
        assert!(matches!(config.validate(), Err(ExporterError::Configuration(_))));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ExporterConfig =
            serde_json::from_str(r#"{"indexPrefix":"x","continueOnMappingError":false}"#).unwrap();
        assert_eq!(config.index_prefix, "x");
        assert_eq!(config.bulk_chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(!config.continue_on_mapping_error);
    }
}
