//! Application configuration
//!
//! Settings come from an optional JSON file; every field has a default so a
//! partial file (or none at all) is fine. Command-line flags override the
//! loaded values.

use crate::capture::{ExtractorConfig, MAX_GRID_SIZE};
use crate::classifier::{DistanceMetric, DEFAULT_K};
use crate::storage::DEFAULT_DATASET_FILE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "teachable-knn.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for a classifier session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Neighbors consulted per prediction
    pub k: usize,

    /// Distance used to rank neighbors
    pub metric: DistanceMetric,

    /// Frames processed per second
    pub frame_rate: u32,

    /// Length of a recording window when none is given
    pub recording_duration_secs: f64,

    /// Dataset loaded at startup and written on save
    pub dataset_path: Option<PathBuf>,

    /// Feature extractor settings
    pub extractor: ExtractorConfig,

    /// Log filter used when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            metric: DistanceMetric::default(),
            frame_rate: 30,
            recording_duration_secs: 5.0,
            dataset_path: Some(PathBuf::from(DEFAULT_DATASET_FILE)),
            extractor: ExtractorConfig::default(),
            log_filter: "teachable_knn=info".to_string(),
        }
    }
}

impl AppConfig {
    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.k == 0 {
            return Err(ConfigError::Invalid("k must be at least 1".to_string()));
        }
        if self.frame_rate == 0 {
            return Err(ConfigError::Invalid(
                "frameRate must be at least 1".to_string(),
            ));
        }
        validate_duration(self.recording_duration_secs)?;
        if self.extractor.grid_size == 0 || self.extractor.grid_size > MAX_GRID_SIZE {
            return Err(ConfigError::Invalid(format!(
                "extractor.gridSize must be between 1 and {}",
                MAX_GRID_SIZE
            )));
        }
        Ok(())
    }

    /// Delay between two frames
    pub fn frame_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.frame_rate.max(1) as u64)
    }

    /// Default recording window
    pub fn recording_duration(&self) -> Duration {
        Duration::from_secs_f64(self.recording_duration_secs.max(0.0))
    }
}

/// Check a recording length in seconds
pub fn validate_duration(secs: f64) -> Result<Duration, ConfigError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ConfigError::Invalid(format!(
            "recording duration must be a positive number of seconds, got {}",
            secs
        )));
    }
    Ok(Duration::from_secs_f64(secs))
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. ./teachable-knn.json
    /// 2. Default configuration
    pub async fn load_default() -> Result<AppConfig, ConfigError> {
        let local_config = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from(&local_config).await;
        }

        Ok(AppConfig::default())
    }

    pub async fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.validate()?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.k, 10);
        assert_eq!(config.recording_duration(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"k": 3, "metric": "cosine", "extractor": {"grayscale": true}}"#)
                .unwrap();

        assert_eq!(config.k, 3);
        assert_eq!(config.metric, DistanceMetric::Cosine);
        assert!(config.extractor.grayscale);
        assert_eq!(config.extractor.grid_size, 8);
        assert_eq!(config.frame_rate, 30);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let zero_k = AppConfig {
            k: 0,
            ..AppConfig::default()
        };
        assert!(zero_k.validate().is_err());

        let mut huge_grid = AppConfig::default();
        huge_grid.extractor.grid_size = 65_536;
        assert!(huge_grid.validate().is_err());
        huge_grid.extractor.grid_size = MAX_GRID_SIZE;
        assert!(huge_grid.validate().is_ok());

        assert!(validate_duration(0.0).is_err());
        assert!(validate_duration(f64::NAN).is_err());
        assert!(validate_duration(-1.0).is_err());
        assert_eq!(validate_duration(2.5).unwrap(), Duration::from_millis(2500));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"frameRate": 10, "datasetPath": "classes.json"}"#).unwrap();

        let config = ConfigLoader::load_from(&path).await.unwrap();

        assert_eq!(config.frame_interval(), Duration::from_millis(100));
        assert_eq!(config.dataset_path, Some(PathBuf::from("classes.json")));
    }

    #[tokio::test]
    async fn test_load_rejects_invalid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"frameRate": 0}"#).unwrap();

        assert!(matches!(
            ConfigLoader::load_from(&path).await,
            Err(ConfigError::Invalid(_))
        ));
    }
}
