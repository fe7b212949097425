use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::aggregate::AggregationConfig;
use crate::error::AnalyticsError;
use crate::logging::LogConfig;
use crate::normalize::NormalizerConfig;
use crate::predict::PredictionConfig;
use crate::source::SourceConfig;
use crate::workload::WorkloadConfig;

/// Current configuration format version
pub const CONFIG_VERSION: &str = "1.0";

/// Engine configuration
///
/// One parameterised engine: thresholds, model family and feature set are all
/// explicit here rather than fixed per code path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Configuration format version
    pub version: String,

    /// Where raw activities come from
    pub source: SourceConfig,

    /// Raw record field names
    pub normalizer: NormalizerConfig,

    /// Period aggregation settings
    pub aggregation: AggregationConfig,

    /// ACWR windows and thresholds
    pub workload: WorkloadConfig,

    /// 10K prediction settings
    pub prediction: PredictionConfig,

    /// Logging settings
    pub logging: LogConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            version: CONFIG_VERSION.to_string(),
            source: SourceConfig::default(),
            normalizer: NormalizerConfig::default(),
            aggregation: AggregationConfig::default(),
            workload: WorkloadConfig::default(),
            prediction: PredictionConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: EngineConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".stridewise")
            .join("config.toml")
    }

    /// Load from the default path, falling back to defaults when absent or invalid
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        if !config_path.exists() {
            return Self::default();
        }

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    path = %config_path.display(),
                    error = %e,
                    "Invalid config file, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Save configuration to default location
    pub fn save_default(&self) -> Result<PathBuf> {
        let config_path = Self::default_config_path();
        self.save_to_file(&config_path)?;
        Ok(config_path)
    }

    /// Check every section
    pub fn validate(&self) -> std::result::Result<(), AnalyticsError> {
        if self.aggregation.rolling_window == 0 {
            return Err(AnalyticsError::Configuration(
                "aggregation.rolling_window must be at least 1".to_string(),
            ));
        }
        self.workload.validate()?;
        self.prediction.validate()?;
        Ok(())
    }
}
