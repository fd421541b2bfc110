//! YAML-based run configuration.
//!
//! Everything here has a default matching the compressor's reference
//! calibration, so a config file is optional. Command-line flags cover the
//! per-run surface (paths, sample rate, block size, channels, tolerance).
//!
//! # Configuration Structure
//!
//! ```yaml
//! stimulus:
//!   frequency_hz: 1000.0
//!   start_db: -48
//!   stop_db: -5
//!   step_db: 3
//!   tone_seconds: 0.25
//!   silence_seconds: 0.05
//!   settle_seconds: 0.12
//!   measure_seconds: 0.1
//!   peak_limit: 0.999
//! reference:
//!   threshold_db: -18.0
//!   ratio: 4.0
//!   knee_db: 6.0
//! overrides:
//!   Threshold: 0.7
//!   Ratio: 0.5
//!   Attack: 0.0
//!   Release: 1.0
//! required_parameters:
//!   - Knee
//! warmup_blocks: 10
//! ```
//!
//! # Programmatic Usage
//!
//! ```rust
//! use compressor_validate::config::ValidationConfig;
//!
//! let config = ValidationConfig::default_config();
//! assert_eq!(config.reference.ratio, 4.0);
//! assert_eq!(config.overrides["Threshold"], 0.7);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::analytical::GainComputer;
use crate::signals::StimulusSettings;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default)]
    pub stimulus: StimulusSettings,
    /// Curve the rendered output is expected to follow. Must describe the
    /// same setting the overrides put the plugin in.
    #[serde(default)]
    pub reference: GainComputer,
    /// Normalized values sent to the plugin, keyed by parameter name.
    #[serde(default = "default_overrides")]
    pub overrides: BTreeMap<String, f64>,
    /// Parameters that must be reported by `dump-params`.
    #[serde(default = "default_required_parameters")]
    pub required_parameters: Vec<String>,
    /// Blocks processed and discarded before rendering.
    #[serde(default = "default_warmup_blocks")]
    pub warmup_blocks: u32,
}

fn default_warmup_blocks() -> u32 { 10 }

fn default_required_parameters() -> Vec<String> {
    vec!["Knee".to_string()]
}

/// Plugin settings that put the compressor on its reference curve:
/// threshold -18 dB, ratio 4:1, default knee, clean character, fastest
/// attack, slowest release, no saturation, fully wet, unity gain staging.
fn default_overrides() -> BTreeMap<String, f64> {
    [
        ("Threshold", 0.700000),
        ("Ratio", 0.500000),
        ("Character", 0.0),
        ("Timing", 0.0),
        ("Attack", 0.0),
        ("Release", 1.0),
        ("Drive", 0.0),
        ("Sat Mix", 0.0),
        ("Oversampling", 0.0),
        ("Mix", 1.0),
        ("Input", 0.5),
        ("Makeup", 0.333333),
        ("Output", 0.5),
        ("Bypass", 0.0),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value))
    .collect()
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl ValidationConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// The reference calibration.
    pub fn default_config() -> Self {
        Self {
            stimulus: StimulusSettings::default(),
            reference: GainComputer::default(),
            overrides: default_overrides(),
            required_parameters: default_required_parameters(),
            warmup_blocks: default_warmup_blocks(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.stimulus.validate().map_err(ConfigError::Invalid)?;
        self.reference.validate().map_err(ConfigError::Invalid)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_reference_calibration() {
        let config = ValidationConfig::default_config();
        assert_eq!(config.reference, GainComputer::new(-18.0, 4.0, 6.0));
        assert_eq!(config.overrides.len(), 14);
        assert_eq!(config.overrides["Makeup"], 0.333333);
        assert!(!config.overrides.contains_key("Knee"));
        assert_eq!(config.required_parameters, vec!["Knee".to_string()]);
        assert_eq!(config.warmup_blocks, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let yaml = "reference:\n  threshold_db: -24.0\n  ratio: 2.0\n  knee_db: 0.0\nwarmup_blocks: 4\n";
        let config: ValidationConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.reference, GainComputer::new(-24.0, 2.0, 0.0));
        assert_eq!(config.warmup_blocks, 4);
        assert_eq!(config.stimulus, StimulusSettings::default());
        assert_eq!(config.overrides, default_overrides());
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("validate.yaml");
        let config = ValidationConfig::default_config();
        config.save(&path).unwrap();
        assert_eq!(ValidationConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn load_rejects_invalid_reference() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "reference:\n  threshold_db: -18.0\n  ratio: 0.5\n  knee_db: 6.0\n").unwrap();
        assert!(matches!(ValidationConfig::load(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn load_rejects_reversed_level_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reversed.yaml");
        std::fs::write(&path, "stimulus:\n  start_db: -5\n  stop_db: -48\n").unwrap();
        assert!(matches!(ValidationConfig::load(&path), Err(ConfigError::Invalid(_))));
    }
}
