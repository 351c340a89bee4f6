//! Configuration management for the conformance toolkit
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (conformance.toml)
//! - Environment variables (CONFORMANCE__*)
//!
//! ## Example config file (conformance.toml):
//! ```toml
//! [validation]
//! max_depth = 64
//!
//! [batch]
//! parallel_threshold = 64
//!
//! [generator]
//! seed = 0
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::batch::BatchOptions;
use crate::error::Result;
use crate::generator::{ExampleGenerator, DEFAULT_SEED};
use crate::validator::ValidationOptions;

const FILE_STEM: &str = "conformance";

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConformanceConfig {
    /// Validation settings
    #[serde(default)]
    pub validation: ValidationOptions,

    /// Batch settings
    #[serde(default)]
    pub batch: BatchOptions,

    /// Example generator settings
    #[serde(default)]
    pub generator: GeneratorConfig,
}

/// Example generator configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Seed for the deterministic random source
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
        }
    }
}

impl ConformanceConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, with `config_path` layered over the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_locations = [
            format!("{}.toml", FILE_STEM),
            format!(".{}.toml", FILE_STEM),
            format!("config/{}.toml", FILE_STEM),
        ];

        for location in &config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(dirs) = directories::ProjectDirs::from("dev", "familiar", FILE_STEM) {
            let xdg_config = dirs.config_dir().join(format!("{}.toml", FILE_STEM));
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // CONFORMANCE__VALIDATION__MAX_DEPTH=32 and friends
        builder = builder.add_source(
            Environment::with_prefix("CONFORMANCE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    pub fn validation_options(&self) -> ValidationOptions {
        self.validation
    }

    pub fn batch_options(&self) -> BatchOptions {
        self.batch
    }

    pub fn generator(&self) -> ExampleGenerator {
        ExampleGenerator::new(self.generator.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::DEFAULT_PARALLEL_THRESHOLD;
    use crate::validator::DEFAULT_MAX_DEPTH;

    #[test]
    fn test_default_config() {
        let config = ConformanceConfig::default();
        assert_eq!(config.validation.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.batch.parallel_threshold, DEFAULT_PARALLEL_THRESHOLD);
        assert_eq!(config.generator().seed(), DEFAULT_SEED);
    }

    #[test]
    fn test_serialize_config() {
        let toml_str = toml::to_string_pretty(&ConformanceConfig::default()).unwrap();
        assert!(toml_str.contains("[validation]"));
        assert!(toml_str.contains("[batch]"));
        assert!(toml_str.contains("[generator]"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[generator]\nseed = 7\n").unwrap();

        let config = ConformanceConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.generator.seed, 7);
        assert_eq!(config.validation.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.batch.parallel_threshold, DEFAULT_PARALLEL_THRESHOLD);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = ConformanceConfig::default();
        config.validation.max_depth = 12;
        config.batch.parallel_threshold = 500;
        config.save(&path).unwrap();

        let loaded = ConformanceConfig::load_from(path.to_str()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(ConformanceConfig::load_from(path.to_str()).is_err());
    }
}
