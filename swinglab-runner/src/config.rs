//! Run configuration loaded from TOML.
//!
//! ```toml
//! max_concurrency = 4
//! categories = ["crypto"]
//!
//! [engine]
//! atr_length = 14
//! atr_multiplier = 3.0
//! dc_length = 20
//! dc_source = "length"
//!
//! [window]
//! chunk_size = 1000
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use swinglab_core::config::ConfigError as EngineConfigError;
use swinglab_core::{EngineConfig, WindowConfig};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Engine(#[from] EngineConfigError),

    #[error("max_concurrency must be >= 1")]
    Concurrency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub engine: EngineConfig,
    pub window: WindowConfig,
    /// Tokens processed at the same time.
    pub max_concurrency: usize,
    /// Instrument categories this deployment owns; empty accepts all.
    pub categories: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            window: WindowConfig::default(),
            max_concurrency: 4,
            categories: Vec::new(),
        }
    }
}

impl RunConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.window.validate()?;
        if self.max_concurrency == 0 {
            return Err(ConfigError::Concurrency);
        }
        Ok(())
    }

    /// Whether a bar of `category` belongs to this deployment.
    ///
    /// Uncategorised bars are only accepted when no filter is configured.
    pub fn accepts_category(&self, category: Option<&str>) -> bool {
        if self.categories.is_empty() {
            return true;
        }
        category.is_some_and(|c| self.categories.iter().any(|allowed| allowed == c))
    }

    /// Short content hash of the engine parameters.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.engine.atr_length as u64).to_le_bytes());
        hasher.update(&self.engine.atr_multiplier.to_bits().to_le_bytes());
        hasher.update(&(self.engine.dc_length as u64).to_le_bytes());
        hasher.update(format!("{:?}", self.engine.dc_source).as_bytes());
        hasher.finalize().to_hex()[..16].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swinglab_core::DonchianSource;

    #[test]
    fn empty_toml_uses_defaults() {
        let config = RunConfig::from_toml("").unwrap();
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.engine.atr_length, 14);
        assert_eq!(config.window.trim_threshold, 2000);
    }

    #[test]
    fn parses_nested_tables() {
        let config = RunConfig::from_toml(
            r#"
            max_concurrency = 2
            categories = ["crypto", "fx"]

            [engine]
            atr_length = 10
            dc_source = "swing"

            [window]
            chunk_size = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.engine.atr_length, 10);
        assert_eq!(config.engine.atr_multiplier, 3.0);
        assert_eq!(config.engine.dc_source, DonchianSource::Swing);
        assert_eq!(config.window.chunk_size, 250);
        assert_eq!(config.window.trim_size, 1000);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            RunConfig::from_toml("max_concurrency = 0"),
            Err(ConfigError::Concurrency)
        ));
        assert!(matches!(
            RunConfig::from_toml("[window]\nchunk_size = 5000"),
            Err(ConfigError::Engine(EngineConfigError::ChunkSize(5000)))
        ));
        assert!(matches!(
            RunConfig::from_toml("[engine]\ndc_source = \"weekly\""),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn category_filter() {
        let open = RunConfig::default();
        assert!(open.accepts_category(None));
        assert!(open.accepts_category(Some("equity")));

        let crypto = RunConfig {
            categories: vec!["crypto".into()],
            ..RunConfig::default()
        };
        assert!(crypto.accepts_category(Some("crypto")));
        assert!(!crypto.accepts_category(Some("equity")));
        assert!(!crypto.accepts_category(None));
    }

    #[test]
    fn fingerprint_tracks_engine_parameters() {
        let a = RunConfig::default();
        let mut b = RunConfig::default();
        b.max_concurrency = 16;
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.engine.dc_length = 55;
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);
    }
}
