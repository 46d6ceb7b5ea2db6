//! CLI configuration

use anyhow::Context;
use bundler_codec::DecodeOptions;
use bundler_resolve::ResolverConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings for the `bundler` tool
///
/// Read from an optional YAML file; every field has a default, so a file
/// only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundlerConfig {
    /// Tracing filter used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Decoder options; `verify_structure` turns on ownership checks
    pub decode: DecodeOptions,
    /// Dependency fetch tuning
    pub resolver: ResolverConfig,
    /// Documents kept in the dependency cache
    pub cache_capacity: u64,
    /// Default dependency store directory
    pub store_dir: Option<PathBuf>,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            log_filter: "warn".to_string(),
            decode: DecodeOptions::default(),
            resolver: ResolverConfig::default(),
            cache_capacity: 256,
            store_dir: None,
        }
    }
}

impl BundlerConfig {
    /// Load from `path`, or defaults when no path is given
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is not valid YAML
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Set the fallback tracing filter
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Set the default store directory
    #[must_use]
    pub fn with_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store_dir = Some(dir.into());
        self
    }

    /// Set the dependency cache size
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.cache_capacity = capacity;
        self
    }
}
