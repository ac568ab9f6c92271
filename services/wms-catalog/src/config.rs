//! Catalog configuration.
//!
//! Loaded from a YAML file, with a few settings overridable from the
//! environment so containers can change them without a new file.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::info;
use wms_common::SupportedReference;
use wms_protocol::HierarchyType;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings of the layer catalog and request validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Directory containing `customers/<customer>/products/`
    pub root_dir: PathBuf,

    /// Seconds between background refreshes.
    pub poll_interval_secs: u64,

    /// Populate once and never refresh.
    pub disable_updates: bool,

    pub supported_versions: Vec<String>,

    /// Accepted GetMap FORMAT values.
    pub map_formats: Vec<String>,

    /// Default capabilities layout.
    pub layout: HierarchyType,

    pub supported_references: Vec<SupportedReference>,

    /// Producers served from the observation store.
    pub observation_producers: BTreeSet<String>,

    /// Forecast producer used when a definition names none.
    pub default_producer: Option<String>,

    /// File suffix of layer definitions.
    pub definition_suffix: String,

    /// YAML inventory for the static metadata probe.
    pub inventory_file: Option<PathBuf>,

    /// Concurrent metadata probes during a refresh.
    pub probe_concurrency: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("config/wms"),
            poll_interval_secs: 60,
            disable_updates: false,
            supported_versions: vec!["1.3.0".to_string()],
            map_formats: vec![
                "image/png".to_string(),
                "image/svg+xml".to_string(),
                "application/pdf".to_string(),
                "cnf".to_string(),
            ],
            layout: HierarchyType::Flat,
            supported_references: SupportedReference::defaults(),
            observation_producers: BTreeSet::new(),
            default_producer: None,
            definition_suffix: ".json".to_string(),
            inventory_file: None,
            probe_concurrency: 8,
        }
    }
}

impl CatalogConfig {
    /// Load a YAML file, then apply environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        config.apply_env_overrides();
        config.validate()?;

        info!(
            path = %path.display(),
            root = %config.root_dir.display(),
            poll_interval_secs = config.poll_interval_secs,
            "Loaded catalog configuration"
        );
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("WMS_CATALOG_ROOT") {
            self.root_dir = PathBuf::from(root);
        }

        self.poll_interval_secs = std::env::var("WMS_CATALOG_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.poll_interval_secs);

        self.disable_updates = std::env::var("WMS_CATALOG_DISABLE_UPDATES")
            .ok()
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(self.disable_updates);

        if let Ok(path) = std::env::var("WMS_CATALOG_INVENTORY") {
            self.inventory_file = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be > 0".to_string(),
            ));
        }
        if self.probe_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "probe_concurrency must be > 0".to_string(),
            ));
        }
        if self.supported_versions.is_empty() {
            return Err(ConfigError::Invalid(
                "supported_versions must not be empty".to_string(),
            ));
        }
        if self.definition_suffix.is_empty() {
            return Err(ConfigError::Invalid(
                "definition_suffix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn supports_version(&self, version: &str) -> bool {
        self.supported_versions.iter().any(|v| v == version)
    }

    pub fn supports_map_format(&self, format: &str) -> bool {
        self.map_formats
            .iter()
            .any(|f| f.eq_ignore_ascii_case(format))
    }
}
