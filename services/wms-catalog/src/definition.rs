//! Layer definition files.
//!
//! A definition is the JSON product file found under a customer's product
//! tree. Only the settings the catalog needs are read; the rest of the
//! product (rendering views and so on) is ignored here.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use wms_common::{IntervalItem, LayerKind, LayerStyle};

/// View layer types rendered from gridded data.
const DATA_LAYER_TYPES: &[&str] = &[
    "arrow",
    "isoband",
    "isoline",
    "number",
    "symbol",
    "streamline",
    "isolabel",
    "circle",
];

#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot determine layer type of {path}")]
    UnknownKind { path: PathBuf },

    #[error("Unsupported layer_type '{layer_type}' in {path}")]
    UnsupportedType { path: PathBuf, layer_type: String },
}

/// Keywords are written either as one string or as a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Keywords {
    One(String),
    Many(Vec<String>),
}

impl Default for Keywords {
    fn default() -> Self {
        Keywords::Many(Vec::new())
    }
}

impl Keywords {
    pub fn to_vec(&self) -> Vec<String> {
        let set: BTreeSet<String> = match self {
            Keywords::One(k) => std::iter::once(k.clone()).collect(),
            Keywords::Many(ks) => ks.iter().cloned().collect(),
        };
        set.into_iter().collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectionDefinition {
    #[serde(default)]
    pub crs: Option<String>,
}

/// Per-layer CRS overrides on top of the catalog defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrsOverrides {
    #[serde(default)]
    pub enable: Vec<String>,
    #[serde(default)]
    pub disable: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewLayerDefinition {
    #[serde(default)]
    pub layer_type: Option<String>,
    #[serde(default)]
    pub producer: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewDefinition {
    #[serde(default)]
    pub layers: Vec<ViewLayerDefinition>,
}

/// The catalog-relevant part of a product file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayerDefinition {
    /// Overrides the name derived from the file location
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub opaque: bool,
    #[serde(default)]
    pub queryable: bool,
    #[serde(default)]
    pub cascaded: bool,
    #[serde(default)]
    pub keyword: Keywords,

    #[serde(default)]
    pub producer: Option<String>,
    /// Observation time step in minutes
    #[serde(default)]
    pub timestep: Option<i64>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub layer_type: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub views: Vec<ViewDefinition>,

    #[serde(default)]
    pub legend_url_layer: Option<String>,
    #[serde(default)]
    pub styles: Vec<LayerStyle>,
    #[serde(default)]
    pub legend: Option<serde_json::Value>,

    #[serde(default)]
    pub projection: ProjectionDefinition,
    #[serde(default)]
    pub crs: CrsOverrides,

    #[serde(default)]
    pub intervals: Vec<IntervalItem>,
    #[serde(default)]
    pub disable_time_dimension: bool,
    /// Seconds a probe result may be reused across refreshes
    #[serde(default)]
    pub metadata_update_interval: Option<u64>,
}

impl LayerDefinition {
    pub fn from_json(path: &Path, content: &str) -> Result<Self, DefinitionError> {
        serde_json::from_str(content).map_err(|source| DefinitionError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub async fn load(path: &Path) -> Result<Self, DefinitionError> {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| DefinitionError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
        Self::from_json(path, &content)
    }

    /// Explicit root `layer_type`, else the first view layer that has one.
    pub fn layer_type(&self) -> Option<&str> {
        self.layer_type.as_deref().or_else(|| {
            self.view_layers()
                .find_map(|l| l.layer_type.as_deref())
        })
    }

    fn view_layers(&self) -> impl Iterator<Item = &ViewLayerDefinition> {
        self.views.iter().flat_map(|v| v.layers.iter())
    }

    /// Producer at the root or in the first view layer naming one.
    pub fn producer(&self) -> Option<&str> {
        self.producer
            .as_deref()
            .or_else(|| self.view_layers().find_map(|l| l.producer.as_deref()))
    }

    /// Table of a vector store layer.
    pub fn table(&self) -> Option<&str> {
        self.table
            .as_deref()
            .or_else(|| self.view_layers().find_map(|l| l.table.as_deref()))
    }

    pub fn reads_raw_grid(&self) -> bool {
        self.source.as_deref() == Some("grid")
    }

    /// Decide the backend kind of the layer.
    pub fn resolve_kind(
        &self,
        path: &Path,
        observation_producers: &BTreeSet<String>,
    ) -> Result<LayerKind, DefinitionError> {
        if self
            .producer
            .as_ref()
            .is_some_and(|p| observation_producers.contains(p))
        {
            return Ok(LayerKind::StationObservation);
        }

        match self.layer_type() {
            Some("map") => Ok(LayerKind::Map),
            Some("postgis") | Some("icemap") => Ok(LayerKind::VectorStore),
            Some(t) if DATA_LAYER_TYPES.contains(&t) => Ok(if self.reads_raw_grid() {
                LayerKind::RawModelOutput
            } else {
                LayerKind::GriddedForecast
            }),
            Some(t) => Err(DefinitionError::UnsupportedType {
                path: path.to_path_buf(),
                layer_type: t.to_string(),
            }),
            None if self.hidden => Ok(LayerKind::GriddedForecast),
            None => Err(DefinitionError::UnknownKind {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Legend settings as a list.
    pub fn legend_values(&self) -> Vec<serde_json::Value> {
        match &self.legend {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(serde_json::Value::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
        }
    }
}
