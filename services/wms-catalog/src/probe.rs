//! Backend metadata probes.
//!
//! A probe asks a layer's backend for the extent and time axis the layer can
//! be published with. Each backend kind has its own probe; [`ProbeSet`] routes
//! a definition to the right one.
//!
//! The shipped [`InventoryProbe`] answers from a YAML inventory file, reloaded
//! whenever the file changes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};
use wms_common::{BoundingBox, LayerKind, LevelType};

use crate::definition::LayerDefinition;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("No probe registered for {0} layers")]
    NoProbe(LayerKind),

    #[error("Definition does not name a {0}")]
    MissingKey(&'static str),

    #[error("Backend has no metadata for '{0}'")]
    NotFound(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Time axis reported by a backend.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ProbeTimes {
    #[default]
    None,
    /// Flat list of valid times
    Timesteps(Vec<DateTime<Utc>>),
    /// Valid times per model run, keyed by reference time
    Generations(Vec<(DateTime<Utc>, Vec<DateTime<Utc>>)>),
    /// Regular observation period
    Period {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step_minutes: i64,
    },
}

/// Metadata of one layer's backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeMetadata {
    /// Extent in lon/lat
    pub bbox: BoundingBox,
    pub times: ProbeTimes,
    pub levels: Option<(LevelType, Vec<i32>)>,
}

impl ProbeMetadata {
    pub fn timeless(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            times: ProbeTimes::None,
            levels: None,
        }
    }
}

#[async_trait]
pub trait MetadataProbe: Send + Sync {
    async fn probe(
        &self,
        kind: LayerKind,
        definition: &LayerDefinition,
    ) -> Result<ProbeMetadata, ProbeError>;
}

/// Probes by backend kind.
#[derive(Clone, Default)]
pub struct ProbeSet {
    probes: HashMap<LayerKind, Arc<dyn MetadataProbe>>,
}

impl ProbeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// One probe serving every kind.
    pub fn uniform(probe: Arc<dyn MetadataProbe>) -> Self {
        let kinds = [
            LayerKind::Map,
            LayerKind::VectorStore,
            LayerKind::GriddedForecast,
            LayerKind::StationObservation,
            LayerKind::RawModelOutput,
        ];
        Self {
            probes: kinds
                .into_iter()
                .map(|k| (k, Arc::clone(&probe)))
                .collect(),
        }
    }

    pub fn with(mut self, kind: LayerKind, probe: Arc<dyn MetadataProbe>) -> Self {
        self.probes.insert(kind, probe);
        self
    }

    pub async fn probe(
        &self,
        kind: LayerKind,
        definition: &LayerDefinition,
    ) -> Result<ProbeMetadata, ProbeError> {
        let probe = self.probes.get(&kind).ok_or(ProbeError::NoProbe(kind))?;
        probe.probe(kind, definition).await
    }
}

// ============================================================================
// Static inventory
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryLevels {
    pub level_type: LevelType,
    pub values: Vec<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryRun {
    pub reference_time: DateTime<Utc>,
    pub timesteps: Vec<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryPeriod {
    pub start: DateTime<Utc>,
    /// Open periods end at probe time
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    pub step_minutes: i64,
}

/// Metadata of one backend source.
#[derive(Debug, Clone, Deserialize)]
pub struct InventoryEntry {
    #[serde(default = "BoundingBox::world")]
    pub bbox: BoundingBox,
    #[serde(default)]
    pub timesteps: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub runs: Vec<InventoryRun>,
    #[serde(default)]
    pub period: Option<InventoryPeriod>,
    #[serde(default)]
    pub levels: Option<InventoryLevels>,
}

impl InventoryEntry {
    fn to_metadata(&self, now: DateTime<Utc>) -> ProbeMetadata {
        let times = if let Some(period) = &self.period {
            ProbeTimes::Period {
                start: period.start,
                end: period.end.unwrap_or(now),
                step_minutes: period.step_minutes,
            }
        } else if !self.runs.is_empty() {
            ProbeTimes::Generations(
                self.runs
                    .iter()
                    .map(|r| (r.reference_time, r.timesteps.clone()))
                    .collect(),
            )
        } else if !self.timesteps.is_empty() {
            ProbeTimes::Timesteps(self.timesteps.clone())
        } else {
            ProbeTimes::None
        };

        ProbeMetadata {
            bbox: self.bbox,
            times,
            levels: self
                .levels
                .as_ref()
                .map(|l| (l.level_type.clone(), l.values.clone())),
        }
    }
}

/// Backend metadata by source name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Inventory {
    /// Forecast and raw model producers
    #[serde(default)]
    pub producers: HashMap<String, InventoryEntry>,
    #[serde(default)]
    pub observations: HashMap<String, InventoryEntry>,
    /// Vector store tables
    #[serde(default)]
    pub tables: HashMap<String, InventoryEntry>,
}

impl Inventory {
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }
}

enum InventorySource {
    Static(Arc<Inventory>),
    File {
        path: PathBuf,
        cached: RwLock<Option<(SystemTime, Arc<Inventory>)>>,
    },
}

/// Probe answering from an [`Inventory`].
pub struct InventoryProbe {
    source: InventorySource,
    default_producer: Option<String>,
}

impl InventoryProbe {
    pub fn new(inventory: Inventory) -> Self {
        Self {
            source: InventorySource::Static(Arc::new(inventory)),
            default_producer: None,
        }
    }

    /// Read the inventory from `path`, reloading it when its modification time changes.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: InventorySource::File {
                path: path.into(),
                cached: RwLock::new(None),
            },
            default_producer: None,
        }
    }

    pub fn with_default_producer(mut self, producer: Option<String>) -> Self {
        self.default_producer = producer;
        self
    }

    async fn inventory(&self) -> Result<Arc<Inventory>, ProbeError> {
        match &self.source {
            InventorySource::Static(inventory) => Ok(Arc::clone(inventory)),
            InventorySource::File { path, cached } => load_cached(path, cached).await,
        }
    }
}

async fn load_cached(
    path: &Path,
    cached: &RwLock<Option<(SystemTime, Arc<Inventory>)>>,
) -> Result<Arc<Inventory>, ProbeError> {
    let modified = tokio::fs::metadata(path)
        .await
        .and_then(|m| m.modified())
        .map_err(|e| ProbeError::Unavailable(format!("{}: {}", path.display(), e)))?;

    {
        let guard = cached.read().unwrap_or_else(|e| e.into_inner());
        if let Some((at, inventory)) = guard.as_ref() {
            if *at == modified {
                return Ok(Arc::clone(inventory));
            }
        }
    }

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ProbeError::Unavailable(format!("{}: {}", path.display(), e)))?;
    let inventory = Arc::new(
        Inventory::from_yaml(&content)
            .map_err(|e| ProbeError::Unavailable(format!("{}: {}", path.display(), e)))?,
    );

    info!(
        path = %path.display(),
        producers = inventory.producers.len(),
        observations = inventory.observations.len(),
        tables = inventory.tables.len(),
        "Loaded metadata inventory"
    );

    *cached.write().unwrap_or_else(|e| e.into_inner()) = Some((modified, Arc::clone(&inventory)));
    Ok(inventory)
}

#[async_trait]
impl MetadataProbe for InventoryProbe {
    async fn probe(
        &self,
        kind: LayerKind,
        definition: &LayerDefinition,
    ) -> Result<ProbeMetadata, ProbeError> {
        let inventory = self.inventory().await?;
        let now = Utc::now();

        let (section, key) = match kind {
            // Static maps carry their own extent; an inventory entry is optional.
            LayerKind::Map => {
                let entry = definition.table().and_then(|t| inventory.tables.get(t));
                return Ok(entry.map_or_else(
                    || ProbeMetadata::timeless(BoundingBox::world()),
                    |e| e.to_metadata(now),
                ));
            }
            LayerKind::VectorStore => (
                &inventory.tables,
                definition.table().ok_or(ProbeError::MissingKey("table"))?,
            ),
            LayerKind::StationObservation => (
                &inventory.observations,
                definition
                    .producer()
                    .ok_or(ProbeError::MissingKey("producer"))?,
            ),
            LayerKind::GriddedForecast | LayerKind::RawModelOutput => (
                &inventory.producers,
                definition
                    .producer()
                    .or(self.default_producer.as_deref())
                    .ok_or(ProbeError::MissingKey("producer"))?,
            ),
        };

        debug!(kind = %kind, key = %key, "Probing inventory");
        section
            .get(key)
            .map(|entry| entry.to_metadata(now))
            .ok_or_else(|| ProbeError::NotFound(key.to_string()))
    }
}
