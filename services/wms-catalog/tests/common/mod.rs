//! Shared fixtures: a temporary product tree and an in-memory metadata probe.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;
use wms_catalog::{
    CatalogConfig, FilesystemTree, LayerCatalog, LayerDefinition, LayerFactory, MetadataProbe,
    ProbeError, ProbeMetadata, ProbeSet, ProbeTimes,
};
use wms_common::{BoundingBox, LayerKind, LevelType};

pub fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, h, m, 0).unwrap()
}

pub fn hourly(from: u32, to: u32) -> Vec<DateTime<Utc>> {
    (from..=to).map(|h| utc(1, h, 0)).collect()
}

pub fn finland() -> BoundingBox {
    BoundingBox::new(19.0, 59.0, 32.0, 71.0)
}

/// Probe answering from a mutable map keyed by producer or table.
#[derive(Default)]
pub struct StubProbe {
    entries: Mutex<HashMap<String, ProbeMetadata>>,
    calls: AtomicUsize,
}

impl StubProbe {
    pub fn set(&self, key: &str, metadata: ProbeMetadata) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), metadata);
    }

    pub fn remove(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataProbe for StubProbe {
    async fn probe(
        &self,
        kind: LayerKind,
        definition: &LayerDefinition,
    ) -> Result<ProbeMetadata, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if kind == LayerKind::Map {
            return Ok(ProbeMetadata::timeless(BoundingBox::world()));
        }
        let key = definition
            .producer()
            .or(definition.table())
            .ok_or(ProbeError::MissingKey("producer"))?;
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| ProbeError::NotFound(key.to_string()))
    }
}

pub struct Fixture {
    pub dir: TempDir,
    pub probe: Arc<StubProbe>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("customers")).unwrap();
        Self {
            dir,
            probe: Arc::new(StubProbe::default()),
        }
    }

    /// Write a definition to `customers/<customer>/products/<relative>`.
    pub fn write(&self, customer: &str, relative: &str, json: &str) -> PathBuf {
        let path = self
            .dir
            .path()
            .join("customers")
            .join(customer)
            .join("products")
            .join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, json).unwrap();
        path
    }

    pub fn config(&self) -> CatalogConfig {
        CatalogConfig {
            root_dir: self.dir.path().to_path_buf(),
            observation_producers: BTreeSet::from(["opendata".to_string()]),
            ..CatalogConfig::default()
        }
    }

    pub fn catalog(&self) -> LayerCatalog {
        let config = self.config();
        let probe: Arc<dyn MetadataProbe> = self.probe.clone();
        let factory = LayerFactory::new(&config, ProbeSet::uniform(probe));
        let tree = Arc::new(FilesystemTree::new(
            &config.root_dir,
            &config.definition_suffix,
        ));
        LayerCatalog::new(tree, factory, 4)
    }

    /// A forecast producer with runs at 00 and 06 UTC.
    pub fn with_harmonie(&self) {
        self.probe.set(
            "harmonie",
            ProbeMetadata {
                bbox: finland(),
                times: ProbeTimes::Generations(vec![
                    (utc(1, 0, 0), hourly(0, 12)),
                    (utc(1, 6, 0), hourly(6, 18)),
                ]),
                levels: Some((LevelType::Pressure, vec![1000, 850, 500])),
            },
        );
    }

    pub fn with_icemap(&self) {
        self.probe.set(
            "icemap",
            ProbeMetadata::timeless(BoundingBox::new(15.0, 53.0, 31.0, 66.0)),
        );
    }
}
