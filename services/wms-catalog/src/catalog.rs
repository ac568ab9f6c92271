//! The layer catalog.
//!
//! Holds the current [`LayerGeneration`]: an immutable name to descriptor map
//! behind an `Arc`. A refresh builds a complete new generation and swaps the
//! handle; readers keep whichever generation they cloned for as long as they
//! need it, so a request never observes a half-built catalog.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wms_common::LayerDescriptor;

use crate::factory::{LayerBuildError, LayerFactory};
use crate::scanner::{ConfigTree, DefinitionSource, ScanError};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Configuration scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error("Refresh task failed: {0}")]
    Task(String),
}

/// One published state of the catalog.
#[derive(Debug)]
pub struct LayerGeneration {
    number: u64,
    created: DateTime<Utc>,
    layers: BTreeMap<String, Arc<LayerDescriptor>>,
}

impl LayerGeneration {
    /// Generation 0, before the first refresh.
    pub fn empty() -> Self {
        Self {
            number: 0,
            created: Utc::now(),
            layers: BTreeMap::new(),
        }
    }

    /// Monotonically increasing across refreshes.
    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<LayerDescriptor>> {
        self.layers.get(name)
    }

    /// Layers ordered by name.
    pub fn layers(&self) -> impl Iterator<Item = &Arc<LayerDescriptor>> {
        self.layers.values()
    }
}

/// Outcome of one refresh.
#[derive(Debug, Clone)]
pub struct RefreshSummary {
    pub generation: u64,
    pub layers: usize,
    /// Layers carried over without probing
    pub reused: usize,
    pub skipped: usize,
    pub elapsed_ms: u64,
}

struct RefreshState {
    next_generation: u64,
    /// Definitions already reported as failing
    warned: HashSet<PathBuf>,
}

enum Built {
    Fresh(Arc<LayerDescriptor>),
    Reused(Arc<LayerDescriptor>),
}

struct CatalogShared {
    current: RwLock<Arc<LayerGeneration>>,
    refresh_state: tokio::sync::Mutex<RefreshState>,
    tree: Arc<dyn ConfigTree>,
    factory: Arc<LayerFactory>,
    probe_concurrency: usize,
}

impl CatalogShared {
    fn snapshot(&self) -> Arc<LayerGeneration> {
        Arc::clone(&self.current.read().unwrap_or_else(|e| e.into_inner()))
    }

    async fn refresh(&self) -> Result<RefreshSummary, CatalogError> {
        // One refresh at a time; readers are never blocked by this lock.
        let mut state = self.refresh_state.lock().await;
        let started = Instant::now();

        let tree = Arc::clone(&self.tree);
        let scan = tokio::task::spawn_blocking(move || tree.scan())
            .await
            .map_err(|e| CatalogError::Task(e.to_string()))??;
        for e in &scan.errors {
            warn!(error = %e, "Skipping part of the configuration tree");
        }

        let previous = self.snapshot();
        let now = Utc::now();
        let reusable: HashMap<&Path, &Arc<LayerDescriptor>> = previous
            .layers()
            .filter(|layer| layer.metadata_is_fresh(now))
            .map(|layer| (layer.product_file.as_path(), layer))
            .collect();

        let outcomes: Vec<(DefinitionSource, Result<Built, LayerBuildError>)> =
            stream::iter(scan.sources)
                .map(|source| {
                    let reused = reusable
                        .get(source.path.as_path())
                        .filter(|layer| {
                            layer.definition_modified.is_some()
                                && layer.definition_modified == source.modified
                        })
                        .map(|layer| Arc::clone(layer));
                    let factory = Arc::clone(&self.factory);
                    async move {
                        let result = match reused {
                            Some(layer) => Ok(Built::Reused(layer)),
                            None => factory
                                .create(&source)
                                .await
                                .map(|layer| Built::Fresh(Arc::new(layer))),
                        };
                        (source, result)
                    }
                })
                .buffered(self.probe_concurrency)
                .collect()
                .await;

        let mut layers: BTreeMap<String, Arc<LayerDescriptor>> = BTreeMap::new();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let (mut reused, mut skipped) = (0, 0);

        for (source, outcome) in outcomes {
            seen.insert(source.path.clone());
            let (layer, carried) = match outcome {
                Ok(Built::Fresh(layer)) => (layer, false),
                Ok(Built::Reused(layer)) => (layer, true),
                Err(e) => {
                    skipped += 1;
                    if state.warned.insert(source.path.clone()) {
                        warn!(path = %source.path.display(), error = %e, "Skipping layer definition");
                    } else {
                        debug!(path = %source.path.display(), error = %e, "Layer definition still failing");
                    }
                    continue;
                }
            };

            if layers.contains_key(&layer.name) {
                skipped += 1;
                if state.warned.insert(source.path.clone()) {
                    warn!(
                        layer = %layer.name,
                        path = %source.path.display(),
                        "Duplicate layer name, keeping the first definition"
                    );
                }
                continue;
            }

            if state.warned.remove(&source.path) {
                info!(path = %source.path.display(), "Layer definition loads again");
            }
            if carried {
                reused += 1;
            }
            layers.insert(layer.name.clone(), layer);
        }
        state.warned.retain(|path| seen.contains(path));

        let generation = LayerGeneration {
            number: state.next_generation,
            created: now,
            layers,
        };
        state.next_generation += 1;

        let summary = RefreshSummary {
            generation: generation.number,
            layers: generation.len(),
            reused,
            skipped,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        let published = Arc::new(generation);
        let retired = {
            let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *current, published)
        };
        // The last handle to an old generation frees its layers outside the lock.
        drop(retired);

        info!(
            generation = summary.generation,
            layers = summary.layers,
            reused = summary.reused,
            skipped = summary.skipped,
            elapsed_ms = summary.elapsed_ms,
            "Layer catalog refreshed"
        );
        Ok(summary)
    }
}

/// Concurrently readable layer registry with a background refresh task.
pub struct LayerCatalog {
    shared: Arc<CatalogShared>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LayerCatalog {
    /// An empty catalog. Call [`refresh`](Self::refresh) to populate it.
    pub fn new(tree: Arc<dyn ConfigTree>, factory: LayerFactory, probe_concurrency: usize) -> Self {
        Self {
            shared: Arc::new(CatalogShared {
                current: RwLock::new(Arc::new(LayerGeneration::empty())),
                refresh_state: tokio::sync::Mutex::new(RefreshState {
                    next_generation: 1,
                    warned: HashSet::new(),
                }),
                tree,
                factory: Arc::new(factory),
                probe_concurrency: probe_concurrency.max(1),
            }),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Create and populate. Failing to scan the configuration at all is fatal.
    pub async fn initialize(
        tree: Arc<dyn ConfigTree>,
        factory: LayerFactory,
        probe_concurrency: usize,
    ) -> Result<Self, CatalogError> {
        let catalog = Self::new(tree, factory, probe_concurrency);
        catalog.refresh().await?;
        Ok(catalog)
    }

    /// Rescan the configuration and publish a new generation.
    pub async fn refresh(&self) -> Result<RefreshSummary, CatalogError> {
        self.shared.refresh().await
    }

    /// Refresh every `interval` until [`shutdown`](Self::shutdown).
    ///
    /// Errors are logged and the loop continues.
    pub fn start_background_refresh(&self, interval: Duration) {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if task.is_some() {
            warn!("Layer catalog refresh task already running");
            return;
        }

        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();
        *task = Some(tokio::spawn(async move {
            info!(
                interval_secs = interval.as_secs(),
                "Layer catalog refresh task started"
            );
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }

                // A panicking refresh must not take the loop down with it.
                let worker = Arc::clone(&shared);
                match tokio::spawn(async move { worker.refresh().await }).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => error!(error = %e, "Layer catalog refresh failed"),
                    Err(e) => error!(error = %e, "Layer catalog refresh panicked"),
                }
            }
            info!("Layer catalog refresh task stopped");
        }));
    }

    /// Stop the background task and wait until it has exited.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Layer catalog refresh task ended abnormally");
            }
        }
    }

    /// The current generation.
    pub fn snapshot(&self) -> Arc<LayerGeneration> {
        self.shared.snapshot()
    }

    pub fn generation(&self) -> u64 {
        self.snapshot().number()
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<LayerDescriptor>> {
        self.snapshot().get(name).cloned()
    }

    pub fn is_valid_layer(&self, name: &str) -> bool {
        self.snapshot().get(name).is_some()
    }

    pub fn is_valid_style(&self, layer: &str, style: &str) -> bool {
        self.lookup(layer).is_some_and(|l| l.is_valid_style(style))
    }

    pub fn is_valid_crs(&self, layer: &str, crs: &str) -> bool {
        self.lookup(layer).is_some_and(|l| l.is_valid_crs(crs))
    }

    pub fn is_valid_time(
        &self,
        layer: &str,
        t: DateTime<Utc>,
        reference: Option<DateTime<Utc>>,
    ) -> bool {
        self.lookup(layer)
            .is_some_and(|l| l.is_valid_time(t, reference))
    }

    /// Customer owning a layer, or an empty string for unknown layers.
    pub fn layer_customer(&self, name: &str) -> String {
        self.lookup(name)
            .map(|l| l.customer.clone())
            .unwrap_or_default()
    }
}

impl Drop for LayerCatalog {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
