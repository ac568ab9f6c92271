//! WMS layer catalog.
//!
//! Scans layer definitions from a customer product tree, probes each layer's
//! backend for its extent and time axis, and keeps the result as an
//! atomically replaced catalog generation. [`resolver::RequestResolver`]
//! validates GetMap, GetLegendGraphic and GetCapabilities requests against it.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod definition;
pub mod factory;
pub mod probe;
pub mod resolver;
pub mod scanner;

pub use auth::{AllowAll, Authorizer, StaticAuthorizer};
pub use catalog::{CatalogError, LayerCatalog, LayerGeneration, RefreshSummary};
pub use config::{CatalogConfig, ConfigError};
pub use definition::{DefinitionError, LayerDefinition};
pub use factory::{LayerBuildError, LayerFactory};
pub use probe::{InventoryProbe, MetadataProbe, ProbeError, ProbeMetadata, ProbeSet, ProbeTimes};
pub use resolver::{
    CapabilitiesView, ElevationSummary, IntervalSummary, LayerSummary, LegendRequest,
    RequestResolver, ResolvedLayer, ValidatedRequest,
};
pub use scanner::{ConfigTree, DefinitionSource, FilesystemTree, ScanError};
