//! WMS layer catalog service.
//!
//! Scans the layer definition tree, probes backend metadata and keeps the
//! catalog current:
//! - `--once` builds the catalog, prints the published layers as JSON and exits
//! - otherwise the catalog is refreshed in the background until Ctrl+C

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use wms_catalog::probe::Inventory;
use wms_catalog::{
    AllowAll, CatalogConfig, FilesystemTree, InventoryProbe, LayerCatalog, LayerFactory,
    MetadataProbe, ProbeSet, RequestResolver,
};
use wms_protocol::CapabilitiesRequest;

#[derive(Parser, Debug)]
#[command(name = "wms-catalog")]
#[command(about = "WMS layer catalog with background refresh")]
struct Args {
    /// Catalog configuration file (YAML)
    #[arg(short, long, env = "WMS_CATALOG_CONFIG")]
    config: Option<PathBuf>,

    /// Layer definition root, overrides the configuration
    #[arg(long)]
    root: Option<PathBuf>,

    /// Metadata inventory file, overrides the configuration
    #[arg(long)]
    inventory: Option<PathBuf>,

    /// Build the catalog once, print it and exit
    #[arg(long)]
    once: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &args.config {
        Some(path) => CatalogConfig::from_file(path)
            .with_context(|| format!("Loading {}", path.display()))?,
        None => CatalogConfig::from_env()?,
    };
    if let Some(root) = args.root {
        config.root_dir = root;
    }
    if let Some(inventory) = args.inventory {
        config.inventory_file = Some(inventory);
    }

    let config = Arc::new(config);
    info!(root = %config.root_dir.display(), "Starting WMS layer catalog");

    let probe: Arc<dyn MetadataProbe> = match &config.inventory_file {
        Some(path) => Arc::new(
            InventoryProbe::from_file(path).with_default_producer(config.default_producer.clone()),
        ),
        None => {
            warn!("No metadata inventory configured, only static maps can be published");
            Arc::new(
                InventoryProbe::new(Inventory::default())
                    .with_default_producer(config.default_producer.clone()),
            )
        }
    };

    let factory = LayerFactory::new(&config, ProbeSet::uniform(probe));
    let tree = Arc::new(FilesystemTree::new(
        &config.root_dir,
        &config.definition_suffix,
    ));

    let catalog = Arc::new(
        LayerCatalog::initialize(tree, factory, config.probe_concurrency)
            .await
            .context("Initial layer catalog population failed")?,
    );

    if args.once {
        let resolver = RequestResolver::new(
            Arc::clone(&catalog),
            Arc::new(AllowAll),
            Arc::clone(&config),
        );
        let view = resolver.capabilities(&CapabilitiesRequest::new(config.layout));

        let summary = json!({
            "generation": view.generation,
            "layout": view.hierarchy.as_str(),
            "layers": view.summaries(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if config.disable_updates {
        info!("Catalog updates disabled");
    } else {
        catalog.start_background_refresh(config.poll_interval());
    }

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    catalog.shutdown().await;
    info!("Layer catalog stopped");

    Ok(())
}
