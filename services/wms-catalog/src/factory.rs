//! Layer descriptor construction.
//!
//! The factory reads a definition, probes the layer's backend and combines
//! both into an immutable [`LayerDescriptor`]. A layer whose probe fails or
//! returns nothing publishable is rejected as a whole.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::warn;
use wms_common::time_dimension::StepTimeDimension;
use wms_common::{
    CrsSet, ElevationDimension, IntervalDimension, LayerDescriptor, LayerKind, LayerStyle,
    LegendUrl, SupportedReference, TimeDimension, TimeDimensions, TimeInterval, DEFAULT_STYLE,
};

use crate::config::CatalogConfig;
use crate::definition::{DefinitionError, LayerDefinition};
use crate::probe::{ProbeError, ProbeMetadata, ProbeSet, ProbeTimes};
use crate::scanner::DefinitionSource;

#[derive(Debug, thiserror::Error)]
pub enum LayerBuildError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("Metadata probe failed for {layer}: {source}")]
    Probe {
        layer: String,
        #[source]
        source: ProbeError,
    },

    #[error("Layer {layer} is not usable: {reason}")]
    Unusable { layer: String, reason: String },
}

/// Builds descriptors from definitions and backend metadata.
pub struct LayerFactory {
    probes: ProbeSet,
    references: Vec<SupportedReference>,
    observation_producers: BTreeSet<String>,
}

impl LayerFactory {
    pub fn new(config: &CatalogConfig, probes: ProbeSet) -> Self {
        Self {
            probes,
            references: config.supported_references.clone(),
            observation_producers: config.observation_producers.clone(),
        }
    }

    /// Load, probe and build one layer.
    pub async fn create(
        &self,
        source: &DefinitionSource,
    ) -> Result<LayerDescriptor, LayerBuildError> {
        let definition = LayerDefinition::load(&source.path).await?;
        let kind = definition.resolve_kind(&source.path, &self.observation_producers)?;
        let name = layer_name(source, &definition);

        let metadata = self
            .probes
            .probe(kind, &definition)
            .await
            .map_err(|source| LayerBuildError::Probe {
                layer: name.clone(),
                source,
            })?;

        self.build(source, &definition, kind, metadata, Utc::now())
    }

    /// Combine a definition with probed metadata.
    pub fn build(
        &self,
        source: &DefinitionSource,
        definition: &LayerDefinition,
        kind: LayerKind,
        metadata: ProbeMetadata,
        now: DateTime<Utc>,
    ) -> Result<LayerDescriptor, LayerBuildError> {
        let name = layer_name(source, definition);
        let unusable = |reason: &str| LayerBuildError::Unusable {
            layer: name.clone(),
            reason: reason.to_string(),
        };

        if !metadata.bbox.is_valid() {
            return Err(unusable("backend reported an empty bounding box"));
        }

        let time = time_dimensions(kind, definition, metadata.times)
            .map_err(|reason| unusable(&reason))?;
        if time.is_none() && !kind.may_be_timeless() && !definition.disable_time_dimension {
            return Err(unusable("backend reported no valid times"));
        }

        let elevation = metadata
            .levels
            .and_then(|(level_type, values)| ElevationDimension::new(level_type, values))
            .filter(ElevationDimension::is_ok);

        Ok(LayerDescriptor {
            kind,
            title: definition.title.clone().unwrap_or_else(|| name.clone()),
            abstract_text: definition.abstract_text.clone(),
            customer: source.customer.clone(),
            product_file: source.path.clone(),
            hidden: definition.hidden,
            queryable: definition.queryable,
            opaque: definition.opaque,
            cascaded: definition.cascaded,
            keywords: definition.keyword.to_vec(),
            crs: self.crs_set(&name, definition),
            styles: layer_styles(&name, definition),
            geographic_bbox: metadata.bbox,
            time,
            time_disabled: definition.disable_time_dimension,
            elevation,
            intervals: IntervalDimension::new(definition.intervals.clone()),
            legend: definition.legend_values(),
            metadata_updated: now,
            metadata_update_interval: definition.metadata_update_interval,
            definition_modified: source.modified,
            name,
        })
    }

    fn crs_set(&self, layer: &str, definition: &LayerDefinition) -> CrsSet {
        let mut crs = CrsSet::from_references(&self.references);

        for id in &definition.crs.enable {
            if !crs.enable(id, &self.references) {
                warn!(layer = %layer, crs = %id, "Cannot enable unknown CRS");
            }
        }
        for id in &definition.crs.disable {
            crs.disable(id);
        }

        if let Some(own) = definition.projection.crs.as_deref() {
            if own.starts_with("EPSG:") {
                crs.insert(own);
            }
        }
        crs
    }
}

/// Definition name, or `namespace:stem` from the file location.
pub fn layer_name(source: &DefinitionSource, definition: &LayerDefinition) -> String {
    definition
        .name
        .clone()
        .unwrap_or_else(|| source.default_name())
}

/// Styles from `legend_url_layer`, an explicit list, or a generated default.
fn layer_styles(name: &str, definition: &LayerDefinition) -> Vec<LayerStyle> {
    if let Some(legend_layer) = &definition.legend_url_layer {
        let mut style = LayerStyle::default_for(name);
        style.legend_url = Some(LegendUrl {
            format: "image/png".to_string(),
            width: None,
            height: None,
            online_resource: Some(format!(
                "?service=WMS&request=GetLegendGraphic&version=1.3.0&sld_version=1.1.0&style={}&format=image/png&layer={}",
                DEFAULT_STYLE, legend_layer
            )),
        });
        return vec![style];
    }

    if !definition.styles.is_empty() {
        return definition.styles.clone();
    }

    vec![LayerStyle::default_for(name)]
}

fn time_dimensions(
    kind: LayerKind,
    definition: &LayerDefinition,
    times: ProbeTimes,
) -> Result<Option<TimeDimensions>, String> {
    let dims = match times {
        ProbeTimes::None => None,
        ProbeTimes::Timesteps(steps) => {
            let dim = if kind == LayerKind::StationObservation {
                StepTimeDimension::new(steps).map(TimeDimension::Step)
            } else {
                TimeDimension::from_timesteps(steps)
            };
            dim.map(TimeDimensions::single)
        }
        ProbeTimes::Generations(runs) if kind == LayerKind::RawModelOutput => {
            // Raw output is published as one flat list of valid times.
            TimeDimension::from_timesteps(runs.into_iter().flat_map(|(_, steps)| steps))
                .map(TimeDimensions::single)
        }
        ProbeTimes::Generations(runs) => TimeDimensions::from_generations(
            runs.into_iter()
                .filter_map(|(reference, steps)| {
                    TimeDimension::from_timesteps(steps).map(|dim| (reference, dim))
                }),
        ),
        ProbeTimes::Period {
            start,
            end,
            step_minutes,
        } => {
            let step = definition.timestep.unwrap_or(step_minutes);
            let interval = TimeInterval::new(start, end, step).map_err(|e| e.to_string())?;
            Some(TimeDimensions::single(TimeDimension::interval(interval)))
        }
    };

    Ok(match dims {
        Some(dims) if kind == LayerKind::StationObservation => Some(dims.with_wall_clock_end()),
        other => other,
    })
}
