//! Request validation against the layer catalog.
//!
//! Every request works on one catalog generation from start to end, so a
//! refresh in the middle of validation cannot change the answer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use wms_common::time::{expand_time_specs, parse_time_list, parse_timestamp};
use wms_common::{
    BoundingBox, ElevationDimension, IntervalDimension, LayerDescriptor, LayerKind, WmsError,
    WmsResult, DEFAULT_STYLE,
};
use wms_protocol::{
    pair_layers_and_styles, parse_size, parse_transparent, split_list, CapabilitiesRequest,
    GetLegendGraphicParameters, GetMapParameters, HierarchyType,
};

use crate::auth::Authorizer;
use crate::catalog::LayerCatalog;
use crate::config::CatalogConfig;

/// Default legend graphic format.
const DEFAULT_LEGEND_FORMAT: &str = "image/png";

/// A requested layer after validation.
#[derive(Debug, Clone)]
pub struct ResolvedLayer {
    pub layer: Arc<LayerDescriptor>,
    /// Requested style, with an empty style replaced by the default
    pub style: String,
    /// Resolved `current` time; `None` for non-temporal layers or explicit times
    pub current_time: Option<DateTime<Utc>>,
}

/// A validated GetMap request.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub version: String,
    pub layers: Vec<ResolvedLayer>,
    pub crs: String,
    pub bbox: BoundingBox,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub transparent: bool,
    /// Requested times. Empty means the current time of each layer.
    pub times: Vec<DateTime<Utc>>,
    pub reference_time: Option<DateTime<Utc>>,
    pub elevation: Option<i32>,
    pub interval: Option<(i32, i32)>,
}

impl ValidatedRequest {
    pub fn uses_current_time(&self) -> bool {
        self.times.is_empty()
    }
}

/// A validated GetLegendGraphic request.
#[derive(Debug, Clone)]
pub struct LegendRequest {
    pub layer: Arc<LayerDescriptor>,
    pub style: String,
    pub format: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Layers to publish in a capabilities document.
#[derive(Debug, Clone)]
pub struct CapabilitiesView {
    pub generation: u64,
    pub hierarchy: HierarchyType,
    pub layers: Vec<Arc<LayerDescriptor>>,
}

impl CapabilitiesView {
    pub fn summaries(&self) -> Vec<LayerSummary> {
        self.layers
            .iter()
            .map(|layer| LayerSummary::from_descriptor(layer))
            .collect()
    }
}

/// One published layer with its dimensions in capabilities form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSummary {
    pub name: String,
    pub kind: LayerKind,
    pub customer: String,
    pub title: String,
    pub bbox: BoundingBox,
    pub crs: Vec<String>,
    pub styles: Vec<String>,
    /// Time extent of the latest generation
    pub time: Option<String>,
    pub reference_times: usize,
    pub elevation: Option<ElevationSummary>,
    pub interval: Option<IntervalSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElevationSummary {
    pub units: Option<&'static str>,
    pub default: i32,
    pub extent: String,
}

impl From<&ElevationDimension> for ElevationSummary {
    fn from(dim: &ElevationDimension) -> Self {
        Self {
            units: dim.units(),
            default: dim.default_elevation(),
            extent: dim.extent(),
        }
    }
}

/// `DIM_INTERVAL_START` and `DIM_INTERVAL_END` extents with the default pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntervalSummary {
    pub start: String,
    pub end: String,
    pub default: (i32, i32),
}

impl From<&IntervalDimension> for IntervalSummary {
    fn from(dim: &IntervalDimension) -> Self {
        Self {
            start: dim.start_extent(),
            end: dim.end_extent(),
            default: dim.default_interval(),
        }
    }
}

impl LayerSummary {
    pub fn from_descriptor(layer: &LayerDescriptor) -> Self {
        Self {
            name: layer.name.clone(),
            kind: layer.kind,
            customer: layer.customer.clone(),
            title: layer.title.clone(),
            bbox: layer.geographic_bbox,
            crs: layer.crs.iter().map(str::to_string).collect(),
            styles: layer.styles.iter().map(|s| s.name.clone()).collect(),
            time: layer.time_extent(),
            reference_times: layer
                .time
                .as_ref()
                .filter(|_| layer.is_temporal())
                .map_or(0, |t| t.reference_times().len()),
            elevation: layer.elevation.as_ref().map(ElevationSummary::from),
            interval: layer.intervals.as_ref().map(IntervalSummary::from),
        }
    }
}

/// The time `current` stands for on one layer.
///
/// Non-temporal layers have none. A temporal layer without any published
/// time cannot answer `current`.
pub fn resolve_layer_time(
    layer: &LayerDescriptor,
    reference_time: Option<DateTime<Utc>>,
) -> WmsResult<Option<DateTime<Utc>>> {
    if !layer.is_temporal() {
        return Ok(None);
    }
    if !layer.current_value() {
        return Err(WmsError::InvalidDimensionValue(format!(
            "Layer {} has no current time",
            layer.name
        )));
    }
    Ok(layer.most_current_time(reference_time))
}

fn required<'a>(value: &'a Option<String>, param: &str) -> WmsResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| WmsError::MissingParameter(param.to_string()))
}

fn required_dimension<'a>(value: &'a Option<String>, param: &str) -> WmsResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| WmsError::MissingDimensionValue(param.to_string()))
}

fn parse_dimension_int(param: &str, value: &str) -> WmsResult<i32> {
    value.trim().parse().map_err(|_| {
        WmsError::InvalidDimensionValue(format!("{} '{}' is not an integer", param, value))
    })
}

fn parse_interval(start: Option<&str>, end: Option<&str>) -> WmsResult<Option<(i32, i32)>> {
    match (start, end) {
        (None, None) => Ok(None),
        (Some(_), None) => Err(WmsError::MissingDimensionValue(
            "DIM_INTERVAL_END".to_string(),
        )),
        (None, Some(_)) => Err(WmsError::MissingDimensionValue(
            "DIM_INTERVAL_START".to_string(),
        )),
        (Some(s), Some(e)) => Ok(Some((
            parse_dimension_int("DIM_INTERVAL_START", s)?,
            parse_dimension_int("DIM_INTERVAL_END", e)?,
        ))),
    }
}

/// Parse TIME. A lone `current` yields no explicit times.
fn parse_times(text: Option<&str>, now: DateTime<Utc>) -> WmsResult<Vec<DateTime<Utc>>> {
    let Some(text) = text else {
        return Ok(Vec::new());
    };
    let specs = parse_time_list(text)?;
    if specs.len() == 1 && specs[0].is_current() {
        return Ok(Vec::new());
    }
    Ok(expand_time_specs(&specs, now)?)
}

/// Validates WMS requests against the catalog.
pub struct RequestResolver {
    catalog: Arc<LayerCatalog>,
    authorizer: Arc<dyn Authorizer>,
    config: Arc<CatalogConfig>,
}

impl RequestResolver {
    pub fn new(
        catalog: Arc<LayerCatalog>,
        authorizer: Arc<dyn Authorizer>,
        config: Arc<CatalogConfig>,
    ) -> Self {
        Self {
            catalog,
            authorizer,
            config,
        }
    }

    fn check_version(&self, version: &str) -> WmsResult<()> {
        if self.config.supports_version(version) {
            Ok(())
        } else {
            Err(WmsError::UnsupportedVersion(version.to_string()))
        }
    }

    fn check_format(&self, format: &str) -> WmsResult<()> {
        if self.config.supports_map_format(format) {
            Ok(())
        } else {
            Err(WmsError::UnsupportedFormat(format.to_string()))
        }
    }

    pub fn validate_get_map(&self, params: &GetMapParameters) -> WmsResult<ValidatedRequest> {
        self.validate_get_map_at(params, Utc::now())
    }

    /// Validate a GetMap request, expanding `current` in TIME lists to `now`.
    ///
    /// Structural problems are reported first. After that the checks run in
    /// a fixed order: version, then per layer existence, style, CRS,
    /// reference time, each time and elevation, then format, bounding box
    /// and finally the interval dimension.
    pub fn validate_get_map_at(
        &self,
        params: &GetMapParameters,
        now: DateTime<Utc>,
    ) -> WmsResult<ValidatedRequest> {
        let generation = self.catalog.snapshot();

        let pairs = pair_layers_and_styles(params.layers.as_deref(), params.styles.as_deref())?;
        let version = required(&params.version, "VERSION")?;
        let crs = required(&params.crs, "CRS")?;
        let format = required(&params.format, "FORMAT")?;
        let bbox_text = required_dimension(&params.bbox, "BBOX")?;
        let width = parse_size("WIDTH", required_dimension(&params.width, "WIDTH")?)?;
        let height = parse_size("HEIGHT", required_dimension(&params.height, "HEIGHT")?)?;
        let transparent = parse_transparent(params.transparent.as_deref())?;
        let bbox =
            BoundingBox::from_wms_string(bbox_text).map_err(|e| WmsError::InvalidParameter {
                param: "BBOX".to_string(),
                message: e.to_string(),
            })?;
        let times = parse_times(params.time.as_deref(), now)?;
        let reference_time = params
            .reference_time
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;
        let elevation = params
            .elevation
            .as_deref()
            .map(|v| parse_dimension_int("ELEVATION", v))
            .transpose()?;
        let interval = parse_interval(
            params.interval_start.as_deref(),
            params.interval_end.as_deref(),
        )?;

        self.check_version(version)?;

        let mut layers = Vec::with_capacity(pairs.len());
        for (name, style) in &pairs {
            let layer = generation
                .get(name)
                .ok_or_else(|| WmsError::LayerNotFound(name.clone()))?;

            if !layer.is_valid_style(style) {
                return Err(WmsError::StyleNotFound {
                    layer: name.clone(),
                    style: style.clone(),
                });
            }
            if !layer.is_valid_crs(crs) {
                return Err(WmsError::InvalidCrs {
                    layer: name.clone(),
                    crs: crs.to_string(),
                });
            }
            if let Some(reference) = reference_time {
                if !layer.is_valid_reference_time(reference) {
                    return Err(WmsError::InvalidDimensionValue(format!(
                        "Reference time {} is not available for layer {}",
                        reference.to_rfc3339(),
                        name
                    )));
                }
            }
            if let Some(t) = times.iter().find(|t| !layer.is_valid_time(**t, reference_time)) {
                return Err(WmsError::InvalidDimensionValue(format!(
                    "Time {} is not available for layer {}",
                    t.to_rfc3339(),
                    name
                )));
            }
            if let Some(value) = elevation {
                if !layer.is_valid_elevation(value) {
                    return Err(WmsError::InvalidDimensionValue(format!(
                        "Elevation {} is not available for layer {}",
                        value, name
                    )));
                }
            }
            layers.push(Arc::clone(layer));
        }

        self.check_format(format)?;

        if !bbox.is_valid() {
            return Err(WmsError::InvalidBbox(bbox_text.to_string()));
        }

        if let Some((start, end)) = interval {
            if let Some(layer) = layers.iter().find(|l| !l.is_valid_interval(start, end)) {
                return Err(WmsError::InvalidDimensionValue(format!(
                    "Interval {}/{} is not available for layer {}",
                    start, end, layer.name
                )));
            }
        }

        let mut resolved = Vec::with_capacity(layers.len());
        for ((_, style), layer) in pairs.into_iter().zip(layers) {
            let current_time = if times.is_empty() {
                resolve_layer_time(&layer, reference_time)?
            } else {
                None
            };
            resolved.push(ResolvedLayer {
                layer,
                style: if style.is_empty() {
                    DEFAULT_STYLE.to_string()
                } else {
                    style
                },
                current_time,
            });
        }

        Ok(ValidatedRequest {
            version: version.to_string(),
            layers: resolved,
            crs: crs.to_string(),
            bbox,
            width,
            height,
            format: format.to_string(),
            transparent,
            times,
            reference_time,
            elevation,
            interval,
        })
    }

    /// All requested layers must be accessible with `apikey`.
    pub fn validate_get_map_authorization(
        &self,
        apikey: &str,
        params: &GetMapParameters,
    ) -> WmsResult<()> {
        let layers = split_list(params.layers.as_deref().unwrap_or_default());
        if self.authorizer.authorize(apikey, &layers, "wms") {
            Ok(())
        } else {
            Err(WmsError::AccessDenied(
                "API key is not authorized for the requested layers".to_string(),
            ))
        }
    }

    pub fn validate_get_legend_graphic(
        &self,
        params: &GetLegendGraphicParameters,
    ) -> WmsResult<LegendRequest> {
        let generation = self.catalog.snapshot();

        if let Some(version) = params.version.as_deref() {
            self.check_version(version)?;
        }

        let name = required(&params.layer, "LAYER")?;
        let layer = generation
            .get(name)
            .ok_or_else(|| WmsError::LayerNotFound(name.to_string()))?;

        let style = params.style.as_deref().unwrap_or_default().trim();
        if !layer.is_valid_style(style) {
            return Err(WmsError::StyleNotFound {
                layer: name.to_string(),
                style: style.to_string(),
            });
        }

        let format = params.format.as_deref().unwrap_or(DEFAULT_LEGEND_FORMAT);
        self.check_format(format)?;

        let width = params
            .width
            .as_deref()
            .map(|v| parse_size("WIDTH", v))
            .transpose()?;
        let height = params
            .height
            .as_deref()
            .map(|v| parse_size("HEIGHT", v))
            .transpose()?;

        Ok(LegendRequest {
            layer: Arc::clone(layer),
            style: if style.is_empty() {
                DEFAULT_STYLE.to_string()
            } else {
                style.to_string()
            },
            format: format.to_string(),
            width,
            height,
        })
    }

    /// Layers a capabilities document lists for this request.
    ///
    /// Hidden layers are never listed. With an API key, only authorized
    /// layers are listed, and nothing at all unless `authenticate` is set.
    pub fn capabilities(&self, request: &CapabilitiesRequest) -> CapabilitiesView {
        let generation = self.catalog.snapshot();
        let mut view = CapabilitiesView {
            generation: generation.number(),
            hierarchy: request.hierarchy,
            layers: Vec::new(),
        };

        if request.apikey.is_some() && !request.authenticate {
            return view;
        }

        view.layers = generation
            .layers()
            .filter(|layer| !layer.hidden)
            .filter(|layer| {
                request
                    .namespace
                    .as_ref()
                    .map_or(true, |filter| filter.matches(&layer.name))
            })
            .filter(|layer| match &request.apikey {
                Some(key) => self
                    .authorizer
                    .authorize(key, std::slice::from_ref(&layer.name), "wms"),
                None => true,
            })
            .cloned()
            .collect();
        view
    }
}
