//! Published layer descriptors.

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dimension::{ElevationDimension, IntervalDimension};
use crate::time_dimension::TimeDimensions;
use crate::{BoundingBox, CrsSet};

/// Name of the style used when a request leaves STYLES empty.
pub const DEFAULT_STYLE: &str = "default";

/// Backend kind of a layer. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    /// Static map without a time axis
    Map,
    /// Vector features from a spatial database
    VectorStore,
    /// Gridded model forecasts, one generation per model run
    GriddedForecast,
    /// Station observations up to the present
    StationObservation,
    /// Raw model output files with a flat valid-time list
    RawModelOutput,
}

impl LayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Map => "map",
            LayerKind::VectorStore => "vector_store",
            LayerKind::GriddedForecast => "gridded_forecast",
            LayerKind::StationObservation => "station_observation",
            LayerKind::RawModelOutput => "raw_model_output",
        }
    }

    /// Kinds that publish without any time axis.
    pub fn may_be_timeless(&self) -> bool {
        matches!(self, LayerKind::Map | LayerKind::VectorStore)
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Legend graphic reference of a style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendUrl {
    #[serde(default = "default_legend_format")]
    pub format: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub online_resource: Option<String>,
}

fn default_legend_format() -> String {
    "image/png".to_string()
}

/// A named style of a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerStyle {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub legend_url: Option<LegendUrl>,
}

impl LayerStyle {
    /// The style every layer gets when its definition lists none.
    pub fn default_for(layer_name: &str) -> Self {
        Self {
            name: DEFAULT_STYLE.to_string(),
            title: Some(format!("{} default style", layer_name)),
            abstract_text: None,
            legend_url: None,
        }
    }
}

/// An immutable, published layer.
///
/// Descriptors are built once per refresh and never modified afterwards.
#[derive(Debug, Clone)]
pub struct LayerDescriptor {
    pub kind: LayerKind,
    /// Full name, `namespace:layer`
    pub name: String,
    pub title: String,
    pub abstract_text: Option<String>,
    pub customer: String,
    pub product_file: PathBuf,
    pub hidden: bool,
    pub queryable: bool,
    pub opaque: bool,
    pub cascaded: bool,
    pub keywords: Vec<String>,
    pub crs: CrsSet,
    pub styles: Vec<LayerStyle>,
    /// Extent in lon/lat
    pub geographic_bbox: BoundingBox,
    pub time: Option<TimeDimensions>,
    /// Set when the definition turns the time axis off
    pub time_disabled: bool,
    pub elevation: Option<ElevationDimension>,
    pub intervals: Option<IntervalDimension>,
    /// Legend settings carried through for legend rendering
    pub legend: Vec<serde_json::Value>,
    /// When the backend was last probed
    pub metadata_updated: DateTime<Utc>,
    /// Seconds a probe result stays fresh, if the definition allows reuse
    pub metadata_update_interval: Option<u64>,
    /// Modification time of the definition file at build time
    pub definition_modified: Option<SystemTime>,
}

impl LayerDescriptor {
    /// Namespace part of the name.
    pub fn namespace(&self) -> &str {
        self.name.rsplit_once(':').map_or("", |(ns, _)| ns)
    }

    pub fn is_temporal(&self) -> bool {
        !self.time_disabled && self.time.is_some()
    }

    fn temporal_time(&self) -> Option<&TimeDimensions> {
        self.time.as_ref().filter(|_| !self.time_disabled)
    }

    /// An empty style name or the default style is always accepted.
    pub fn is_valid_style(&self, style: &str) -> bool {
        style.is_empty()
            || style.eq_ignore_ascii_case(DEFAULT_STYLE)
            || self.styles.iter().any(|s| s.name == style)
    }

    pub fn is_valid_crs(&self, crs: &str) -> bool {
        self.crs.contains(crs)
    }

    /// Non-temporal layers accept any time.
    pub fn is_valid_time(&self, t: DateTime<Utc>, reference: Option<DateTime<Utc>>) -> bool {
        self.temporal_time()
            .map_or(true, |dims| dims.is_valid_time(t, reference))
    }

    pub fn is_valid_reference_time(&self, reference: DateTime<Utc>) -> bool {
        self.temporal_time()
            .map_or(true, |dims| dims.is_valid_reference_time(reference))
    }

    pub fn is_valid_elevation(&self, value: i32) -> bool {
        self.elevation
            .as_ref()
            .map_or(true, |e| e.is_valid_elevation(value))
    }

    pub fn is_valid_interval(&self, start: i32, end: i32) -> bool {
        self.intervals
            .as_ref()
            .map_or(true, |i| i.is_valid_interval(start, end))
    }

    pub fn current_value(&self) -> bool {
        self.temporal_time().map_or(true, TimeDimensions::current_value)
    }

    pub fn most_current_time(&self, reference: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        self.temporal_time()?.most_current_time(reference)
    }

    /// Time extent of the default generation, if temporal.
    pub fn time_extent(&self) -> Option<String> {
        self.temporal_time()?.extent()
    }

    /// Whether a probe result taken at `metadata_updated` is still fresh at `now`.
    pub fn metadata_is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.metadata_update_interval.is_some_and(|secs| {
            let age = now - self.metadata_updated;
            age.num_seconds() >= 0 && (age.num_seconds() as u64) < secs
        })
    }
}
