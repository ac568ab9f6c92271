//! WMS GetMap request parameters.
//!
//! Values are kept as raw strings; the layer catalog decides which of them
//! are valid. Helpers here only handle the request-level structure.

use serde::Deserialize;
use wms_common::{WmsError, WmsResult};

/// Raw GetMap query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetMapParameters {
    #[serde(rename = "VERSION", alias = "version")]
    pub version: Option<String>,
    #[serde(rename = "LAYERS", alias = "layers")]
    pub layers: Option<String>,
    #[serde(rename = "STYLES", alias = "styles")]
    pub styles: Option<String>,
    #[serde(rename = "CRS", alias = "SRS", alias = "crs", alias = "srs")]
    pub crs: Option<String>,
    #[serde(rename = "BBOX", alias = "bbox")]
    pub bbox: Option<String>,
    #[serde(rename = "WIDTH", alias = "width")]
    pub width: Option<String>,
    #[serde(rename = "HEIGHT", alias = "height")]
    pub height: Option<String>,
    #[serde(rename = "FORMAT", alias = "format")]
    pub format: Option<String>,
    #[serde(rename = "TRANSPARENT", alias = "transparent")]
    pub transparent: Option<String>,
    #[serde(rename = "TIME", alias = "time")]
    pub time: Option<String>,
    /// Reference (origin) time of a forecast run
    #[serde(rename = "REFERENCE_TIME", alias = "reference_time", alias = "ORIGINTIME", alias = "origintime")]
    pub reference_time: Option<String>,
    #[serde(rename = "ELEVATION", alias = "elevation")]
    pub elevation: Option<String>,
    #[serde(rename = "DIM_INTERVAL_START", alias = "dim_interval_start")]
    pub interval_start: Option<String>,
    #[serde(rename = "DIM_INTERVAL_END", alias = "dim_interval_end")]
    pub interval_end: Option<String>,
}

impl GetMapParameters {
    /// Collect parameters from decoded query pairs. Keys are case-insensitive,
    /// unknown keys are ignored and the last occurrence of a key wins.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_ref().to_ascii_uppercase().as_str() {
                "VERSION" => &mut params.version,
                "LAYERS" => &mut params.layers,
                "STYLES" => &mut params.styles,
                "CRS" | "SRS" => &mut params.crs,
                "BBOX" => &mut params.bbox,
                "WIDTH" => &mut params.width,
                "HEIGHT" => &mut params.height,
                "FORMAT" => &mut params.format,
                "TRANSPARENT" => &mut params.transparent,
                "TIME" => &mut params.time,
                "REFERENCE_TIME" | "ORIGINTIME" => &mut params.reference_time,
                "ELEVATION" => &mut params.elevation,
                "DIM_INTERVAL_START" => &mut params.interval_start,
                "DIM_INTERVAL_END" => &mut params.interval_end,
                _ => continue,
            };
            *slot = Some(value.into());
        }
        params
    }
}

/// Split a comma separated parameter. An empty string is an empty list.
pub fn split_list(value: &str) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }
    value.split(',').map(|s| s.trim().to_string()).collect()
}

/// Pair LAYERS with STYLES.
///
/// Omitted or empty STYLES selects the default style for every layer;
/// otherwise both lists must have the same length.
pub fn pair_layers_and_styles(
    layers: Option<&str>,
    styles: Option<&str>,
) -> WmsResult<Vec<(String, String)>> {
    let layers = split_list(layers.unwrap_or_default());
    if layers.is_empty() || layers.iter().any(String::is_empty) {
        return Err(WmsError::MissingLayers);
    }

    let styles = match styles.map(split_list) {
        Some(styles) if !styles.is_empty() => styles,
        _ => vec![String::new(); layers.len()],
    };

    if styles.len() != layers.len() {
        return Err(WmsError::LayerStyleMismatch {
            layers: layers.len(),
            styles: styles.len(),
        });
    }

    Ok(layers.into_iter().zip(styles).collect())
}

/// Parse TRANSPARENT. Absent means opaque.
pub fn parse_transparent(value: Option<&str>) -> WmsResult<bool> {
    match value {
        None => Ok(false),
        Some(v) if v.eq_ignore_ascii_case("TRUE") => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("FALSE") => Ok(false),
        Some(v) => Err(WmsError::InvalidParameter {
            param: "TRANSPARENT".to_string(),
            message: format!("expected TRUE or FALSE, got '{}'", v),
        }),
    }
}

/// Parse WIDTH or HEIGHT as a positive pixel count.
pub fn parse_size(param: &str, value: &str) -> WmsResult<u32> {
    match value.trim().parse::<u32>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(WmsError::InvalidParameter {
            param: param.to_string(),
            message: format!("'{}' is not a positive integer", value),
        }),
    }
}
