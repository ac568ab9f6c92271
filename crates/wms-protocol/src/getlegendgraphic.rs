//! WMS GetLegendGraphic request parameters.

use serde::Deserialize;

/// Raw GetLegendGraphic query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetLegendGraphicParameters {
    #[serde(rename = "VERSION", alias = "version")]
    pub version: Option<String>,
    #[serde(rename = "LAYER", alias = "layer")]
    pub layer: Option<String>,
    #[serde(rename = "STYLE", alias = "style")]
    pub style: Option<String>,
    #[serde(rename = "FORMAT", alias = "format")]
    pub format: Option<String>,
    #[serde(rename = "WIDTH", alias = "width")]
    pub width: Option<String>,
    #[serde(rename = "HEIGHT", alias = "height")]
    pub height: Option<String>,
}

impl GetLegendGraphicParameters {
    /// Collect parameters from decoded query pairs, ignoring key case.
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
                "LAYER" => &mut params.layer,
                "STYLE" => &mut params.style,
                "FORMAT" => &mut params.format,
                "WIDTH" => &mut params.width,
                "HEIGHT" => &mut params.height,
                _ => continue,
            };
            *slot = Some(value.into());
        }
        params
    }
}
