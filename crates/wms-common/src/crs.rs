//! Coordinate reference systems a layer can be requested in.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::BoundingBox;

/// A spatial reference the service is configured to publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportedReference {
    /// Identifier as used in the CRS parameter, e.g. "EPSG:3857"
    pub id: String,
    /// Whether coordinates are lon/lat degrees
    #[serde(default)]
    pub geographic: bool,
    /// Valid area in lon/lat
    #[serde(default = "BoundingBox::world")]
    pub bbox: BoundingBox,
    /// Disabled references are known but only published when a layer enables them
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl SupportedReference {
    pub fn new(id: impl Into<String>, geographic: bool, bbox: BoundingBox, enabled: bool) -> Self {
        Self {
            id: id.into(),
            geographic,
            bbox,
            enabled,
        }
    }

    /// References published when nothing is configured.
    pub fn defaults() -> Vec<SupportedReference> {
        vec![
            Self::new("EPSG:4326", true, BoundingBox::world(), true),
            Self::new("CRS:84", true, BoundingBox::world(), true),
            Self::new(
                "EPSG:3857",
                false,
                BoundingBox::new(-180.0, -85.051129, 180.0, 85.051129),
                true,
            ),
            Self::new(
                "EPSG:3035",
                false,
                BoundingBox::new(-10.67, 34.5, 31.55, 71.05),
                false,
            ),
        ]
    }
}

/// Normalize a CRS identifier for comparison ("epsg:4326" == "EPSG:4326").
pub fn normalize_crs(id: &str) -> String {
    id.trim().to_ascii_uppercase()
}

/// The set of CRS identifiers accepted by one layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrsSet {
    ids: BTreeSet<String>,
}

impl CrsSet {
    /// Start from the enabled subset of the catalog-wide references.
    pub fn from_references(references: &[SupportedReference]) -> Self {
        Self {
            ids: references
                .iter()
                .filter(|r| r.enabled)
                .map(|r| normalize_crs(&r.id))
                .collect(),
        }
    }

    /// Enable a reference for this layer. Only known references can be enabled.
    pub fn enable(&mut self, id: &str, references: &[SupportedReference]) -> bool {
        let id = normalize_crs(id);
        if references.iter().any(|r| normalize_crs(&r.id) == id) {
            self.ids.insert(id);
            true
        } else {
            false
        }
    }

    pub fn disable(&mut self, id: &str) {
        self.ids.remove(&normalize_crs(id));
    }

    /// Add a reference unconditionally (e.g. the layer's own projection).
    pub fn insert(&mut self, id: &str) {
        self.ids.insert(normalize_crs(id));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(&normalize_crs(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_skip_disabled() {
        let set = CrsSet::from_references(&SupportedReference::defaults());
        assert!(set.contains("EPSG:4326"));
        assert!(set.contains("epsg:3857"));
        assert!(set.contains("crs:84"));
        assert!(!set.contains("EPSG:3035"));
    }

    #[test]
    fn test_enable_and_disable() {
        let refs = SupportedReference::defaults();
        let mut set = CrsSet::from_references(&refs);

        assert!(set.enable("EPSG:3035", &refs));
        assert!(!set.enable("EPSG:99999", &refs));
        set.disable("EPSG:3857");

        assert!(set.contains("EPSG:3035"));
        assert!(!set.contains("EPSG:99999"));
        assert!(!set.contains("EPSG:3857"));
    }
}
