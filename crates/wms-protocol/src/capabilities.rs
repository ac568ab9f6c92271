//! GetCapabilities request options.

use std::fmt;
use std::str::FromStr;

use regex::{Regex, RegexBuilder};
use serde::Deserialize;

/// Shape of the layer tree in a capabilities document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum HierarchyType {
    /// Every layer at the top level
    #[default]
    #[serde(rename = "flat")]
    Flat,
    /// Layers nested by namespace
    #[serde(rename = "recursive")]
    Recursive,
    /// Nested, with one sublayer per time step
    #[serde(rename = "recursivetimes")]
    RecursiveWithTimes,
}

impl HierarchyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HierarchyType::Flat => "flat",
            HierarchyType::Recursive => "recursive",
            HierarchyType::RecursiveWithTimes => "recursivetimes",
        }
    }
}

impl fmt::Display for HierarchyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CapabilitiesParseError {
    #[error("Invalid layout '{0}', expected flat, recursive or recursivetimes")]
    InvalidLayout(String),

    #[error("Invalid namespace pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

impl FromStr for HierarchyType {
    type Err = CapabilitiesParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flat" => Ok(HierarchyType::Flat),
            "recursive" => Ok(HierarchyType::Recursive),
            "recursivetimes" => Ok(HierarchyType::RecursiveWithTimes),
            _ => Err(CapabilitiesParseError::InvalidLayout(s.to_string())),
        }
    }
}

/// Restricts a capabilities listing to part of the layer namespace.
///
/// `/pattern/` is a case-insensitive regular expression matched against the
/// full layer name; anything else selects a namespace and its sublayers.
#[derive(Debug, Clone)]
pub enum NamespaceFilter {
    Pattern(Regex),
    Namespace(String),
}

impl NamespaceFilter {
    pub fn parse(value: &str) -> Result<Self, CapabilitiesParseError> {
        let value = value.trim();
        match value
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
        {
            Some(pattern) if !pattern.is_empty() => RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map(NamespaceFilter::Pattern)
                .map_err(|e| CapabilitiesParseError::InvalidPattern {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                }),
            _ => Ok(NamespaceFilter::Namespace(value.to_string())),
        }
    }

    pub fn matches(&self, layer_name: &str) -> bool {
        match self {
            NamespaceFilter::Pattern(re) => re.is_match(layer_name),
            NamespaceFilter::Namespace(ns) => {
                let name = layer_name.to_ascii_lowercase();
                let ns = ns.to_ascii_lowercase();
                name == ns || name.starts_with(&format!("{}:", ns))
            }
        }
    }
}

/// Options of a GetCapabilities request.
#[derive(Debug, Clone, Default)]
pub struct CapabilitiesRequest {
    pub apikey: Option<String>,
    pub authenticate: bool,
    pub hierarchy: HierarchyType,
    pub namespace: Option<NamespaceFilter>,
}

impl CapabilitiesRequest {
    pub fn new(hierarchy: HierarchyType) -> Self {
        Self {
            hierarchy,
            ..Self::default()
        }
    }

    pub fn with_apikey(mut self, apikey: impl Into<String>, authenticate: bool) -> Self {
        self.apikey = Some(apikey.into());
        self.authenticate = authenticate;
        self
    }

    pub fn with_namespace(mut self, filter: NamespaceFilter) -> Self {
        self.namespace = Some(filter);
        self
    }
}
