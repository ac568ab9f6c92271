//! API key authorization.

use std::collections::HashMap;

/// Decides whether an API key may access a set of layers.
pub trait Authorizer: Send + Sync {
    /// True only when every layer in `layers` is accessible with `apikey`.
    fn authorize(&self, apikey: &str, layers: &[String], service: &str) -> bool;
}

/// Accepts every key.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _apikey: &str, _layers: &[String], _service: &str) -> bool {
        true
    }
}

/// Fixed grants per API key.
///
/// A grant is an exact layer name, a namespace followed by `:*`, or `*`.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthorizer {
    grants: HashMap<String, Vec<String>>,
}

impl StaticAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, apikey: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.grants
            .entry(apikey.into())
            .or_default()
            .push(pattern.into());
        self
    }

    fn allows(pattern: &str, layer: &str) -> bool {
        match pattern.strip_suffix('*') {
            Some("") => true,
            Some(prefix) if prefix.ends_with(':') => layer.starts_with(prefix),
            _ => pattern == layer,
        }
    }
}

impl Authorizer for StaticAuthorizer {
    fn authorize(&self, apikey: &str, layers: &[String], _service: &str) -> bool {
        self.grants.get(apikey).is_some_and(|patterns| {
            layers
                .iter()
                .all(|layer| patterns.iter().any(|p| Self::allows(p, layer)))
        })
    }
}
