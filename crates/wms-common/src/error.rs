//! Error types for request validation against the layer catalog.

use std::fmt;

use thiserror::Error;

use crate::time::TimeParseError;

/// Result type alias using WmsError.
pub type WmsResult<T> = Result<T, WmsError>;

/// OGC WMS exception codes reported back to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionCode {
    InvalidFormat,
    InvalidCrs,
    LayerNotDefined,
    StyleNotDefined,
    InvalidDimensionValue,
    MissingDimensionValue,
    OperationNotSupported,
    /// No specific code applies.
    Void,
}

impl ExceptionCode {
    /// The code string as it appears in a ServiceExceptionReport.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExceptionCode::InvalidFormat => "InvalidFormat",
            ExceptionCode::InvalidCrs => "InvalidCRS",
            ExceptionCode::LayerNotDefined => "LayerNotDefined",
            ExceptionCode::StyleNotDefined => "StyleNotDefined",
            ExceptionCode::InvalidDimensionValue => "InvalidDimensionValue",
            ExceptionCode::MissingDimensionValue => "MissingDimensionValue",
            ExceptionCode::OperationNotSupported => "OperationNotSupported",
            ExceptionCode::Void => "NoApplicableCode",
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation failure for a client supplied WMS parameter.
#[derive(Debug, Error)]
pub enum WmsError {
    // === Request structure ===
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Missing required parameter: LAYERS")]
    MissingLayers,

    #[error("Missing dimension value: {0}")]
    MissingDimensionValue(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("LAYERS and STYLES amount mismatch: {layers} layers, {styles} styles")]
    LayerStyleMismatch { layers: usize, styles: usize },

    // === Catalog checks ===
    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    #[error("Style '{style}' is not defined for layer '{layer}'")]
    StyleNotFound { layer: String, style: String },

    #[error("CRS '{crs}' is not supported by layer '{layer}'")]
    InvalidCrs { layer: String, crs: String },

    #[error("Invalid dimension value: {0}")]
    InvalidDimensionValue(String),

    #[error("Invalid BBOX: {0}")]
    InvalidBbox(String),

    #[error("Requested format not supported: {0}")]
    UnsupportedFormat(String),

    #[error("Unsupported WMS version: {0}")]
    UnsupportedVersion(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl WmsError {
    /// Get the exception code for this error.
    pub fn exception_code(&self) -> ExceptionCode {
        match self {
            WmsError::MissingLayers | WmsError::LayerNotFound(_) => ExceptionCode::LayerNotDefined,
            WmsError::StyleNotFound { .. } => ExceptionCode::StyleNotDefined,
            WmsError::InvalidCrs { .. } => ExceptionCode::InvalidCrs,
            WmsError::InvalidDimensionValue(_) | WmsError::InvalidBbox(_) => {
                ExceptionCode::InvalidDimensionValue
            }
            WmsError::MissingDimensionValue(_) => ExceptionCode::MissingDimensionValue,
            WmsError::UnsupportedFormat(_) => ExceptionCode::InvalidFormat,
            WmsError::UnsupportedVersion(_) => ExceptionCode::OperationNotSupported,
            WmsError::MissingParameter(_)
            | WmsError::InvalidParameter { .. }
            | WmsError::LayerStyleMismatch { .. }
            | WmsError::AccessDenied(_)
            | WmsError::InternalError(_) => ExceptionCode::Void,
        }
    }

    /// Get the OGC WMS exception code string for this error.
    pub fn wms_exception_code(&self) -> &'static str {
        self.exception_code().as_str()
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            WmsError::LayerNotFound(_) | WmsError::StyleNotFound { .. } => 404,
            WmsError::AccessDenied(_) => 403,
            WmsError::InternalError(_) => 500,
            _ => 400,
        }
    }
}

impl From<TimeParseError> for WmsError {
    fn from(err: TimeParseError) -> Self {
        WmsError::InvalidDimensionValue(err.to_string())
    }
}
