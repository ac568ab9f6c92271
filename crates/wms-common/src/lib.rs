//! Common types shared by the WMS protocol and layer catalog crates.

pub mod bbox;
pub mod crs;
pub mod dimension;
pub mod error;
pub mod layer;
pub mod time;
pub mod time_dimension;

pub use bbox::BoundingBox;
pub use crs::{CrsSet, SupportedReference};
pub use dimension::{ElevationDimension, IntervalDimension, IntervalItem, LevelType};
pub use error::{ExceptionCode, WmsError, WmsResult};
pub use layer::{LayerDescriptor, LayerKind, LayerStyle, LegendUrl, DEFAULT_STYLE};
pub use time::{TimeParseError, TimeSpec};
pub use time_dimension::{TimeDimension, TimeDimensions, TimeInterval};
