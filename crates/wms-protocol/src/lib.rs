//! OGC WMS request parameter handling.
//!
//! Parses the request-level structure of GetMap, GetLegendGraphic and
//! GetCapabilities. Catalog-aware validation lives in the catalog service.

pub mod capabilities;
pub mod getlegendgraphic;
pub mod getmap;

pub use capabilities::{CapabilitiesParseError, CapabilitiesRequest, HierarchyType, NamespaceFilter};
pub use getlegendgraphic::GetLegendGraphicParameters;
pub use getmap::{pair_layers_and_styles, parse_size, parse_transparent, split_list, GetMapParameters};
