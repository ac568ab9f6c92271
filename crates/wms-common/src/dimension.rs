//! Elevation and generic interval dimensions.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Vertical coordinate kind of an elevation dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelType {
    Pressure,
    FlightLevel,
    Altitude,
    Height,
    Depth,
    #[serde(other)]
    Other,
}

impl LevelType {
    /// Unit symbol published with the dimension.
    pub fn unit_symbol(&self) -> Option<&'static str> {
        match self {
            LevelType::Pressure => Some("hPa"),
            LevelType::FlightLevel => Some("ft100"),
            LevelType::Altitude | LevelType::Height | LevelType::Depth => Some("m"),
            LevelType::Other => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LevelType::Pressure => "pressure",
            LevelType::FlightLevel => "flight_level",
            LevelType::Altitude => "altitude",
            LevelType::Height => "height",
            LevelType::Depth => "depth",
            LevelType::Other => "other",
        }
    }
}

impl fmt::Display for LevelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Admissible ELEVATION values of a layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElevationDimension {
    level_type: LevelType,
    values: BTreeSet<i32>,
    default: i32,
}

impl ElevationDimension {
    /// The default is the highest pressure level (closest to the ground) or the
    /// lowest value for other level types. Returns `None` for an empty set.
    pub fn new(level_type: LevelType, values: impl IntoIterator<Item = i32>) -> Option<Self> {
        let values: BTreeSet<i32> = values.into_iter().collect();
        let default = match level_type {
            LevelType::Pressure => *values.last()?,
            _ => *values.first()?,
        };
        Some(Self {
            level_type,
            values,
            default,
        })
    }

    pub fn level_type(&self) -> &LevelType {
        &self.level_type
    }

    pub fn units(&self) -> Option<&'static str> {
        self.level_type.unit_symbol()
    }

    pub fn default_elevation(&self) -> i32 {
        self.default
    }

    pub fn values(&self) -> impl Iterator<Item = i32> + '_ {
        self.values.iter().copied()
    }

    pub fn is_valid_elevation(&self, value: i32) -> bool {
        self.values.contains(&value)
    }

    /// A dimension worth publishing: not just the surface placeholder level.
    pub fn is_ok(&self) -> bool {
        !(self.values.len() == 1 && self.values.contains(&0))
            && self.level_type != LevelType::Other
    }

    /// Comma separated values as published in capabilities.
    pub fn extent(&self) -> String {
        self.values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// One admissible `DIM_INTERVAL_START`/`DIM_INTERVAL_END` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalItem {
    pub start: i32,
    pub end: i32,
    #[serde(default)]
    pub default: bool,
}

/// Admissible interval pairs of a layer, e.g. accumulation periods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntervalDimension {
    items: Vec<IntervalItem>,
}

impl IntervalDimension {
    /// Returns `None` for an empty list.
    pub fn new(items: Vec<IntervalItem>) -> Option<Self> {
        (!items.is_empty()).then_some(Self { items })
    }

    pub fn items(&self) -> &[IntervalItem] {
        &self.items
    }

    pub fn is_valid_interval(&self, start: i32, end: i32) -> bool {
        self.items.iter().any(|i| i.start == start && i.end == end)
    }

    /// The flagged default pair, or the first one.
    pub fn default_interval(&self) -> (i32, i32) {
        let item = self
            .items
            .iter()
            .find(|i| i.default)
            .unwrap_or(&self.items[0]);
        (item.start, item.end)
    }

    pub fn start_extent(&self) -> String {
        join_values(self.items.iter().map(|i| i.start))
    }

    pub fn end_extent(&self) -> String {
        join_values(self.items.iter().map(|i| i.end))
    }
}

fn join_values(values: impl Iterator<Item = i32>) -> String {
    values.map(|v| v.to_string()).collect::<Vec<_>>().join(",")
}
