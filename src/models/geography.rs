//! Geography types and boundary editions.
//!
//! A code is only meaningful for a specific (geography type, boundary
//! edition) pair; codes from different editions of the same type are not
//! comparable and must go through the edition mapper.

use serde::{Deserialize, Serialize};

/// A geography type pinned to a boundary edition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Geography {
    /// Lower-layer super output area, 2011 edition
    Lsoa11,
    /// Parliamentary constituency, 2010 boundaries
    Parl10,
    /// Parliamentary constituency, 2021 boundaries
    Parl21,
    /// Local authority district, 2023 edition
    Lad23,
}

impl Geography {
    /// Canonical short name, used in artifact file names and CSV headers
    pub fn as_str(&self) -> &'static str {
        match self {
            Geography::Lsoa11 => "LSOA11",
            Geography::Parl10 => "PARL10",
            Geography::Parl21 => "PARL21",
            Geography::Lad23 => "LAD23",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "LSOA11" => Some(Geography::Lsoa11),
            "PARL10" => Some(Geography::Parl10),
            "PARL21" => Some(Geography::Parl21),
            "LAD23" => Some(Geography::Lad23),
            _ => None,
        }
    }
}

impl std::fmt::Display for Geography {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the numeric columns of a survey table are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Fractions in 0..=1 (sum-to-one not required)
    Percentage,
    /// Raw counts
    Absolute,
}

/// Which overlap fraction column drives a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapMeasure {
    Area,
    Population,
}

impl OverlapMeasure {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverlapMeasure::Area => "area",
            OverlapMeasure::Population => "population",
        }
    }
}
