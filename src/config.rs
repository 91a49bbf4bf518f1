//! Pipeline configuration.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::Geography;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Interim artifact directory (checkpoints between stages)
    pub interim_dir: PathBuf,
    /// Reference date for council hierarchy lookups
    pub reference_date: NaiveDate,
    pub boundaries: BoundariesConfig,
    pub population: PopulationConfig,
    pub registry: RegistryConfig,
    #[serde(default)]
    pub datasets: Vec<DatasetConfig>,
    /// Base URL for published overlap artifacts, used when the interim
    /// artifact is absent
    pub overlap_base_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BoundariesConfig {
    pub source_geography: Geography,
    pub target_geography: Geography,
    /// Source boundary GeoJSON and its code/name property keys
    pub source_file: PathBuf,
    pub source_code_key: String,
    pub source_name_key: Option<String>,
    pub target_file: PathBuf,
    pub target_code_key: String,
    pub target_name_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PopulationConfig {
    /// Fine-unit (LSOA) population CSV, optionally gzipped
    pub unit_populations: PathBuf,
    /// Postcode directory CSV mapping postcodes to unit/source/target codes
    pub postcode_directory: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegistryConfig {
    pub url: String,
    #[serde(default = "default_true")]
    pub include_historical: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatasetConfig {
    /// Short name used for output files and the source column
    pub name: String,
    pub file: PathBuf,
    /// Geography-code column (must be the survey's first column)
    pub key_column: String,
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Artifact name for the merged overlap table
    pub fn overlap_artifact_name(&self) -> String {
        format!(
            "{}_{}_combo_overlap.csv",
            self.boundaries.source_geography.as_str(),
            self.boundaries.target_geography.as_str()
        )
    }
}
