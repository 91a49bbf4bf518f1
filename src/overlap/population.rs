//! Population-based overlap fractions via a postcode directory.
//!
//! Population is not known at polygon granularity, so it is estimated
//! through LSOAs: the directory maps each postcode to its LSOA, source
//! geography and target geography, and the LSOA's population is spread
//! evenly over its postcodes. Summing those per-postcode averages by
//! (source, target) and by source gives the population overlap fraction.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use hashbrown::{HashMap, HashSet};
use tracing::info;

use crate::error::Error;

/// One postcode directory row: postcode, fine unit, source and target codes.
#[derive(Debug, Clone)]
pub struct PostcodeRecord {
    pub postcode: String,
    pub unit: String,
    pub source: String,
    pub target: String,
}

fn open_maybe_gz(path: &Path) -> Result<Box<dyn Read>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    if path.extension().map_or(false, |e| e == "gz") {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Load the fine-unit population table (columns `lsoa`, `pop`).
/// Thousands separators in the population column are tolerated.
pub fn load_unit_populations<R: Read>(reader: R, table_name: &str) -> Result<HashMap<String, f64>> {
    let mut csv_reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let unit_idx = headers
        .iter()
        .position(|h| h == "lsoa")
        .ok_or_else(|| Error::schema(table_name, "lsoa"))?;
    let pop_idx = headers
        .iter()
        .position(|h| h == "pop")
        .ok_or_else(|| Error::schema(table_name, "pop"))?;

    let mut populations = HashMap::new();
    for result in csv_reader.records() {
        let record = result?;
        let unit = record[unit_idx].to_string();
        let raw = record[pop_idx].replace(',', "");
        let pop: f64 = raw
            .trim()
            .parse()
            .with_context(|| format!("non-numeric population '{}' for unit '{}'", raw, unit))?;
        populations.insert(unit, pop);
    }

    info!("Loaded {} unit populations from {}", populations.len(), table_name);
    Ok(populations)
}

pub fn load_unit_populations_path(path: &Path) -> Result<HashMap<String, f64>> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unit populations")
        .to_string();
    load_unit_populations(open_maybe_gz(path)?, &name)
}

/// Load the postcode directory (columns `pcd`, `lsoa11`, `pcon`, `oslaua`).
pub fn load_postcode_directory<R: Read>(reader: R, table_name: &str) -> Result<Vec<PostcodeRecord>> {
    let mut csv_reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let col = |name: &str| -> Result<usize, Error> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::schema(table_name, name))
    };
    let pcd_idx = col("pcd")?;
    let unit_idx = col("lsoa11")?;
    let source_idx = col("pcon")?;
    let target_idx = col("oslaua")?;

    let mut records = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        records.push(PostcodeRecord {
            postcode: record[pcd_idx].to_string(),
            unit: record[unit_idx].to_string(),
            source: record[source_idx].to_string(),
            target: record[target_idx].to_string(),
        });
    }

    info!("Loaded {} postcode records from {}", records.len(), table_name);
    Ok(records)
}

pub fn load_postcode_directory_path(path: &Path) -> Result<Vec<PostcodeRecord>> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("postcode directory")
        .to_string();
    load_postcode_directory(open_maybe_gz(path)?, &name)
}

/// Compute population overlap fractions for every (source, target) pair.
///
/// Average population per postcode is unit population / distinct postcode
/// count, substituted with 1.0 when the ratio is zero (high-commercial,
/// low-residence areas).
pub fn population_overlaps(
    unit_populations: &HashMap<String, f64>,
    directory: &[PostcodeRecord],
) -> HashMap<(String, String), f64> {
    // Distinct postcodes per unit
    let mut unit_postcodes: HashMap<&str, HashSet<&str>> = HashMap::new();
    for record in directory {
        unit_postcodes
            .entry(record.unit.as_str())
            .or_default()
            .insert(record.postcode.as_str());
    }

    let mut average_per_postcode: HashMap<&str, f64> = HashMap::new();
    for (unit, postcodes) in &unit_postcodes {
        let pop = match unit_populations.get(*unit) {
            Some(p) => *p,
            None => continue,
        };
        let average = pop / postcodes.len() as f64;
        let average = if average == 0.0 { 1.0 } else { average };
        average_per_postcode.insert(*unit, average);
    }

    let mut pair_totals: HashMap<(String, String), f64> = HashMap::new();
    let mut source_totals: HashMap<String, f64> = HashMap::new();

    for record in directory {
        let average = match average_per_postcode.get(record.unit.as_str()) {
            Some(a) => *a,
            None => continue,
        };
        *pair_totals
            .entry((record.source.clone(), record.target.clone()))
            .or_insert(0.0) += average;
        *source_totals.entry(record.source.clone()).or_insert(0.0) += average;
    }

    info!(
        "Population overlap: {} pairs across {} sources",
        pair_totals.len(),
        source_totals.len()
    );

    pair_totals
        .into_iter()
        .map(|((source, target), pair_total)| {
            let fraction = pair_total / source_totals[&source];
            ((source, target), fraction)
        })
        .collect()
}
