//! The overlap table: the persisted intermediate artifact consumed by the
//! geography converter.
//!
//! One row per nonzero-overlap (source, target) pair, carrying both the
//! area and population fraction. Area fractions above 0.9999 are rounded up
//! to exactly 1.0 when the two measures are merged.

use std::io::{Read, Write};

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Error;
use crate::models::{Geography, OverlapMeasure};

/// Area fractions at or above this round up to 1.0 on merge.
const AREA_ROUND_UP: f64 = 0.9999;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapRecord {
    pub source_code: String,
    pub target_code: String,
    pub fraction_by_area: f64,
    pub fraction_by_population: f64,
}

impl OverlapRecord {
    pub fn fraction(&self, measure: OverlapMeasure) -> f64 {
        match measure {
            OverlapMeasure::Area => self.fraction_by_area,
            OverlapMeasure::Population => self.fraction_by_population,
        }
    }
}

/// Overlap fractions between a source and target boundary set.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapTable {
    pub source_geography: Geography,
    pub target_geography: Geography,
    pub records: Vec<OverlapRecord>,
}

impl OverlapTable {
    /// Merge independently computed area and population fraction maps into
    /// one table. Outer join on (source, target); a pair present in only one
    /// map gets 0.0 for the other measure.
    pub fn merge(
        source_geography: Geography,
        target_geography: Geography,
        area: HashMap<(String, String), f64>,
        population: HashMap<(String, String), f64>,
    ) -> Self {
        let mut keys: HashSet<(String, String)> = HashSet::new();
        keys.extend(area.keys().cloned());
        keys.extend(population.keys().cloned());

        let mut records: Vec<OverlapRecord> = keys
            .into_iter()
            .map(|key| {
                let mut fraction_by_area = area.get(&key).copied().unwrap_or(0.0);
                if fraction_by_area > AREA_ROUND_UP {
                    fraction_by_area = 1.0;
                }
                let fraction_by_population = population.get(&key).copied().unwrap_or(0.0);
                OverlapRecord {
                    source_code: key.0,
                    target_code: key.1,
                    fraction_by_area,
                    fraction_by_population,
                }
            })
            .collect();

        records.sort_by(|a, b| {
            (a.source_code.as_str(), a.target_code.as_str())
                .cmp(&(b.source_code.as_str(), b.target_code.as_str()))
        });

        info!("Merged overlap table: {} records", records.len());

        Self {
            source_geography,
            target_geography,
            records,
        }
    }

    /// Sum of the chosen measure per source code.
    pub fn source_totals(&self, measure: OverlapMeasure) -> HashMap<&str, f64> {
        let mut totals: HashMap<&str, f64> = HashMap::new();
        for record in &self.records {
            *totals.entry(record.source_code.as_str()).or_insert(0.0) +=
                record.fraction(measure);
        }
        totals
    }

    /// Records grouped by source code, preserving record order.
    pub fn by_source(&self) -> HashMap<&str, Vec<&OverlapRecord>> {
        let mut grouped: HashMap<&str, Vec<&OverlapRecord>> = HashMap::new();
        for record in &self.records {
            grouped
                .entry(record.source_code.as_str())
                .or_default()
                .push(record);
        }
        grouped
    }

    pub fn read_csv<R: Read>(
        reader: R,
        source_geography: Geography,
        target_geography: Geography,
    ) -> Result<Self> {
        let table_name = format!(
            "{}_{}_overlap",
            source_geography.as_str(),
            target_geography.as_str()
        );
        let mut csv_reader = ReaderBuilder::new().has_headers(true).from_reader(reader);

        // Validate the artifact schema up front so a truncated or foreign
        // file fails with the missing column named.
        let headers = csv_reader.headers()?.clone();
        for required in [
            "source_code",
            "target_code",
            "fraction_by_area",
            "fraction_by_population",
        ] {
            if !headers.iter().any(|h| h == required) {
                return Err(Error::schema(&table_name, required).into());
            }
        }

        let mut records = Vec::new();
        for result in csv_reader.deserialize() {
            let record: OverlapRecord = result.context("Malformed overlap record")?;
            records.push(record);
        }

        info!("Read {} overlap records from {}", records.len(), table_name);

        Ok(Self {
            source_geography,
            target_geography,
            records,
        })
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut w = csv::Writer::from_writer(writer);
        for record in &self.records {
            w.serialize(record)?;
        }
        w.flush()?;
        Ok(())
    }

    /// Download a published overlap artifact by geography pair.
    pub async fn fetch(
        client: &reqwest::Client,
        base_url: &str,
        source_geography: Geography,
        target_geography: Geography,
    ) -> Result<Self> {
        let url = format!(
            "{}/{}_{}_combo_overlap.csv",
            base_url.trim_end_matches('/'),
            source_geography.as_str(),
            target_geography.as_str()
        );

        let body = async {
            let response = client.get(&url).send().await?;
            let response = response.error_for_status()?;
            response.text().await
        }
        .await
        .map_err(|source| Error::Fetch {
            url: url.clone(),
            source,
        })?;

        Self::read_csv(body.as_bytes(), source_geography, target_geography)
            .with_context(|| format!("remote artifact at {} is malformed", url))
    }
}
