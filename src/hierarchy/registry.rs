//! Council metadata registry.
//!
//! One row per local authority as of a reference date: official name,
//! replacement code (if abolished), and enclosing county / combined
//! authority codes. Backed by a remote council-metadata CSV or a local file.

use std::io::Read;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use hashbrown::HashMap;
use tracing::info;

use crate::error::Error;

/// A higher administrative level enclosing local authorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    County,
    CombinedAuthority,
}

impl Tier {
    /// Tiers in roll-up order
    pub fn all() -> &'static [Tier] {
        &[Tier::County, Tier::CombinedAuthority]
    }

    /// Column name in the council-metadata CSV
    pub fn column(&self) -> &'static str {
        match self {
            Tier::County => "county-la",
            Tier::CombinedAuthority => "combined-authority",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CouncilRecord {
    pub code: String,
    pub official_name: Option<String>,
    pub replaced_by: Option<String>,
    pub county: Option<String>,
    pub combined_authority: Option<String>,
    /// Date the authority ceased to exist, if abolished
    pub end_date: Option<NaiveDate>,
}

/// Lookup over council metadata as of a fixed reference date.
#[derive(Debug, Clone)]
pub struct CouncilRegistry {
    as_of: NaiveDate,
    records: HashMap<String, CouncilRecord>,
}

impl CouncilRegistry {
    pub fn new(as_of: NaiveDate, records: Vec<CouncilRecord>) -> Self {
        let records = records.into_iter().map(|r| (r.code.clone(), r)).collect();
        Self { as_of, records }
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, code: &str) -> Option<&CouncilRecord> {
        self.records.get(code)
    }

    /// Successor of an abolished authority, if the abolition has taken
    /// effect by the reference date. An unknown code or a live authority
    /// has no successor (the documented lookup-miss fallback).
    pub fn successor(&self, code: &str) -> Option<&str> {
        let record = self.records.get(code)?;
        let replaced_by = record.replaced_by.as_deref()?;
        match record.end_date {
            Some(end) if end <= self.as_of => Some(replaced_by),
            _ => None,
        }
    }

    /// Enclosing code at the given tier, if the authority has one.
    pub fn tier(&self, code: &str, tier: Tier) -> Option<&str> {
        let record = self.records.get(code)?;
        match tier {
            Tier::County => record.county.as_deref(),
            Tier::CombinedAuthority => record.combined_authority.as_deref(),
        }
    }

    pub fn official_name(&self, code: &str) -> Option<&str> {
        self.records.get(code)?.official_name.as_deref()
    }

    /// Parse the council-metadata CSV. The code column is required; name,
    /// replacement, tier and end-date columns are optional attribute sets.
    /// With `include_historical` false, authorities abolished on or before
    /// the reference date are dropped.
    pub fn from_csv_reader<R: Read>(
        reader: R,
        as_of: NaiveDate,
        include_historical: bool,
    ) -> Result<Self> {
        let table_name = "council metadata";
        let mut csv_reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = csv_reader.headers()?.clone();

        let code_idx = headers
            .iter()
            .position(|h| h == "local-authority-code")
            .ok_or_else(|| Error::schema(table_name, "local-authority-code"))?;
        let find = |name: &str| headers.iter().position(|h| h == name);
        let name_idx = find("official-name");
        let replaced_idx = find("replaced-by");
        let county_idx = find(Tier::County.column());
        let combined_idx = find(Tier::CombinedAuthority.column());
        let end_idx = find("end-date");

        let optional = |record: &csv::StringRecord, idx: Option<usize>| -> Option<String> {
            idx.and_then(|i| record.get(i))
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(|v| v.to_string())
        };

        let mut records = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            let code = record
                .get(code_idx)
                .ok_or_else(|| Error::schema(table_name, "local-authority-code"))?
                .to_string();

            let end_date = match optional(&record, end_idx) {
                Some(raw) => Some(
                    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                        .with_context(|| format!("bad end-date '{}' for '{}'", raw, code))?,
                ),
                None => None,
            };

            if !include_historical {
                if let Some(end) = end_date {
                    if end <= as_of {
                        continue;
                    }
                }
            }

            records.push(CouncilRecord {
                code,
                official_name: optional(&record, name_idx),
                replaced_by: optional(&record, replaced_idx),
                county: optional(&record, county_idx),
                combined_authority: optional(&record, combined_idx),
                end_date,
            });
        }

        info!(
            "Loaded {} council records (as of {}, historical: {})",
            records.len(),
            as_of,
            include_historical
        );

        Ok(Self::new(as_of, records))
    }

    /// Fetch the registry from the council-metadata service. Fatal on any
    /// HTTP failure; no retry.
    pub async fn fetch(
        client: &reqwest::Client,
        url: &str,
        as_of: NaiveDate,
        include_historical: bool,
    ) -> Result<Self> {
        info!("Fetching council metadata from {}", url);

        let body = async {
            let response = client
                .get(url)
                .query(&[
                    ("as_of", as_of.format("%Y-%m-%d").to_string()),
                    (
                        "include_historical",
                        if include_historical { "1" } else { "0" }.to_string(),
                    ),
                ])
                .send()
                .await?;
            let response = response.error_for_status()?;
            response.text().await
        }
        .await
        .map_err(|source| Error::Fetch {
            url: url.to_string(),
            source,
        })?;

        Self::from_csv_reader(body.as_bytes(), as_of, include_historical)
    }
}
