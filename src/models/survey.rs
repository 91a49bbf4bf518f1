//! Explicit-schema survey table.
//!
//! The first column is always the geography key; that contract is validated
//! at construction rather than inferred from column position downstream.

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use tracing::info;

use crate::error::Error;

/// One survey row: a geography code and one value per value column.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyRow {
    pub code: String,
    pub values: Vec<f64>,
}

/// A table of per-geography numeric values.
///
/// `key_column` names the geography-code column and is always first;
/// `value_columns` preserve input order.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyTable {
    pub key_column: String,
    pub value_columns: Vec<String>,
    pub rows: Vec<SurveyRow>,
}

impl SurveyTable {
    pub fn new(
        key_column: impl Into<String>,
        value_columns: Vec<String>,
        rows: Vec<SurveyRow>,
    ) -> Result<Self, Error> {
        let key_column = key_column.into();
        if key_column.is_empty() {
            return Err(Error::validation("key_column", "must not be empty"));
        }
        for row in &rows {
            if row.values.len() != value_columns.len() {
                return Err(Error::validation(
                    "rows",
                    format!(
                        "row '{}' has {} values, expected {}",
                        row.code,
                        row.values.len(),
                        value_columns.len()
                    ),
                ));
            }
        }
        Ok(Self {
            key_column,
            value_columns,
            rows,
        })
    }

    /// Read a survey table from CSV. The first header is taken as the
    /// geography key and must match `key_column`; every other column must
    /// parse as a number.
    pub fn from_csv_reader<R: Read>(reader: R, key_column: &str, table_name: &str) -> Result<Self> {
        let mut csv_reader = ReaderBuilder::new().has_headers(true).from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let first = headers
            .get(0)
            .ok_or_else(|| Error::schema(table_name, key_column))?;
        if first != key_column {
            return Err(Error::validation(
                "key_column",
                format!(
                    "geography column '{}' must be the first column of {} (found '{}')",
                    key_column, table_name, first
                ),
            )
            .into());
        }

        let value_columns: Vec<String> = headers.iter().skip(1).map(|h| h.to_string()).collect();

        let mut rows = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            let code = record
                .get(0)
                .ok_or_else(|| Error::schema(table_name, key_column))?
                .to_string();
            let mut values = Vec::with_capacity(value_columns.len());
            for (i, col) in value_columns.iter().enumerate() {
                let raw = record.get(i + 1).unwrap_or("");
                let value: f64 = raw.trim().replace(',', "").parse().with_context(|| {
                    format!("non-numeric value '{}' in column '{}' of {}", raw, col, table_name)
                })?;
                values.push(value);
            }
            rows.push(SurveyRow { code, values });
        }

        info!("Read {} rows from {}", rows.len(), table_name);

        Ok(Self {
            key_column: key_column.to_string(),
            value_columns,
            rows,
        })
    }

    pub fn from_csv_path(path: &Path, key_column: &str) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open survey file {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("survey")
            .to_string();
        Self::from_csv_reader(file, key_column, &name)
    }

    /// Write as CSV, key column first, value columns in stored order.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut w = csv::Writer::from_writer(writer);
        let mut header = vec![self.key_column.clone()];
        header.extend(self.value_columns.iter().cloned());
        w.write_record(&header)?;
        for row in &self.rows {
            let mut record = vec![row.code.clone()];
            record.extend(row.values.iter().map(|v| v.to_string()));
            w.write_record(&record)?;
        }
        w.flush()?;
        Ok(())
    }

    /// Sum of a value column across all rows.
    pub fn column_total(&self, column: &str) -> Option<f64> {
        let idx = self.value_columns.iter().position(|c| c == column)?;
        Some(self.rows.iter().map(|r| r.values[idx]).sum())
    }
}
