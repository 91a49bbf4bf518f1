//! Wide-to-long reshaping of converted survey tables.
//!
//! Each converted dataset is written twice: a wide table keyed by council
//! code, and long-format rows with short question keys (`Q1`, `Q2`, ...)
//! that concatenate across datasets into the combined output file. The
//! short-key to question-text mapping goes to a per-dataset lookup file.

use std::io::Write;

use anyhow::Result;

use geopoll::hierarchy::CouncilRegistry;
use geopoll::models::SurveyTable;

/// One long-format output row
#[derive(Debug, Clone, PartialEq)]
pub struct MeltedRow {
    pub source: String,
    pub code: String,
    pub official_name: String,
    pub question: String,
    pub percentage: f64,
}

/// Short-key assignment for one question column
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionKey {
    pub question: String,
    pub short: String,
}

fn display_name(registry: &CouncilRegistry, code: &str) -> String {
    registry
        .official_name(code)
        .unwrap_or(code)
        .to_string()
}

/// Melt a converted table to long rows, assigning short question keys in
/// column order.
pub fn melt_dataset(
    source: &str,
    table: &SurveyTable,
    registry: &CouncilRegistry,
) -> (Vec<MeltedRow>, Vec<QuestionKey>) {
    let lookup: Vec<QuestionKey> = table
        .value_columns
        .iter()
        .enumerate()
        .map(|(i, question)| QuestionKey {
            question: question.clone(),
            short: format!("Q{}", i + 1),
        })
        .collect();

    let mut rows = Vec::with_capacity(table.rows.len() * lookup.len());
    for row in &table.rows {
        let name = display_name(registry, &row.code);
        for (key, value) in lookup.iter().zip(&row.values) {
            rows.push(MeltedRow {
                source: source.to_string(),
                code: row.code.clone(),
                official_name: name.clone(),
                question: key.short.clone(),
                percentage: *value,
            });
        }
    }

    (rows, lookup)
}

/// Wide output: council code, official name, then the value columns.
pub fn write_wide<W: Write>(
    writer: W,
    table: &SurveyTable,
    registry: &CouncilRegistry,
) -> Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    let mut header = vec![table.key_column.clone(), "official-name".to_string()];
    header.extend(table.value_columns.iter().cloned());
    w.write_record(&header)?;
    for row in &table.rows {
        let mut record = vec![row.code.clone(), display_name(registry, &row.code)];
        record.extend(row.values.iter().map(|v| v.to_string()));
        w.write_record(&record)?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_lookup<W: Write>(writer: W, lookup: &[QuestionKey]) -> Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(["question", "short"])?;
    for key in lookup {
        w.write_record([key.question.as_str(), key.short.as_str()])?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_combined<W: Write>(writer: W, rows: &[MeltedRow]) -> Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record([
        "source",
        "local-authority-code",
        "official-name",
        "question",
        "percentage",
    ])?;
    for row in rows {
        let percentage = row.percentage.to_string();
        w.write_record([
            row.source.as_str(),
            row.code.as_str(),
            row.official_name.as_str(),
            row.question.as_str(),
            percentage.as_str(),
        ])?;
    }
    w.flush()?;
    Ok(())
}
