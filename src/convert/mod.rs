//! Generic geography conversion.
//!
//! Reallocates a table of per-geography values from an input geography to
//! an output geography using an overlap table. The overlap-measure column
//! is treated as a per-source weight; the overlap builder produces 0..=1
//! fractions, but the math only assumes nonnegative weights, so tables
//! carrying absolute overlap mass work identically.
//!
//! Works best when output geographies are bigger (e.g. constituencies to
//! local authorities).

use hashbrown::HashMap;
use tracing::debug;

use crate::error::Error;
use crate::models::{OverlapMeasure, SurveyRow, SurveyTable, ValueKind};
use crate::overlap::OverlapTable;

/// Convert a survey table to the overlap table's target geography.
///
/// Absolute inputs are first normalised by each source's total
/// overlap-measure weight, so downstream math is uniform regardless of
/// input kind. Each value is then multiplied by the record's measure
/// weight, the exploded rows are grouped by target and summed, and
/// percentage outputs are renormalised by the summed measure per target.
///
/// Sources absent from the overlap table are dropped (the documented
/// lookup-miss behaviour); value column order is preserved.
pub fn convert(
    survey: &SurveyTable,
    overlap: &OverlapTable,
    input_kind: ValueKind,
    output_kind: ValueKind,
    measure: OverlapMeasure,
    output_key: Option<&str>,
) -> Result<SurveyTable, Error> {
    if survey.value_columns.is_empty() {
        return Err(Error::validation(
            "survey_table",
            "survey table has no value columns",
        ));
    }

    let by_source = overlap.by_source();
    let source_totals = overlap.source_totals(measure);

    // target -> (per-column sums, measure sum)
    let mut accumulated: HashMap<&str, (Vec<f64>, f64)> = HashMap::new();

    for row in &survey.rows {
        let records = match by_source.get(row.code.as_str()) {
            Some(records) => records,
            None => {
                debug!("No overlap records for source '{}', dropping", row.code);
                continue;
            }
        };

        let total = source_totals
            .get(row.code.as_str())
            .copied()
            .unwrap_or(0.0);

        let normalized: Vec<f64> = match input_kind {
            ValueKind::Absolute => {
                if total <= 0.0 {
                    return Err(Error::validation(
                        "overlap_measure",
                        format!(
                            "source '{}' has zero total {} overlap, cannot normalise absolute values",
                            row.code,
                            measure.as_str()
                        ),
                    ));
                }
                row.values.iter().map(|v| v / total).collect()
            }
            ValueKind::Percentage => row.values.clone(),
        };

        for record in records {
            let weight = record.fraction(measure);
            // Zero-weight pairs come from the outer merge of the two
            // measures; they carry no mass and would leave phantom targets.
            if weight == 0.0 {
                continue;
            }
            let entry = accumulated
                .entry(record.target_code.as_str())
                .or_insert_with(|| (vec![0.0; survey.value_columns.len()], 0.0));
            for (sum, value) in entry.0.iter_mut().zip(&normalized) {
                *sum += value * weight;
            }
            entry.1 += weight;
        }
    }

    let mut rows: Vec<SurveyRow> = accumulated
        .into_iter()
        .map(|(target, (mut values, measure_sum))| {
            if output_kind == ValueKind::Percentage {
                for value in &mut values {
                    *value /= measure_sum;
                }
            }
            SurveyRow {
                code: target.to_string(),
                values,
            }
        })
        .collect();
    rows.sort_by(|a, b| a.code.cmp(&b.code));

    let key_column = output_key
        .unwrap_or(overlap.target_geography.as_str())
        .to_string();

    SurveyTable::new(key_column, survey.value_columns.clone(), rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Geography;
    use crate::overlap::OverlapRecord;

    fn record(source: &str, target: &str, area: f64, pop: f64) -> OverlapRecord {
        OverlapRecord {
            source_code: source.into(),
            target_code: target.into(),
            fraction_by_area: area,
            fraction_by_population: pop,
        }
    }

    fn overlap(records: Vec<OverlapRecord>) -> OverlapTable {
        OverlapTable {
            source_geography: Geography::Parl10,
            target_geography: Geography::Lad23,
            records,
        }
    }

    fn survey(key: &str, columns: &[&str], rows: &[(&str, &[f64])]) -> SurveyTable {
        SurveyTable::new(
            key,
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|(code, values)| SurveyRow {
                    code: code.to_string(),
                    values: values.to_vec(),
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_absolute_counts_to_target_percentage() {
        // A (pop 100) and B (pop 200) fully inside X; the measure column
        // carries absolute population mass, so the result is population
        // weighted: (50 + 100) / (100 + 200) = 0.5
        let overlap = overlap(vec![
            record("A", "X", 1.0, 100.0),
            record("B", "X", 1.0, 200.0),
        ]);
        let survey = survey("PCON2010", &["support"], &[("A", &[50.0]), ("B", &[100.0])]);

        let result = convert(
            &survey,
            &overlap,
            ValueKind::Absolute,
            ValueKind::Percentage,
            OverlapMeasure::Population,
            None,
        )
        .unwrap();

        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].code, "X");
        assert!((result.rows[0].values[0] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_percentage_splits_proportionally() {
        // Population fractions X=0.5, Y=0.5: 0.8 splits into 0.4 / 0.4
        let overlap = overlap(vec![
            record("A", "X", 0.6, 0.5),
            record("A", "Y", 0.4, 0.5),
        ]);
        let survey = survey("PCON2010", &["support"], &[("A", &[0.8])]);

        let result = convert(
            &survey,
            &overlap,
            ValueKind::Percentage,
            ValueKind::Absolute,
            OverlapMeasure::Population,
            None,
        )
        .unwrap();

        assert_eq!(result.rows.len(), 2);
        for row in &result.rows {
            assert!((row.values[0] - 0.4).abs() < 1e-9);
        }
    }

    #[test]
    fn test_mass_conservation() {
        // Fractions per source sum to 1 and kinds match: grand totals hold
        let overlap = overlap(vec![
            record("A", "X", 0.6, 0.7),
            record("A", "Y", 0.4, 0.3),
            record("B", "X", 0.2, 0.1),
            record("B", "Z", 0.8, 0.9),
        ]);
        let survey = survey(
            "PCON2010",
            &["yes", "no"],
            &[("A", &[120.0, 30.0]), ("B", &[60.0, 90.0])],
        );

        for measure in [OverlapMeasure::Area, OverlapMeasure::Population] {
            let result = convert(
                &survey,
                &overlap,
                ValueKind::Absolute,
                ValueKind::Absolute,
                measure,
                None,
            )
            .unwrap();
            let yes: f64 = result.column_total("yes").unwrap();
            let no: f64 = result.column_total("no").unwrap();
            assert!((yes - 180.0).abs() < 1e-6);
            assert!((no - 120.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_percentage_round_trip() {
        // One-to-one mapping: percentage -> absolute -> percentage returns
        // the original values
        let forward = overlap(vec![
            record("A", "X", 1.0, 1.0),
            record("B", "Y", 1.0, 1.0),
        ]);
        let backward = overlap(vec![
            record("X", "A", 1.0, 1.0),
            record("Y", "B", 1.0, 1.0),
        ]);
        let original = survey("PCON2010", &["q1"], &[("A", &[0.35]), ("B", &[0.65])]);

        let absolute = convert(
            &original,
            &forward,
            ValueKind::Percentage,
            ValueKind::Absolute,
            OverlapMeasure::Area,
            None,
        )
        .unwrap();
        let back = convert(
            &absolute,
            &backward,
            ValueKind::Absolute,
            ValueKind::Percentage,
            OverlapMeasure::Area,
            Some("PCON2010"),
        )
        .unwrap();

        assert_eq!(back.rows.len(), 2);
        for (row, expected) in back.rows.iter().zip([0.35, 0.65]) {
            assert!((row.values[0] - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_unmatched_source_dropped() {
        let overlap = overlap(vec![record("A", "X", 1.0, 1.0)]);
        let survey = survey(
            "PCON2010",
            &["q1"],
            &[("A", &[0.5]), ("GHOST", &[0.9])],
        );

        let result = convert(
            &survey,
            &overlap,
            ValueKind::Percentage,
            ValueKind::Percentage,
            OverlapMeasure::Area,
            None,
        )
        .unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].code, "X");
    }

    #[test]
    fn test_zero_total_absolute_is_validation_error() {
        let overlap = overlap(vec![record("A", "X", 0.5, 0.0)]);
        let survey = survey("PCON2010", &["q1"], &[("A", &[10.0])]);

        let err = convert(
            &survey,
            &overlap,
            ValueKind::Absolute,
            ValueKind::Absolute,
            OverlapMeasure::Population,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_output_key_defaults_to_target_geography() {
        let overlap = overlap(vec![record("A", "X", 1.0, 1.0)]);
        let survey = survey("PCON2010", &["q1"], &[("A", &[0.5])]);
        let result = convert(
            &survey,
            &overlap,
            ValueKind::Percentage,
            ValueKind::Percentage,
            OverlapMeasure::Area,
            None,
        )
        .unwrap();
        assert_eq!(result.key_column, "LAD23");
        assert_eq!(result.value_columns, vec!["q1"]);
    }
}
