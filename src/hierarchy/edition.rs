//! Boundary edition mapping.
//!
//! Overlap tables are computed against a fixed target boundary edition;
//! before hierarchy lookups can be applied, every target code must be
//! re-expressed in the current edition. Codes without a recorded successor
//! pass through unchanged.

use hashbrown::HashMap;
use tracing::{debug, info};

use super::registry::CouncilRegistry;
use crate::overlap::{OverlapRecord, OverlapTable};

/// Re-express every target code in the registry's edition. Records that
/// collapse onto the same (source, target) pair are merged by summing both
/// fraction columns.
pub fn map_to_current(table: &OverlapTable, registry: &CouncilRegistry) -> OverlapTable {
    let mut merged: HashMap<(String, String), (f64, f64)> = HashMap::new();
    let mut remapped = 0usize;

    for record in &table.records {
        let target = match registry.successor(&record.target_code) {
            Some(successor) => {
                debug!("{} -> {}", record.target_code, successor);
                remapped += 1;
                successor.to_string()
            }
            None => record.target_code.clone(),
        };

        let entry = merged
            .entry((record.source_code.clone(), target))
            .or_insert((0.0, 0.0));
        entry.0 += record.fraction_by_area;
        entry.1 += record.fraction_by_population;
    }

    let mut records: Vec<OverlapRecord> = merged
        .into_iter()
        .map(
            |((source_code, target_code), (fraction_by_area, fraction_by_population))| {
                OverlapRecord {
                    source_code,
                    target_code,
                    fraction_by_area,
                    fraction_by_population,
                }
            },
        )
        .collect();

    records.sort_by(|a, b| {
        (a.source_code.as_str(), a.target_code.as_str())
            .cmp(&(b.source_code.as_str(), b.target_code.as_str()))
    });

    info!(
        "Edition mapping: {} of {} records remapped, {} after merge",
        remapped,
        table.records.len(),
        records.len()
    );

    OverlapTable {
        source_geography: table.source_geography,
        target_geography: table.target_geography,
        records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::registry::CouncilRecord;
    use crate::models::Geography;
    use chrono::NaiveDate;

    fn record(source: &str, target: &str, area: f64, pop: f64) -> OverlapRecord {
        OverlapRecord {
            source_code: source.into(),
            target_code: target.into(),
            fraction_by_area: area,
            fraction_by_population: pop,
        }
    }

    fn table(records: Vec<OverlapRecord>) -> OverlapTable {
        OverlapTable {
            source_geography: Geography::Parl10,
            target_geography: Geography::Lad23,
            records,
        }
    }

    fn council(code: &str, replaced_by: Option<&str>, end: Option<&str>) -> CouncilRecord {
        CouncilRecord {
            code: code.into(),
            official_name: None,
            replaced_by: replaced_by.map(|s| s.to_string()),
            county: None,
            combined_authority: None,
            end_date: end.map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()),
        }
    }

    fn registry(records: Vec<CouncilRecord>) -> CouncilRegistry {
        CouncilRegistry::new(NaiveDate::from_ymd_opt(2023, 4, 2).unwrap(), records)
    }

    #[test]
    fn test_replaced_and_unreplaced_codes() {
        let registry = registry(vec![
            council("OLD1", Some("NEW1"), Some("2023-04-01")),
            council("OLD2", None, None),
        ]);
        let input = table(vec![
            record("A", "OLD1", 0.6, 0.5),
            record("A", "OLD2", 0.4, 0.5),
        ]);

        let mapped = map_to_current(&input, &registry);
        let targets: Vec<&str> = mapped
            .records
            .iter()
            .map(|r| r.target_code.as_str())
            .collect();
        assert_eq!(targets, vec!["NEW1", "OLD2"]);
    }

    #[test]
    fn test_duplicate_targets_merge_by_summation() {
        // Two abolished districts folded into the same unitary
        let registry = registry(vec![
            council("OLD1", Some("NEW1"), Some("2023-04-01")),
            council("OLD2", Some("NEW1"), Some("2023-04-01")),
        ]);
        let input = table(vec![
            record("A", "OLD1", 0.3, 0.25),
            record("A", "OLD2", 0.2, 0.35),
        ]);

        let mapped = map_to_current(&input, &registry);
        assert_eq!(mapped.records.len(), 1);
        let r = &mapped.records[0];
        assert_eq!(r.target_code, "NEW1");
        assert!((r.fraction_by_area - 0.5).abs() < 1e-9);
        assert!((r.fraction_by_population - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_idempotent_when_all_codes_current() {
        let registry = registry(vec![council("LAD1", None, None)]);
        let input = table(vec![
            record("A", "LAD1", 0.7, 0.6),
            record("B", "LAD1", 0.3, 0.4),
        ]);

        let once = map_to_current(&input, &registry);
        assert_eq!(once, input);
        let twice = map_to_current(&once, &registry);
        assert_eq!(twice, once);
    }
}
