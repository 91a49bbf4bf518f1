//! Higher-tier roll-up.
//!
//! Adds county and combined-authority rows to an edition-mapped overlap
//! table. The output is a union across tiers: a source can appear once at
//! local-authority level and again per enclosing tier. That double counting
//! is intentional; consumers pick exactly one tier at query time.

use hashbrown::HashMap;
use tracing::info;

use super::registry::{CouncilRegistry, Tier};
use crate::overlap::{OverlapRecord, OverlapTable};

/// Roll-up rows for one tier: group by (source, enclosing code), summing
/// both fraction columns. Authorities with no membership at the tier
/// contribute nothing.
fn tier_records(table: &OverlapTable, registry: &CouncilRegistry, tier: Tier) -> Vec<OverlapRecord> {
    let mut grouped: HashMap<(String, String), (f64, f64)> = HashMap::new();

    for record in &table.records {
        let enclosing = match registry.tier(&record.target_code, tier) {
            Some(code) => code.to_string(),
            None => continue,
        };
        let entry = grouped
            .entry((record.source_code.clone(), enclosing))
            .or_insert((0.0, 0.0));
        entry.0 += record.fraction_by_area;
        entry.1 += record.fraction_by_population;
    }

    let mut records: Vec<OverlapRecord> = grouped
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

    records
}

/// Expand an overlap table with roll-up rows for every tier.
pub fn expand_tiers(table: &OverlapTable, registry: &CouncilRegistry) -> OverlapTable {
    let mut records = table.records.clone();

    for tier in Tier::all() {
        let rows = tier_records(table, registry, *tier);
        info!("{:?} tier: {} roll-up rows", tier, rows.len());
        records.extend(rows);
    }

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
    use hashbrown::HashSet;

    fn record(source: &str, target: &str, area: f64, pop: f64) -> OverlapRecord {
        OverlapRecord {
            source_code: source.into(),
            target_code: target.into(),
            fraction_by_area: area,
            fraction_by_population: pop,
        }
    }

    fn council(code: &str, county: Option<&str>, combined: Option<&str>) -> CouncilRecord {
        CouncilRecord {
            code: code.into(),
            official_name: None,
            replaced_by: None,
            county: county.map(|s| s.to_string()),
            combined_authority: combined.map(|s| s.to_string()),
            end_date: None,
        }
    }

    fn registry(records: Vec<CouncilRecord>) -> CouncilRegistry {
        CouncilRegistry::new(NaiveDate::from_ymd_opt(2023, 4, 2).unwrap(), records)
    }

    #[test]
    fn test_tier_rows_sum_member_fractions() {
        let registry = registry(vec![
            council("LAD1", Some("CTY1"), None),
            council("LAD2", Some("CTY1"), None),
        ]);
        let table = OverlapTable {
            source_geography: Geography::Parl10,
            target_geography: Geography::Lad23,
            records: vec![
                record("A", "LAD1", 0.6, 0.7),
                record("A", "LAD2", 0.4, 0.3),
            ],
        };

        let expanded = expand_tiers(&table, &registry);
        // 2 base rows + 1 county row, no combined-authority memberships
        assert_eq!(expanded.records.len(), 3);
        let county = expanded
            .records
            .iter()
            .find(|r| r.target_code == "CTY1")
            .unwrap();
        assert!((county.fraction_by_area - 1.0).abs() < 1e-9);
        assert!((county.fraction_by_population - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_union_across_tiers() {
        let registry = registry(vec![
            council("LAD1", Some("CTY1"), Some("CA1")),
            council("LAD2", None, Some("CA1")),
        ]);
        let table = OverlapTable {
            source_geography: Geography::Parl10,
            target_geography: Geography::Lad23,
            records: vec![
                record("A", "LAD1", 0.5, 0.5),
                record("A", "LAD2", 0.5, 0.5),
            ],
        };

        let expanded = expand_tiers(&table, &registry);
        let targets: HashSet<&str> = expanded
            .records
            .iter()
            .map(|r| r.target_code.as_str())
            .collect();
        assert_eq!(
            targets,
            HashSet::from_iter(["LAD1", "LAD2", "CTY1", "CA1"])
        );
        // Combined authority covers both districts
        let ca = expanded
            .records
            .iter()
            .find(|r| r.target_code == "CA1")
            .unwrap();
        assert!((ca.fraction_by_area - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_tier_row_count_matches_reachable_enclosing_codes() {
        let registry = registry(vec![
            council("LAD1", Some("CTY1"), None),
            council("LAD2", Some("CTY2"), None),
            council("LAD3", None, None),
        ]);
        let table = OverlapTable {
            source_geography: Geography::Parl10,
            target_geography: Geography::Lad23,
            records: vec![
                record("A", "LAD1", 0.4, 0.4),
                record("A", "LAD2", 0.3, 0.3),
                record("A", "LAD3", 0.3, 0.3),
                record("B", "LAD1", 1.0, 1.0),
            ],
        };

        let expanded = expand_tiers(&table, &registry);
        let county_rows: Vec<_> = expanded
            .records
            .iter()
            .filter(|r| r.target_code.starts_with("CTY"))
            .collect();
        // A reaches CTY1 and CTY2, B reaches CTY1: exactly three rows
        assert_eq!(county_rows.len(), 3);
    }

    #[test]
    fn test_no_memberships_leaves_table_unchanged() {
        let registry = registry(vec![council("LAD1", None, None)]);
        let table = OverlapTable {
            source_geography: Geography::Parl10,
            target_geography: Geography::Lad23,
            records: vec![record("A", "LAD1", 1.0, 1.0)],
        };
        let expanded = expand_tiers(&table, &registry);
        assert_eq!(expanded.records, table.records);
    }
}
