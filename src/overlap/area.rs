//! Area-based overlap fractions between two boundary sets.
//!
//! Batch spatial join: an R-tree narrows each source to envelope candidates,
//! then exact polygon intersection gives the fraction of the source's area
//! inside each target. Pairs below 1% are discarded as slivers from boundary
//! simplification.

use geo::{Area, BooleanOps};
use hashbrown::HashMap;
use rayon::prelude::*;
use tracing::{debug, info};

use super::boundaries::{Boundary, BoundaryIndex};

/// Fractions below this are treated as boundary-simplification noise.
pub const MIN_AREA_FRACTION: f64 = 0.01;

/// Area fractions of one source against all candidate targets.
pub fn area_fractions(source: &Boundary, index: &BoundaryIndex) -> Vec<(String, f64)> {
    let source_area = source.geometry.unsigned_area();
    if source_area <= 0.0 {
        debug!("Source '{}' has zero area, skipping", source.code);
        return Vec::new();
    }

    let mut fractions = Vec::new();
    for target in index.candidates(source) {
        let intersection = source.geometry.intersection(&target.geometry);
        let fraction = intersection.unsigned_area() / source_area;
        if fraction >= MIN_AREA_FRACTION {
            fractions.push((target.code.clone(), fraction));
        }
    }
    fractions
}

/// Compute area overlap fractions for every (source, target) pair whose
/// polygons intersect. Partitioned by source geography and run in parallel.
pub fn area_overlaps(
    sources: &[Boundary],
    targets: Vec<Boundary>,
) -> HashMap<(String, String), f64> {
    info!(
        "Computing area overlaps: {} sources x {} targets",
        sources.len(),
        targets.len()
    );

    let index = BoundaryIndex::build(targets);

    let pairs: Vec<((String, String), f64)> = sources
        .par_iter()
        .flat_map_iter(|source| {
            area_fractions(source, &index)
                .into_iter()
                .map(move |(target_code, fraction)| {
                    ((source.code.clone(), target_code), fraction)
                })
        })
        .collect();

    info!("Found {} overlapping pairs", pairs.len());

    pairs.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    fn boundary(code: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> Boundary {
        Boundary {
            code: code.into(),
            name: None,
            geometry: MultiPolygon::new(vec![polygon![
                (x: x0, y: y0),
                (x: x1, y: y0),
                (x: x1, y: y1),
                (x: x0, y: y1),
            ]]),
        }
    }

    #[test]
    fn test_fully_contained_source() {
        let sources = vec![boundary("A", 0.2, 0.2, 0.8, 0.8)];
        let targets = vec![boundary("X", 0.0, 0.0, 1.0, 1.0)];
        let overlaps = area_overlaps(&sources, targets);
        assert_eq!(overlaps.len(), 1);
        let f = overlaps[&("A".to_string(), "X".to_string())];
        assert!((f - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_split_source_partitions() {
        // Source [0,1]x[0,1] split 60/40 between two targets
        let sources = vec![boundary("A", 0.0, 0.0, 1.0, 1.0)];
        let targets = vec![boundary("X", 0.0, 0.0, 0.6, 1.0), boundary("Y", 0.6, 0.0, 1.0, 1.0)];
        let overlaps = area_overlaps(&sources, targets);
        assert_eq!(overlaps.len(), 2);
        let fx = overlaps[&("A".to_string(), "X".to_string())];
        let fy = overlaps[&("A".to_string(), "Y".to_string())];
        assert!((fx - 0.6).abs() < 1e-9);
        assert!((fy - 0.4).abs() < 1e-9);
        assert!((fx + fy - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_sliver_discarded() {
        // 0.5% sliver overlap falls under the noise threshold
        let sources = vec![boundary("A", 0.0, 0.0, 1.0, 1.0)];
        let targets = vec![
            boundary("X", 0.005, 0.0, 1.0, 1.0),
            boundary("Y", 0.0, 0.0, 0.005, 1.0),
        ];
        let overlaps = area_overlaps(&sources, targets);
        assert_eq!(overlaps.len(), 1);
        assert!(overlaps.contains_key(&("A".to_string(), "X".to_string())));
    }

    #[test]
    fn test_disjoint_pairs_absent() {
        let sources = vec![boundary("A", 0.0, 0.0, 1.0, 1.0)];
        let targets = vec![boundary("X", 5.0, 5.0, 6.0, 6.0)];
        let overlaps = area_overlaps(&sources, targets);
        assert!(overlaps.is_empty());
    }
}
