//! Overlap computation between two boundary sets.
//!
//! Produces, for every intersecting (source, target) pair, the fraction of
//! the source's area and of its estimated population falling inside the
//! target. The merged table is the pipeline's central intermediate artifact.

mod area;
mod boundaries;
mod population;
mod table;

pub use area::{area_fractions, area_overlaps, MIN_AREA_FRACTION};
pub use boundaries::{load_boundaries, repair, Boundary, BoundaryIndex, IndexedBoundary};
pub use population::{
    load_postcode_directory, load_postcode_directory_path, load_unit_populations,
    load_unit_populations_path, population_overlaps, PostcodeRecord,
};
pub use table::{OverlapRecord, OverlapTable};
