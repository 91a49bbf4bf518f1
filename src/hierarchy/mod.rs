//! Council hierarchy: edition mapping and higher-tier roll-up.
//!
//! Hierarchy lookups are only valid for current-edition codes, so the
//! edition mapper runs before the tier aggregator.

mod edition;
mod registry;
mod tiers;

pub use edition::map_to_current;
pub use registry::{CouncilRecord, CouncilRegistry, Tier};
pub use tiers::expand_tiers;
