//! Boundary loading and spatial indexing.
//!
//! Boundary sets arrive as GeoJSON feature collections keyed by an
//! administrative code property. Polygons are repaired before any
//! intersection work: rings are rewound to canonical orientation and
//! zero-area parts dropped.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use geo::orient::{Direction, Orient};
use geo::{Area, BoundingRect, MultiPolygon};
use geojson::{FeatureCollection, GeoJson};
use rstar::{RTree, RTreeObject, AABB};
use tracing::{debug, info};

use crate::error::Error;

/// A single boundary polygon with its administrative code.
#[derive(Debug, Clone)]
pub struct Boundary {
    pub code: String,
    pub name: Option<String>,
    pub geometry: MultiPolygon<f64>,
}

impl Boundary {
    /// Get the bounding box of this boundary
    pub fn bbox(&self) -> Option<(f64, f64, f64, f64)> {
        self.geometry
            .bounding_rect()
            .map(|rect| (rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }
}

/// Rewind rings and drop degenerate parts. Equivalent to the buffer-by-zero
/// repair applied to the raw boundary files.
pub fn repair(geometry: MultiPolygon<f64>) -> MultiPolygon<f64> {
    let oriented = geometry.orient(Direction::Default);
    MultiPolygon::new(
        oriented
            .into_iter()
            .filter(|p| p.unsigned_area() > 0.0)
            .collect(),
    )
}

/// Load a boundary set from a GeoJSON file.
///
/// Every feature must carry the `code_key` property and a (Multi)Polygon
/// geometry; a missing code property is a schema error naming the column.
pub fn load_boundaries(path: &Path, code_key: &str, name_key: Option<&str>) -> Result<Vec<Boundary>> {
    let table_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("boundaries")
        .to_string();

    info!("Loading boundaries from {}", path.display());

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open boundary file {}", path.display()))?;
    let geojson: GeoJson = serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("Failed to parse GeoJSON in {}", table_name))?;
    let collection = FeatureCollection::try_from(geojson)
        .with_context(|| format!("{} is not a feature collection", table_name))?;

    let mut boundaries = Vec::new();

    for feature in collection.features {
        let properties = feature.properties.as_ref();
        let code = properties
            .and_then(|p| p.get(code_key))
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::schema(&table_name, code_key))?
            .to_string();

        let name = name_key.and_then(|key| {
            properties
                .and_then(|p| p.get(key))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        });

        let geometry = feature
            .geometry
            .ok_or_else(|| Error::schema(&table_name, "geometry"))?;
        let geometry: geo_types::Geometry<f64> = geometry
            .value
            .try_into()
            .with_context(|| format!("unsupported geometry for '{}' in {}", code, table_name))?;

        let multi = match geometry {
            geo_types::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
            geo_types::Geometry::MultiPolygon(mp) => mp,
            _ => {
                anyhow::bail!(
                    "feature '{}' in {} has a non-polygon geometry",
                    code,
                    table_name
                );
            }
        };

        let repaired = repair(multi);
        if repaired.0.is_empty() {
            debug!("Boundary '{}' collapsed to nothing after repair", code);
            continue;
        }

        boundaries.push(Boundary {
            code,
            name,
            geometry: repaired,
        });
    }

    info!("Loaded {} boundaries from {}", boundaries.len(), table_name);

    Ok(boundaries)
}

/// Wrapper for R-tree indexing of boundaries
#[derive(Clone)]
pub struct IndexedBoundary {
    pub boundary: Arc<Boundary>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedBoundary {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl IndexedBoundary {
    pub fn new(boundary: Boundary) -> Option<Self> {
        let (min_x, min_y, max_x, max_y) = boundary.bbox()?;
        Some(Self {
            boundary: Arc::new(boundary),
            envelope: AABB::from_corners([min_x, min_y], [max_x, max_y]),
        })
    }
}

/// R-tree of target boundaries for the overlap spatial join
pub struct BoundaryIndex {
    tree: RTree<IndexedBoundary>,
}

impl BoundaryIndex {
    pub fn build(boundaries: Vec<Boundary>) -> Self {
        info!("Building spatial index for {} boundaries", boundaries.len());
        let indexed: Vec<IndexedBoundary> = boundaries
            .into_iter()
            .filter_map(IndexedBoundary::new)
            .collect();
        Self {
            tree: RTree::bulk_load(indexed),
        }
    }

    /// Candidate targets whose envelope intersects the given boundary's
    /// envelope. Exact intersection happens in the area pass.
    pub fn candidates<'a>(
        &'a self,
        boundary: &Boundary,
    ) -> impl Iterator<Item = &'a Arc<Boundary>> + 'a {
        let envelope = boundary
            .bbox()
            .map(|(min_x, min_y, max_x, max_y)| {
                AABB::from_corners([min_x, min_y], [max_x, max_y])
            })
            .unwrap_or_else(|| AABB::from_point([0.0, 0.0]));
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|ib| &ib.boundary)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
