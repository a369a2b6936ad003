//! Candidate lookup over parsed regions.

use rstar::{RTree, RTreeObject, AABB};
use tracing::info;

use super::RegionBoundary;
use crate::config::IndexStrategy;
use crate::models::GeoPoint;

/// R-tree entry pointing back at a region by its rank
#[derive(Debug, Clone)]
pub struct IndexedRegion {
    pub rank: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedRegion {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl IndexedRegion {
    pub fn new(rank: usize, boundary: &RegionBoundary) -> Option<Self> {
        let bbox = boundary.bbox()?;
        Some(Self {
            rank,
            envelope: AABB::from_corners(
                [bbox.min_lon, bbox.min_lat],
                [bbox.max_lon, bbox.max_lat],
            ),
        })
    }
}

/// Read-only region set shared by all workers of one call.
///
/// A region's rank is its position among the parsed regions, which follows
/// the caller's order. Lookups always return the lowest-ranked region that
/// contains the point, whatever the strategy.
pub struct RegionIndex {
    regions: Vec<RegionBoundary>,
    tree: Option<RTree<IndexedRegion>>,
}

impl RegionIndex {
    pub fn build(regions: Vec<RegionBoundary>, strategy: IndexStrategy) -> Self {
        let tree = match strategy {
            IndexStrategy::Rtree => {
                let indexed: Vec<IndexedRegion> = regions
                    .iter()
                    .enumerate()
                    .filter_map(|(rank, b)| IndexedRegion::new(rank, b))
                    .collect();
                let tree = RTree::bulk_load(indexed);
                info!("Spatial index built with {} entries", tree.size());
                Some(tree)
            }
            IndexStrategy::Scan => None,
        };

        Self { regions, tree }
    }

    /// Rank of the first region containing the point, if any
    pub fn lookup(&self, point: &GeoPoint) -> Option<usize> {
        if !point.is_finite() {
            return None;
        }
        let coord = point.coord();

        match &self.tree {
            Some(tree) => {
                let query_envelope = AABB::from_point([coord.x, coord.y]);
                tree.locate_in_envelope_intersecting(&query_envelope)
                    .filter(|ir| self.regions[ir.rank].contains(coord))
                    .map(|ir| ir.rank)
                    .min()
            }
            None => self.regions.iter().position(|r| r.contains(coord)),
        }
    }

    pub fn region(&self, rank: usize) -> Option<&RegionBoundary> {
        self.regions.get(rank)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn regions(&self) -> &[RegionBoundary] {
        &self.regions
    }
}
