//! Region boundary parsing from caller-supplied WKT.

use geo::{BoundingRect, Coord, MultiPolygon};
use tracing::{debug, info, warn};

use super::predicate::multi_polygon_contains;
use super::wkt::parse_wkt;
use crate::config::MalformedPolicy;
use crate::error::ClassifyError;
use crate::models::{GeoBbox, RegionSpec, SkippedRegion};

/// A single parsed region with its geometry
#[derive(Debug, Clone)]
pub struct RegionBoundary {
    pub name: String,
    /// Position in the request, used for reporting
    pub order: usize,
    pub geometry: MultiPolygon<f64>,
    bbox: Option<GeoBbox>,
}

impl RegionBoundary {
    pub fn new(name: impl Into<String>, order: usize, geometry: MultiPolygon<f64>) -> Self {
        let bbox = geometry.bounding_rect().map(GeoBbox::from);
        Self {
            name: name.into(),
            order,
            geometry,
            bbox,
        }
    }

    /// Bounding box, `None` for empty geometries
    pub fn bbox(&self) -> Option<GeoBbox> {
        self.bbox
    }

    /// Closed containment test with a bounding-box precheck
    pub fn contains(&self, coord: Coord<f64>) -> bool {
        match self.bbox {
            Some(bbox) if bbox.contains(coord) => multi_polygon_contains(&self.geometry, coord),
            _ => false,
        }
    }
}

/// Regions that survived parsing, in request order, plus the ones dropped.
#[derive(Debug, Clone, Default)]
pub struct ParsedRegions {
    pub boundaries: Vec<RegionBoundary>,
    pub skipped: Vec<SkippedRegion>,
}

/// Parse every region once for this request.
///
/// Under `MalformedPolicy::Skip` a region that fails to parse is left out and
/// reported; under `MalformedPolicy::Abort` the first failure is returned.
pub fn parse_regions(
    specs: &[RegionSpec],
    policy: MalformedPolicy,
) -> Result<ParsedRegions, ClassifyError> {
    let mut parsed = ParsedRegions::default();

    for (order, spec) in specs.iter().enumerate() {
        match parse_wkt(&spec.wkt) {
            Ok(geometry) => {
                debug!(
                    "Parsed region '{}' (#{}) with {} polygon(s)",
                    spec.name,
                    order,
                    geometry.0.len()
                );
                parsed
                    .boundaries
                    .push(RegionBoundary::new(spec.name.clone(), order, geometry));
            }
            Err(source) => match policy {
                MalformedPolicy::Abort => {
                    return Err(ClassifyError::MalformedGeometry {
                        name: spec.name.clone(),
                        order,
                        source,
                    });
                }
                MalformedPolicy::Skip => {
                    warn!(
                        "Skipping region '{}' (#{}): malformed geometry: {}",
                        spec.name, order, source
                    );
                    parsed.skipped.push(SkippedRegion {
                        name: spec.name.clone(),
                        order,
                        reason: source.to_string(),
                    });
                }
            },
        }
    }

    info!(
        "Parsed {} region(s), skipped {}",
        parsed.boundaries.len(),
        parsed.skipped.len()
    );

    Ok(parsed)
}
