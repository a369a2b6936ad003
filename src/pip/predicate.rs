//! Crossing-number point-in-polygon test.
//!
//! Boundary rule: polygons are closed sets and holes are open. A point lying
//! exactly on an exterior edge is inside; a point lying exactly on a hole's
//! edge is also inside, since the hole's edge belongs to the polygon. This
//! matches an "intersects" spatial join.
//!
//! Every side-of-edge decision goes through geo's exact `orient2d`, so points
//! a few ulps from an edge land on the correct side.

use geo::kernels::{Kernel, Orientation, RobustKernel};
use geo::{Coord, LineString, MultiPolygon, Polygon};

/// Where a coordinate lies relative to a single ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingPosition {
    Inside,
    OnBoundary,
    Outside,
}

/// Classify `p` against a closed ring using an even-odd ray cast towards +x.
pub fn ring_position(ring: &LineString<f64>, p: Coord<f64>) -> RingPosition {
    let mut inside = false;
    for edge in ring.0.windows(2) {
        let (a, b) = (edge[0], edge[1]);
        let orientation = RobustKernel::orient2d(a, b, p);

        if orientation == Orientation::Collinear && within_span(a, b, p) {
            return RingPosition::OnBoundary;
        }

        // Half-open in y so a ray through a vertex is counted once
        let crosses = if a.y <= p.y && b.y > p.y {
            orientation == Orientation::CounterClockwise
        } else if b.y <= p.y && a.y > p.y {
            orientation == Orientation::Clockwise
        } else {
            false
        };
        if crosses {
            inside = !inside;
        }
    }

    if inside {
        RingPosition::Inside
    } else {
        RingPosition::Outside
    }
}

/// `p` lies in the bounding box of segment `ab`. Together with a collinear
/// orientation this puts `p` on the segment.
fn within_span(a: Coord<f64>, b: Coord<f64>, p: Coord<f64>) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// Inside (or on) the exterior and not strictly inside any hole.
pub fn polygon_contains(polygon: &Polygon<f64>, p: Coord<f64>) -> bool {
    match ring_position(polygon.exterior(), p) {
        RingPosition::Outside => false,
        RingPosition::OnBoundary => true,
        RingPosition::Inside => polygon
            .interiors()
            .iter()
            .all(|hole| ring_position(hole, p) != RingPosition::Inside),
    }
}

/// True if any sub-polygon contains `p`.
pub fn multi_polygon_contains(geometry: &MultiPolygon<f64>, p: Coord<f64>) -> bool {
    geometry.iter().any(|polygon| polygon_contains(polygon, p))
}
