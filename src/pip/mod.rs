//! Point-in-Polygon (PIP) region classification.
//!
//! Parses region WKT once per call, indexes the regions in an R-tree and
//! labels each point in parallel with the first region that contains it.

mod boundary;
mod index;
pub mod predicate;
pub mod scheduler;
mod service;
pub mod wkt;

pub use boundary::{parse_regions, ParsedRegions, RegionBoundary};
pub use index::RegionIndex;
pub use service::{classify, ClassificationResult, ClassificationStats, PipService, OUTSIDE_LABEL};
pub use wkt::{parse_wkt, WktError};
