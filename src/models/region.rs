//! Region definitions as supplied by the caller.

use serde::{Deserialize, Serialize};

/// A named region with its geometry as WKT text.
///
/// The position of a region in the request is its tie-break rank: when two
/// regions contain the same point, the one listed first wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSpec {
    pub name: String,
    pub wkt: String,
}

impl RegionSpec {
    pub fn new(name: impl Into<String>, wkt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wkt: wkt.into(),
        }
    }
}

/// A region excluded from classification because its geometry was malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRegion {
    pub name: String,
    /// Position of the region in the request
    pub order: usize,
    pub reason: String,
}
