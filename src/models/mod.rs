//! Core data models for the classification engine.

pub mod point;
pub mod region;

pub use point::{GeoBbox, GeoPoint};
pub use region::{RegionSpec, SkippedRegion};
