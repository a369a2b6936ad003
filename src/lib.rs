//! regionjoin - parallel point-in-region classification for earthquake catalogs
//!
//! This library provides the classification engine shared by the `classify`
//! and `bench` binaries, plus a C ABI for callers living in another runtime.

pub mod catalog;
pub mod config;
pub mod error;
pub mod ffi;
pub mod models;
pub mod pip;

pub use config::{EngineConfig, IndexStrategy, MalformedPolicy};
pub use error::ClassifyError;
pub use models::{GeoPoint, RegionSpec, SkippedRegion};
pub use pip::{classify, ClassificationResult, ClassificationStats, PipService, OUTSIDE_LABEL};
