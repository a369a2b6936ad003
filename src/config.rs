use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::models::RegionSpec;

/// What to do with a region whose WKT fails to parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// Drop the region, log it and report it in the result.
    #[default]
    Skip,
    /// Fail the whole call.
    Abort,
}

/// How candidate regions are found for a point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStrategy {
    /// R-tree over region bounding boxes
    #[default]
    Rtree,
    /// Test every region in caller order
    Scan,
}

/// Engine settings for one classification call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker count. Defaults to the available hardware parallelism.
    pub workers: Option<usize>,
    /// Upper bound applied after `workers` is resolved. Defaults to the
    /// available hardware parallelism.
    pub max_workers: Option<usize>,
    pub malformed: MalformedPolicy,
    pub index: IndexStrategy,
}

impl EngineConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_malformed(mut self, policy: MalformedPolicy) -> Self {
        self.malformed = policy;
        self
    }

    pub fn with_index(mut self, index: IndexStrategy) -> Self {
        self.index = index;
        self
    }

    /// Resolve the worker count: explicit value or hardware parallelism,
    /// never below 1. `max_workers` is the ceiling when set; otherwise the
    /// hardware parallelism is, so an explicit count never oversubscribes
    /// unless the caller raises the ceiling.
    pub fn resolve_workers(&self) -> usize {
        let available = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        let requested = self.workers.unwrap_or(available);
        let ceiling = self.max_workers.unwrap_or(available);
        requested.min(ceiling).max(1)
    }
}

/// Settings file for the binaries.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RunConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    /// Inline region definitions, in tie-break order.
    #[serde(default)]
    pub regions: Vec<RegionSpec>,
    /// CSV file with region names and WKT geometries.
    pub regions_file: Option<PathBuf>,
}

impl RunConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: RunConfig = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}
