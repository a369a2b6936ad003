//! PIP service for classifying a batch of points against named regions.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use super::boundary::parse_regions;
use super::index::RegionIndex;
use super::scheduler;
use crate::config::EngineConfig;
use crate::error::ClassifyError;
use crate::models::{GeoPoint, RegionSpec, SkippedRegion};

/// Label given to points that no region contains
pub const OUTSIDE_LABEL: &str = "Fuera de Perú";

/// Per-call telemetry
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassificationStats {
    pub points: usize,
    pub regions_parsed: usize,
    pub regions_skipped: usize,
    pub workers: usize,
    pub matched: usize,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

/// Ordered labels for one batch, one per input point.
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    labels: Vec<String>,
    skipped: Vec<SkippedRegion>,
    stats: ClassificationStats,
}

impl ClassificationResult {
    /// Region name or `OUTSIDE_LABEL` for every input point, in input order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn into_labels(self) -> Vec<String> {
        self.labels
    }

    /// Regions left out because their geometry was malformed
    pub fn skipped(&self) -> &[SkippedRegion] {
        &self.skipped
    }

    pub fn stats(&self) -> &ClassificationStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn is_outside(&self, i: usize) -> bool {
        self.labels.get(i).is_some_and(|l| l == OUTSIDE_LABEL)
    }
}

/// Point-in-Polygon classification service.
///
/// Stateless between calls: regions are parsed and indexed for each call and
/// dropped when it returns.
#[derive(Debug, Clone, Default)]
pub struct PipService {
    config: EngineConfig,
}

impl PipService {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Label every point with the first region (in `regions` order) that
    /// contains it, or `OUTSIDE_LABEL`.
    pub fn classify(
        &self,
        points: &[GeoPoint],
        regions: &[RegionSpec],
    ) -> Result<ClassificationResult, ClassifyError> {
        let started = Instant::now();
        let workers = self.config.resolve_workers();

        info!(
            "Classifying {} point(s) against {} region(s) with up to {} worker(s)",
            points.len(),
            regions.len(),
            workers
        );

        let parsed = parse_regions(regions, self.config.malformed)?;
        let index = RegionIndex::build(parsed.boundaries, self.config.index);

        let slots = scheduler::run(points, workers, index.len(), |p| index.lookup(p))?;

        let mut matched = 0;
        let labels: Vec<String> = slots
            .iter()
            .map(|slot| match slot.and_then(|rank| index.region(rank)) {
                Some(region) => {
                    matched += 1;
                    region.name.clone()
                }
                None => OUTSIDE_LABEL.to_string(),
            })
            .collect();

        let stats = ClassificationStats {
            points: points.len(),
            regions_parsed: index.len(),
            regions_skipped: parsed.skipped.len(),
            workers: scheduler::ChunkPlan::new(points.len(), workers).workers,
            matched,
            elapsed: started.elapsed(),
        };

        info!(
            "Classified {} point(s): {} inside a region, {} outside, {} region(s) skipped in {:.3}s",
            stats.points,
            stats.matched,
            stats.points - stats.matched,
            stats.regions_skipped,
            stats.elapsed.as_secs_f64()
        );

        Ok(ClassificationResult {
            labels,
            skipped: parsed.skipped,
            stats,
        })
    }
}

/// Classify with the default engine configuration.
pub fn classify(
    points: &[GeoPoint],
    regions: &[RegionSpec],
) -> Result<ClassificationResult, ClassifyError> {
    PipService::default().classify(points, regions)
}
