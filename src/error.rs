//! Error types for the classification engine.

use thiserror::Error;

use crate::pip::WktError;

/// Errors that fail a whole classification call.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// A region's geometry could not be parsed and the engine runs with
    /// `MalformedPolicy::Abort`.
    #[error("Malformed geometry for region '{name}' (#{order}): {source}")]
    MalformedGeometry {
        name: String,
        order: usize,
        source: WktError,
    },

    /// A worker violated an internal invariant or panicked. No partial
    /// result is produced.
    #[error("Worker fault: {0}")]
    WorkerFault(String),
}

impl ClassifyError {
    pub fn is_worker_fault(&self) -> bool {
        matches!(self, ClassifyError::WorkerFault(_))
    }
}
