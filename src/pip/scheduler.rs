//! Parallel batch scheduler.
//!
//! The batch is cut into contiguous chunks, one per worker. Every worker
//! writes into its own disjoint sub-slice of a pre-sized result arena, so the
//! compute phase needs no locks. The pool lives only for one call and the
//! call returns after all workers have joined.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::debug;

use crate::error::ClassifyError;
use crate::models::GeoPoint;

/// How a batch of `len` points is split across workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub workers: usize,
    pub chunk_len: usize,
}

impl ChunkPlan {
    /// Contiguous chunks of `ceil(len / workers)` points. Never plans more
    /// workers than there are chunks.
    pub fn new(len: usize, requested_workers: usize) -> Self {
        let requested = requested_workers.max(1);
        if len == 0 {
            return Self {
                workers: 1,
                chunk_len: 1,
            };
        }
        let chunk_len = len.div_ceil(requested.min(len));
        Self {
            workers: len.div_ceil(chunk_len),
            chunk_len,
        }
    }

    /// Index range covered by chunk `chunk` in a batch of `len` points
    pub fn range(&self, chunk: usize, len: usize) -> std::ops::Range<usize> {
        let start = (chunk * self.chunk_len).min(len);
        let end = (start + self.chunk_len).min(len);
        start..end
    }
}

/// Run `locate` over every point on a call-scoped pool of `workers` threads.
///
/// Returns one slot per point, in input order. `locate` must return a rank
/// below `limit`; anything else, or a panic in any worker, fails the whole
/// call with `ClassifyError::WorkerFault`.
pub fn run<F>(
    points: &[GeoPoint],
    workers: usize,
    limit: usize,
    locate: F,
) -> Result<Vec<Option<usize>>, ClassifyError>
where
    F: Fn(&GeoPoint) -> Option<usize> + Sync,
{
    let mut slots: Vec<Option<usize>> = vec![None; points.len()];
    if points.is_empty() {
        return Ok(slots);
    }

    let plan = ChunkPlan::new(points.len(), workers);
    debug!(
        "Scheduling {} points as {} chunk(s) of up to {}",
        points.len(),
        plan.workers,
        plan.chunk_len
    );

    let pool = ThreadPoolBuilder::new()
        .num_threads(plan.workers)
        .thread_name(|i| format!("regionjoin-worker-{i}"))
        .build()
        .map_err(|e| ClassifyError::WorkerFault(format!("failed to start worker pool: {e}")))?;

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        pool.install(|| {
            slots
                .par_chunks_mut(plan.chunk_len)
                .zip(points.par_chunks(plan.chunk_len))
                .enumerate()
                .try_for_each(|(chunk, (out, batch))| {
                    classify_chunk(chunk, out, batch, limit, &locate)
                })
        })
    }));

    match outcome {
        Ok(Ok(())) => Ok(slots),
        Ok(Err(e)) => Err(e),
        Err(payload) => Err(ClassifyError::WorkerFault(format!(
            "worker panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

fn classify_chunk<F>(
    chunk: usize,
    out: &mut [Option<usize>],
    batch: &[GeoPoint],
    limit: usize,
    locate: &F,
) -> Result<(), ClassifyError>
where
    F: Fn(&GeoPoint) -> Option<usize> + Sync,
{
    if out.len() != batch.len() {
        return Err(ClassifyError::WorkerFault(format!(
            "chunk {chunk}: {} output slots for {} points",
            out.len(),
            batch.len()
        )));
    }

    for (offset, (slot, point)) in out.iter_mut().zip(batch).enumerate() {
        let rank = locate(point);
        if let Some(r) = rank {
            if r >= limit {
                return Err(ClassifyError::WorkerFault(format!(
                    "chunk {chunk}, point {offset}: region rank {r} out of range ({limit} regions)"
                )));
            }
        }
        *slot = rank;
    }
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
