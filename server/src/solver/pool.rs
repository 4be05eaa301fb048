//! Runs solver calls on the blocking thread pool
//!
//! Solver calls are CPU-bound and can take hundreds of milliseconds on large
//! images. Running them inline would stall every connection served by the
//! same runtime worker, so each call is moved to `spawn_blocking` and the
//! number of calls in flight is capped by a semaphore.

use super::{SegmentationSolver, SolverError};
use crate::geometry::Rect;
use crate::mask::Mask;
use image::RgbImage;
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::debug;

/// Shared handle to a solver and its worker budget
#[derive(Clone)]
pub struct SolverPool {
    solver: Arc<dyn SegmentationSolver>,
    permits: Arc<Semaphore>,
    workers: usize,
}

impl SolverPool {
    pub fn new(solver: Arc<dyn SegmentationSolver>, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            solver,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn solver_name(&self) -> &'static str {
        self.solver.name()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Initialize a mask from a rectangle
    pub async fn init_with_rect(
        &self,
        image: Arc<RgbImage>,
        rect: Rect,
    ) -> Result<Mask, SolverError> {
        let solver = self.solver.clone();
        let input = image.clone();
        let mask = self
            .run("init_with_rect", move || solver.init_with_rect(&input, rect))
            .await?;
        SolverError::check_shape(&image, &mask)?;
        Ok(mask)
    }

    /// Refine an existing mask
    pub async fn refine_with_mask(
        &self,
        image: Arc<RgbImage>,
        mask: Arc<Mask>,
    ) -> Result<Mask, SolverError> {
        let solver = self.solver.clone();
        let input = image.clone();
        let refined = self
            .run("refine_with_mask", move || {
                solver.refine_with_mask(&input, &mask)
            })
            .await?;
        SolverError::check_shape(&image, &refined)?;
        Ok(refined)
    }

    async fn run<F>(&self, call: &'static str, job: F) -> Result<Mask, SolverError>
    where
        F: FnOnce() -> Result<Mask, SolverError> + Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SolverError::Unavailable)?;

        counter!("segment_solver_calls_total", "call" => call).increment(1);
        let start = Instant::now();

        // The permit travels with the job so it is held until the blocking
        // work finishes, even if the caller goes away
        let result = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| SolverError::Worker(e.to_string()))?;

        let elapsed = start.elapsed();
        histogram!("segment_solver_duration_seconds", "call" => call).record(elapsed);
        debug!("Solver {} finished in {:?}", call, elapsed);

        result
    }
}
