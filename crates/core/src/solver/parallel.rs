//! Thread-pool step executor
//!
//! Rayon implementation of the `StepExecutor` trait. Each sweep hands one row
//! of the scratch plane to each task via `par_chunks_mut(width)`; returning
//! from the parallel iterator is the barrier between half-steps. Every task
//! reads only the frozen source and target planes, so there are no data races
//! and no locks.

use super::stencil::{update_row, StencilConstants};
use super::{Backend, StepExecutor};
use crate::config::SimulationConfig;
use crate::error::{SolverError, SolverResult};
use crate::grid::{Component, GridState};
use rayon::prelude::*;
use tracing::info;

/// Rayon-backed executor with a dedicated pool
pub struct ParallelExecutor {
    pool: rayon::ThreadPool,
    constants: StencilConstants,
}

impl ParallelExecutor {
    /// Build the thread pool
    ///
    /// # Arguments
    ///
    /// * `config` - Run configuration
    /// * `width` - Lattice width in cells
    /// * `height` - Lattice height in cells
    /// * `threads` - Worker count; `None` or `Some(0)` uses rayon's default
    ///
    /// # Errors
    ///
    /// `DeviceUnavailable` if the pool cannot be built.
    pub fn new(
        config: &SimulationConfig,
        width: usize,
        height: usize,
        threads: Option<usize>,
    ) -> SolverResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.unwrap_or(0))
            .thread_name(|i| format!("schrodinger-worker-{i}"))
            .build()
            .map_err(|e| SolverError::DeviceUnavailable(format!("thread pool: {e}")))?;
        info!(
            "Thread pool ready: {} workers for {}x{} grid",
            pool.current_num_threads(),
            width,
            height
        );
        Ok(Self {
            pool,
            constants: StencilConstants::new(config, width, height),
        })
    }

    /// Number of worker threads in the pool
    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl StepExecutor for ParallelExecutor {
    fn upload(&mut self, grid: &GridState) -> SolverResult<()> {
        SolverError::check_shape(
            (self.constants.width, self.constants.height),
            (grid.width(), grid.height()),
        )
    }

    fn sweep(&mut self, grid: &mut GridState, component: Component, dt: f32) -> SolverResult<()> {
        let coeff = component.sign() * dt;
        let k = &self.constants;
        {
            let buffers = grid.sweep_buffers(component);
            let inputs = buffers.inputs;
            self.pool.install(|| {
                buffers
                    .output
                    .par_chunks_mut(k.width)
                    .enumerate()
                    .for_each(|(y, row)| update_row(y, row, inputs, k, coeff));
            });
        }
        grid.commit(component);
        Ok(())
    }

    fn synchronize(&mut self, _grid: &mut GridState) -> SolverResult<()> {
        Ok(())
    }

    fn backend(&self) -> Backend {
        Backend::ThreadPool
    }
}
