//! Sequential step executor
//!
//! Single-threaded reference implementation of the `StepExecutor` trait. It
//! walks rows in order and writes into the grid's scratch plane, then commits.
//! Because every sweep reads only frozen planes, the visit order never affects
//! the result; the thread-pool executor runs the same row function and is
//! bit-identical.

use super::stencil::{update_row, StencilConstants};
use super::{Backend, StepExecutor};
use crate::config::SimulationConfig;
use crate::error::{SolverError, SolverResult};
use crate::grid::{Component, GridState};

/// Single-threaded executor
#[derive(Debug, Clone)]
pub struct SequentialExecutor {
    constants: StencilConstants,
}

impl SequentialExecutor {
    /// Create an executor for a `width × height` lattice
    #[must_use]
    pub fn new(config: &SimulationConfig, width: usize, height: usize) -> Self {
        Self {
            constants: StencilConstants::new(config, width, height),
        }
    }
}

impl StepExecutor for SequentialExecutor {
    fn upload(&mut self, grid: &GridState) -> SolverResult<()> {
        SolverError::check_shape(
            (self.constants.width, self.constants.height),
            (grid.width(), grid.height()),
        )
    }

    fn sweep(&mut self, grid: &mut GridState, component: Component, dt: f32) -> SolverResult<()> {
        let coeff = component.sign() * dt;
        let width = self.constants.width;
        {
            let buffers = grid.sweep_buffers(component);
            for (y, row) in buffers.output.chunks_mut(width).enumerate() {
                update_row(y, row, buffers.inputs, &self.constants, coeff);
            }
        }
        grid.commit(component);
        Ok(())
    }

    fn synchronize(&mut self, _grid: &mut GridState) -> SolverResult<()> {
        Ok(())
    }

    fn backend(&self) -> Backend {
        Backend::Sequential
    }
}
