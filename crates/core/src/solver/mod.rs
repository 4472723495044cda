//! Leapfrog solver module
//!
//! This module provides the stencil operator, the leapfrog time integrator and
//! the execution strategies that apply it. The core abstraction is the
//! `StepExecutor` trait, which has sequential, thread-pool and GPU
//! implementations.
//!
//! # Feature Flags
//!
//! - `gpu` (default): Enables GPU acceleration via wgpu. Disable with `--no-default-features`
//!   for environments without GPU access.
//!
//! # Backend Selection
//!
//! The caller picks the strategy with an [`ExecutionContext`]. There is no
//! silent fallback: if the requested device is unavailable, [`create_executor`]
//! returns `DeviceUnavailable`.
//!
//! # Example
//!
//! ```rust,ignore
//! use schrodinger_core::solver::{create_executor, ExecutionContext, Integrator};
//!
//! let mut executor = create_executor(ExecutionContext::Sequential, &grid, &config)?;
//! Integrator::new(config.dt).advance(executor.as_mut(), &mut grid, 100)?;
//! executor.synchronize(&mut grid)?;
//! ```

mod context;
mod cpu;
mod integrator;
mod parallel;
pub mod profiler;
pub mod stencil;
#[allow(clippy::module_name_repetitions)]
mod r#trait;

#[cfg(feature = "gpu")]
mod gpu;

// Re-exports
pub use context::{Backend, ExecutionContext, GpuInitResult};
pub use cpu::SequentialExecutor;
pub use integrator::Integrator;
pub use parallel::ParallelExecutor;
pub use profiler::{FrameTimer, ProfilerScope};
pub use r#trait::StepExecutor;

#[cfg(feature = "gpu")]
pub use context::GpuContext;
#[cfg(feature = "gpu")]
pub use gpu::GpuExecutor;

use crate::config::SimulationConfig;
use crate::error::{SolverError, SolverResult};
use crate::grid::GridState;
use tracing::info;

#[cfg(feature = "gpu")]
use tracing::warn;

/// Create the executor requested by `context`
///
/// # Arguments
///
/// * `context` - Requested strategy
/// * `grid` - Grid the executor will evolve (dimensions only; call
///   [`StepExecutor::upload`] before sweeping)
/// * `config` - Run configuration
///
/// # Errors
///
/// `DeviceUnavailable` when the thread pool cannot be built, no GPU is found,
/// the GPU fails to initialize or the grid exceeds its limits, or the crate
/// was built without the `gpu` feature and `Gpu` was requested.
pub fn create_executor(
    context: ExecutionContext,
    grid: &GridState,
    config: &SimulationConfig,
) -> SolverResult<Box<dyn StepExecutor>> {
    let (width, height) = (grid.width(), grid.height());
    match context {
        ExecutionContext::Sequential => {
            info!("Using sequential backend ({}x{} grid)", width, height);
            Ok(Box::new(SequentialExecutor::new(config, width, height)))
        }
        ExecutionContext::ThreadPool { threads } => Ok(Box::new(ParallelExecutor::new(
            config, width, height, threads,
        )?)),
        ExecutionContext::Gpu => create_gpu_executor(grid, config),
    }
}

#[cfg(feature = "gpu")]
fn create_gpu_executor(
    grid: &GridState,
    config: &SimulationConfig,
) -> SolverResult<Box<dyn StepExecutor>> {
    match GpuContext::new() {
        GpuInitResult::Success(gpu_context) => {
            info!(
                "Using GPU backend: {} ({}x{} grid)",
                gpu_context.adapter_name(),
                grid.width(),
                grid.height()
            );
            Ok(Box::new(GpuExecutor::new(
                gpu_context,
                config,
                grid.width(),
                grid.height(),
            )?))
        }
        GpuInitResult::NoGpuFound => Err(SolverError::DeviceUnavailable(
            "no compatible GPU adapter found".to_string(),
        )),
        GpuInitResult::InitFailed {
            adapter_name,
            error,
        } => {
            warn!("GPU '{}' found but failed to initialize: {}", adapter_name, error);
            Err(SolverError::DeviceUnavailable(format!(
                "GPU '{adapter_name}' failed to initialize: {error}"
            )))
        }
    }
}

#[cfg(not(feature = "gpu"))]
fn create_gpu_executor(
    _grid: &GridState,
    _config: &SimulationConfig,
) -> SolverResult<Box<dyn StepExecutor>> {
    info!("GPU requested but the gpu feature is disabled");
    Err(SolverError::DeviceUnavailable(
        "built without the `gpu` feature".to_string(),
    ))
}
