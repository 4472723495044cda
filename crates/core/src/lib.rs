//! Schrödinger Solver Core Library
//!
//! Integrates the time-dependent Schrödinger equation (ħ = 1) on a uniform 2D
//! grid with a staggered leapfrog scheme, and samples the evolving wavefunction
//! into frames for live display or binary trajectory files.
//!
//! ## Execution strategies
//!
//! The same stencil update runs on three interchangeable backends:
//! - single-threaded sweep (reference)
//! - rayon thread pool, one task per row
//! - wgpu compute shader, one invocation per cell (`gpu` feature)
//!
//! All three produce numerically equivalent trajectories; the CPU backends are
//! bit-identical.
//!
//! ## Example
//!
//! ```rust,no_run
//! use schrodinger_core::{
//!     ExecutionContext, GridState, PotentialField, SimulationConfig, SimulationEngine,
//!     WavePacket,
//! };
//!
//! # fn main() -> Result<(), schrodinger_core::SolverError> {
//! let mut grid = GridState::new(64, 64, 1.0, PotentialField::zero(64, 64))?;
//! grid.seed_wave_packet(&WavePacket::default());
//! let mut engine = SimulationEngine::new(grid, SimulationConfig::default(), ExecutionContext::Sequential)?;
//! let mut frames = Vec::new();
//! engine.run(50, &mut frames)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod grid;
pub mod simulation;
pub mod solver;

pub use config::{BoundaryPolicy, SimulationConfig, StencilCoefficients};
pub use error::{SolverError, SolverResult};
pub use grid::{Component, GridState, Plane, PotentialField, WavePacket};
pub use simulation::{
    Frame, FrameSampler, FrameSink, Observable, PotentialPreset, RunSummary, ScenarioConfig,
    SimulationEngine, TrajectoryHeader, TrajectoryReader, TrajectoryWriter,
};
pub use solver::{
    create_executor, Backend, ExecutionContext, Integrator, ParallelExecutor, SequentialExecutor,
    StepExecutor,
};

#[cfg(feature = "gpu")]
pub use solver::GpuExecutor;
