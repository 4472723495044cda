//! Step executor trait definition
//!
//! This module defines the `StepExecutor` trait, which provides a backend-agnostic
//! interface for applying one stencil sweep to the whole lattice. The sequential,
//! thread-pool and GPU strategies all implement this trait, and the
//! [`Integrator`](super::Integrator) drives any of them the same way.

use super::Backend;
use crate::error::SolverResult;
use crate::grid::{Component, GridState};

/// Backend-agnostic interface for the per-sweep update
///
/// A sweep updates every cell of one component plane from frozen copies of both
/// planes, so implementations are free to visit cells in any order or all at
/// once. Results are guaranteed visible in the [`GridState`] only after
/// [`synchronize`](StepExecutor::synchronize) returns.
pub trait StepExecutor: Send {
    /// Copy the host field and potential to wherever the executor computes
    ///
    /// CPU executors work on the grid in place, so this is a no-op for them.
    ///
    /// # Errors
    ///
    /// `DeviceUnavailable` if the device rejects the transfer, `ShapeMismatch`
    /// if the grid does not match the executor's dimensions.
    fn upload(&mut self, grid: &GridState) -> SolverResult<()>;

    /// Apply `component += coeff · sign · H(partner)` to every cell
    ///
    /// # Arguments
    ///
    /// * `grid` - Grid being evolved
    /// * `component` - Plane to update
    /// * `dt` - Unsigned time increment of this sweep (`dt` or `dt / 2`);
    ///   the executor applies [`Component::sign`]
    ///
    /// # Errors
    ///
    /// `DeviceUnavailable` if a kernel dispatch fails.
    fn sweep(&mut self, grid: &mut GridState, component: Component, dt: f32) -> SolverResult<()>;

    /// Barrier: wait for all dispatched sweeps and publish results to `grid`
    ///
    /// # Errors
    ///
    /// `DeviceUnavailable` if readback fails.
    fn synchronize(&mut self, grid: &mut GridState) -> SolverResult<()>;

    /// Which strategy this is
    fn backend(&self) -> Backend;
}
