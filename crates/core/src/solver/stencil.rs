//! Stencil Operator
//!
//! Evaluates the discrete Hamiltonian `H·p = -(1/2m)∇²p + V·p` at a single
//! cell. These functions are pure and shared verbatim by the sequential and
//! thread-pool executors; the WGSL kernel evaluates the same expression in the
//! same order.
//!
//! # Boundary handling
//!
//! - `Periodic`: neighbour indices wrap, every cell uses the stencil.
//! - `Reflective`: only interior cells use the stencil; the outer ring is
//!   written last and pinned to zero.

use crate::config::{BoundaryPolicy, SimulationConfig};
use crate::grid::SweepInputs;

/// Stencil weights with the kinetic prefactor `-1 / (2 m dx²)` folded in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StencilConstants {
    /// Weight of the centre cell (potential is added per cell)
    pub center: f32,
    /// Weight of the sum of the four edge neighbours
    pub orthogonal: f32,
    /// Weight of the sum of the four corner neighbours
    pub diagonal: f32,
    /// Whether corner neighbours contribute at all
    pub diagonals: bool,
    /// Boundary policy shared by every executor
    pub boundary: BoundaryPolicy,
    /// Lattice width in cells
    pub width: usize,
    /// Lattice height in cells
    pub height: usize,
}

impl StencilConstants {
    /// Fold the configuration into per-run constants
    #[must_use]
    pub fn new(config: &SimulationConfig, width: usize, height: usize) -> Self {
        let kinetic = -1.0 / (2.0 * config.mass * config.dx * config.dx);
        Self {
            center: kinetic * config.stencil.center,
            orthogonal: kinetic * config.stencil.orthogonal,
            diagonal: kinetic * config.stencil.diagonal,
            diagonals: config.stencil.uses_diagonals(),
            boundary: config.boundary,
            width,
            height,
        }
    }

    /// Whether `(x, y)` is a ring cell handled by the boundary policy
    #[inline]
    #[must_use]
    pub fn is_ring(&self, x: usize, y: usize) -> bool {
        self.boundary == BoundaryPolicy::Reflective
            && (x == 0 || y == 0 || x + 1 == self.width || y + 1 == self.height)
    }
}

#[inline(always)]
fn wrap_dec(i: usize, n: usize) -> usize {
    if i == 0 {
        n - 1
    } else {
        i - 1
    }
}

#[inline(always)]
fn wrap_inc(i: usize, n: usize) -> usize {
    if i + 1 == n {
        0
    } else {
        i + 1
    }
}

/// `H·p` at `(x, y)`
///
/// For the reflective policy the caller must only pass interior cells.
#[inline]
#[must_use]
pub fn hamiltonian_at(
    plane: &[f32],
    potential: &[f32],
    x: usize,
    y: usize,
    k: &StencilConstants,
) -> f32 {
    let (w, h) = (k.width, k.height);
    let (xl, xr, yu, yd) = match k.boundary {
        BoundaryPolicy::Periodic => (wrap_dec(x, w), wrap_inc(x, w), wrap_dec(y, h), wrap_inc(y, h)),
        BoundaryPolicy::Reflective => {
            debug_assert!(!k.is_ring(x, y), "ring cell ({x}, {y}) passed to stencil");
            (x - 1, x + 1, y - 1, y + 1)
        }
    };

    let row = y * w;
    let up = yu * w;
    let down = yd * w;
    let idx = row + x;

    let p0 = plane[idx];
    let orth = (plane[row + xl] + plane[row + xr]) + (plane[up + x] + plane[down + x]);
    let mut value = (k.center + potential[idx]) * p0 + k.orthogonal * orth;
    if k.diagonals {
        let diag = (plane[up + xl] + plane[up + xr]) + (plane[down + xl] + plane[down + xr]);
        value += k.diagonal * diag;
    }
    value
}

/// Update one row: `out[x] = target[x] + coeff · H(source)[x]`
///
/// Interior cells first, then the ring cells of the row are pinned to zero
/// when the policy is reflective.
///
/// # Arguments
///
/// * `y` - Row index
/// * `out` - Output row (`width` cells) in the scratch plane
/// * `inputs` - Frozen source/target/potential planes
/// * `k` - Stencil constants
/// * `coeff` - Signed time increment (`±dt` or `±dt/2`)
#[inline]
pub fn update_row(y: usize, out: &mut [f32], inputs: SweepInputs<'_>, k: &StencilConstants, coeff: f32) {
    let row = y * k.width;
    for (x, cell) in out.iter_mut().enumerate() {
        if k.is_ring(x, y) {
            continue;
        }
        let h = hamiltonian_at(inputs.source, inputs.potential, x, y, k);
        *cell = inputs.target[row + x] + coeff * h;
    }

    if k.boundary == BoundaryPolicy::Reflective {
        if y == 0 || y + 1 == k.height {
            out.fill(0.0);
        } else {
            out[0] = 0.0;
            out[k.width - 1] = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StencilCoefficients;
    use approx::assert_relative_eq;

    fn constants(boundary: BoundaryPolicy, stencil: StencilCoefficients, n: usize) -> StencilConstants {
        let config = SimulationConfig {
            boundary,
            stencil,
            ..SimulationConfig::default()
        };
        StencilConstants::new(&config, n, n)
    }

    #[test]
    fn test_constant_field_has_only_potential_energy() {
        let k = constants(BoundaryPolicy::Periodic, StencilCoefficients::nine_point(), 5);
        let plane = vec![2.0_f32; 25];
        let potential = vec![3.0_f32; 25];
        for y in 0..5 {
            for x in 0..5 {
                assert_relative_eq!(
                    hamiltonian_at(&plane, &potential, x, y, &k),
                    6.0,
                    epsilon = 1e-5
                );
            }
        }
    }

    #[test]
    fn test_point_source_five_point() {
        // Unit spike: ∇² = -4 at the spike, +1 at each neighbour
        // H = -(1/2)∇² with m = dx = 1
        let k = constants(BoundaryPolicy::Reflective, StencilCoefficients::five_point(), 5);
        let mut plane = vec![0.0_f32; 25];
        plane[2 * 5 + 2] = 1.0;
        let potential = vec![0.0_f32; 25];
        assert_relative_eq!(hamiltonian_at(&plane, &potential, 2, 2, &k), 2.0);
        assert_relative_eq!(hamiltonian_at(&plane, &potential, 1, 2, &k), -0.5);
        assert_eq!(hamiltonian_at(&plane, &potential, 1, 1, &k), 0.0);
    }

    #[test]
    fn test_periodic_wraps_neighbours() {
        let k = constants(BoundaryPolicy::Periodic, StencilCoefficients::five_point(), 4);
        let mut plane = vec![0.0_f32; 16];
        plane[3] = 1.0; // (3, 0)
        let potential = vec![0.0_f32; 16];
        // (0, 0) sees (3, 0) as its left neighbour
        assert_relative_eq!(hamiltonian_at(&plane, &potential, 0, 0, &k), -0.5);
        // (3, 3) sees (3, 0) as its lower neighbour
        assert_relative_eq!(hamiltonian_at(&plane, &potential, 3, 3, &k), -0.5);
    }

    #[test]
    fn test_update_row_pins_reflective_ring() {
        let k = constants(BoundaryPolicy::Reflective, StencilCoefficients::five_point(), 4);
        let source = vec![1.0_f32; 16];
        let target = vec![1.0_f32; 16];
        let potential = vec![0.0_f32; 16];
        let inputs = SweepInputs {
            source: &source,
            target: &target,
            potential: &potential,
        };

        let mut out = vec![9.0_f32; 4];
        update_row(0, &mut out, inputs, &k, 0.1);
        assert_eq!(out, vec![0.0; 4]);

        let mut out = vec![9.0_f32; 4];
        update_row(1, &mut out, inputs, &k, 0.1);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[3], 0.0);
        // Constant source: zero curvature, zero potential → target unchanged
        assert_eq!(out[1], 1.0);
        assert_eq!(out[2], 1.0);
    }
}
