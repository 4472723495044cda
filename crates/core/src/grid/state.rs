//! Grid State: the complex field, its static potential, and the scratch plane
//! that makes every sweep double-buffered.

use super::{Plane, WavePacket};
use crate::config::BoundaryPolicy;
use crate::error::{SolverError, SolverResult};

/// Which half of the complex amplitude a sweep writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    /// Real plane, updated from the imaginary plane
    Real,
    /// Imaginary plane, updated from the real plane
    Imaginary,
}

impl Component {
    /// The plane this component's update reads through the stencil
    #[must_use]
    pub const fn partner(self) -> Self {
        match self {
            Self::Real => Self::Imaginary,
            Self::Imaginary => Self::Real,
        }
    }

    /// Sign of the Hamiltonian term: `ṙ = +H·i`, `i̇ = -H·r`
    #[must_use]
    pub const fn sign(self) -> f32 {
        match self {
            Self::Real => 1.0,
            Self::Imaginary => -1.0,
        }
    }
}

/// Read-only planes of one sweep
///
/// `source` and `target` are frozen for the whole sweep, so any cell may be
/// updated in any order (or concurrently) without changing the result.
#[derive(Debug, Clone, Copy)]
pub struct SweepInputs<'a> {
    /// Plane read through the stencil (the partner component)
    pub source: &'a [f32],
    /// Previous values of the plane being updated
    pub target: &'a [f32],
    /// Static potential
    pub potential: &'a [f32],
}

/// Borrowed views handed to an executor for one sweep
///
/// Results go to `output` and only become visible after [`GridState::commit`].
pub struct SweepBuffers<'a> {
    /// Frozen inputs
    pub inputs: SweepInputs<'a>,
    /// Scratch plane receiving the new values
    pub output: &'a mut [f32],
}

/// Complex wavefunction on a `width × height` lattice plus its potential
#[derive(Debug, Clone)]
pub struct GridState {
    real: Plane,
    imag: Plane,
    scratch: Plane,
    potential: Plane,
    width: usize,
    height: usize,
    dx: f32,
}

impl GridState {
    /// Create a zero field over the given potential
    ///
    /// # Arguments
    ///
    /// * `width` - Lattice width in cells
    /// * `height` - Lattice height in cells
    /// * `dx` - Spatial step
    /// * `potential` - Static potential; must be `width × height`
    ///
    /// # Errors
    ///
    /// `InvalidDimension` for a zero-sized lattice, `ShapeMismatch` when the
    /// potential has different dimensions, `InvalidConfig` for a bad `dx`.
    pub fn new(width: usize, height: usize, dx: f32, potential: Plane) -> SolverResult<Self> {
        let cells = SolverError::check_dimensions(width, height)?;
        SolverError::check_shape((width, height), potential.dimensions())?;
        if potential.data.len() != cells {
            return Err(SolverError::ShapeMismatch {
                expected: (width, height),
                actual: (potential.data.len(), 1),
            });
        }
        SolverError::check_positive("dx", dx)?;

        Ok(Self {
            real: Plane::new(width, height),
            imag: Plane::new(width, height),
            scratch: Plane::new(width, height),
            potential,
            width,
            height,
            dx,
        })
    }

    /// Lattice width in cells
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Lattice height in cells
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Spatial step
    #[must_use]
    pub fn dx(&self) -> f32 {
        self.dx
    }

    /// Area of one cell (`dx²`)
    #[must_use]
    pub fn cell_area(&self) -> f32 {
        self.dx * self.dx
    }

    /// Number of cells
    #[must_use]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// Always false: construction rejects empty lattices
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Real plane
    #[must_use]
    pub fn real(&self) -> &Plane {
        &self.real
    }

    /// Imaginary plane
    #[must_use]
    pub fn imag(&self) -> &Plane {
        &self.imag
    }

    /// Static potential
    #[must_use]
    pub fn potential(&self) -> &Plane {
        &self.potential
    }

    /// Plane backing `component`
    #[must_use]
    pub fn plane(&self, component: Component) -> &Plane {
        match component {
            Component::Real => &self.real,
            Component::Imaginary => &self.imag,
        }
    }

    /// `(re, im)` at `(x, y)`
    #[must_use]
    pub fn amplitude_at(&self, x: usize, y: usize) -> (f32, f32) {
        (self.real.get(x, y), self.imag.get(x, y))
    }

    /// `re² + im²` at `(x, y)`
    #[must_use]
    pub fn density_at(&self, x: usize, y: usize) -> f32 {
        let (re, im) = self.amplitude_at(x, y);
        re * re + im * im
    }

    /// Density with both coordinates wrapped onto the lattice
    ///
    /// `density_at_wrapped(width as isize, y)` is the same cell as column 0.
    #[must_use]
    pub fn density_at_wrapped(&self, x: isize, y: isize) -> f32 {
        let wx = x.rem_euclid(self.width as isize) as usize;
        let wy = y.rem_euclid(self.height as isize) as usize;
        self.density_at(wx, wy)
    }

    /// `Σ (re² + im²) · dx²`
    #[must_use]
    pub fn total_probability(&self) -> f32 {
        let sum: f64 = self
            .real
            .data
            .iter()
            .zip(&self.imag.data)
            .map(|(&re, &im)| f64::from(re * re + im * im))
            .sum();
        (sum * f64::from(self.cell_area())) as f32
    }

    /// Replace the field with caller-supplied planes
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` when either slice is not `width × height` long.
    pub fn set_field(&mut self, real: &[f32], imag: &[f32]) -> SolverResult<()> {
        for plane in [real, imag] {
            if plane.len() != self.len() {
                return Err(SolverError::ShapeMismatch {
                    expected: (self.width, self.height),
                    actual: (plane.len(), 1),
                });
            }
        }
        self.real.data.copy_from_slice(real);
        self.imag.data.copy_from_slice(imag);
        Ok(())
    }

    /// Seed a normalized Gaussian packet (total probability 1)
    pub fn seed_wave_packet(&mut self, packet: &WavePacket) {
        let (real, imag) = packet.sample(self.width, self.height, self.dx);
        self.real = real;
        self.imag = imag;
        self.normalize();
    }

    /// Rescale the field to unit total probability (no-op for a zero field)
    pub fn normalize(&mut self) {
        self.normalize_to(1.0);
    }

    /// Rescale the field so its total probability equals `target`
    ///
    /// No-op for a zero or non-finite field.
    pub fn normalize_to(&mut self, target: f32) {
        let total = self.total_probability();
        if total > 0.0 && total.is_finite() {
            let scale = (target / total).sqrt();
            self.real.data.iter_mut().for_each(|v| *v *= scale);
            self.imag.data.iter_mut().for_each(|v| *v *= scale);
        }
    }

    /// Reset the field to zero
    pub fn clear(&mut self) {
        self.real.fill(0.0);
        self.imag.fill(0.0);
    }

    /// Apply a boundary policy to both planes
    ///
    /// Reflective pins the outer ring to zero; periodic has no ring to fix.
    pub fn apply_boundary(&mut self, policy: BoundaryPolicy) {
        if policy == BoundaryPolicy::Reflective {
            self.real.zero_ring();
            self.imag.zero_ring();
        }
    }

    /// Apply `policy`, then restore the total probability the ring held
    ///
    /// Returns the probability removed from the reflective ring (0 when the
    /// ring was already empty, in which case the field is left untouched).
    pub fn enforce_boundary(&mut self, policy: BoundaryPolicy) -> f32 {
        let before = self.total_probability();
        self.apply_boundary(policy);
        let removed = before - self.total_probability();
        if removed > 0.0 {
            self.normalize_to(before);
        }
        removed
    }

    /// Split-borrow the planes needed to update `component`
    pub fn sweep_buffers(&mut self, component: Component) -> SweepBuffers<'_> {
        let (target, source) = match component {
            Component::Real => (&self.real, &self.imag),
            Component::Imaginary => (&self.imag, &self.real),
        };
        SweepBuffers {
            inputs: SweepInputs {
                source: source.as_slice(),
                target: target.as_slice(),
                potential: self.potential.as_slice(),
            },
            output: self.scratch.as_mut_slice(),
        }
    }

    /// Publish the scratch plane as the new `component` plane
    pub fn commit(&mut self, component: Component) {
        let target = match component {
            Component::Real => &mut self.real,
            Component::Imaginary => &mut self.imag,
        };
        std::mem::swap(target, &mut self.scratch);
    }
}
