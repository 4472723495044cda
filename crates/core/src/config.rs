//! Run configuration
//!
//! `SimulationConfig` is fixed for the lifetime of a run. It is serde-friendly so
//! drivers can keep scenarios in JSON files next to their trajectory output.

use crate::error::{SolverError, SolverResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Tolerance for the zero-sum check on Laplacian coefficients
const STENCIL_SUM_TOLERANCE: f32 = 1e-5;

/// Rule applied to the outermost ring of cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Hard wall: amplitude on the outer ring is pinned to exactly zero
    #[default]
    Reflective,
    /// Neighbour lookups wrap around both axes
    Periodic,
}

/// Weights of the discrete Laplacian
///
/// The Laplacian at a cell is
/// `(center * ψ₀ + orthogonal * Σ ψ_{N,S,E,W} + diagonal * Σ ψ_{NE,NW,SE,SW}) / dx²`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StencilCoefficients {
    /// Weight of the cell itself
    pub center: f32,
    /// Weight of each of the four edge neighbours
    pub orthogonal: f32,
    /// Weight of each of the four corner neighbours (zero disables them)
    pub diagonal: f32,
}

impl StencilCoefficients {
    /// Standard second-order 5-point Laplacian
    #[must_use]
    pub const fn five_point() -> Self {
        Self {
            center: -4.0,
            orthogonal: 1.0,
            diagonal: 0.0,
        }
    }

    /// Isotropic 9-point (Patra-Karttunen / Mehrstellen) Laplacian
    #[must_use]
    pub fn nine_point() -> Self {
        Self {
            center: -20.0 / 6.0,
            orthogonal: 4.0 / 6.0,
            diagonal: 1.0 / 6.0,
        }
    }

    /// Whether the corner neighbours need to be read at all
    #[must_use]
    pub fn uses_diagonals(&self) -> bool {
        self.diagonal != 0.0
    }

    /// Largest eigenvalue magnitude of the discrete Laplacian times `dx²`
    ///
    /// Reached by the checkerboard mode, where edge neighbours carry the
    /// opposite sign and corner neighbours the same sign as the centre.
    #[must_use]
    pub fn spectral_radius(&self) -> f32 {
        (self.center - 4.0 * self.orthogonal + 4.0 * self.diagonal).abs()
    }

    /// Check the coefficients describe a consistent Laplacian
    ///
    /// # Errors
    ///
    /// Returns `InvalidStencil` when the weights don't sum to zero (a constant
    /// field must have zero curvature) or are not finite.
    pub fn validate(&self) -> SolverResult<()> {
        let sum = self.center + 4.0 * self.orthogonal + 4.0 * self.diagonal;
        let finite = self.center.is_finite() && self.orthogonal.is_finite() && self.diagonal.is_finite();
        if !finite || sum.abs() > STENCIL_SUM_TOLERANCE {
            return Err(SolverError::InvalidStencil { sum });
        }
        Ok(())
    }
}

impl Default for StencilCoefficients {
    fn default() -> Self {
        Self::five_point()
    }
}

/// Immutable parameters of a run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Spatial step (same along both axes)
    pub dx: f32,
    /// Time step
    pub dt: f32,
    /// Particle mass (ħ = 1 units)
    pub mass: f32,
    /// Outer ring treatment
    pub boundary: BoundaryPolicy,
    /// Laplacian weights
    pub stencil: StencilCoefficients,
    /// Integrator steps between two sampled frames
    pub steps_per_frame: usize,
    /// Divergence threshold as a multiple of the initial total probability
    ///
    /// A frame is reported as divergent when one cell holds more probability
    /// (`density · dx²`) than `bound` times the whole field held at frame 0.
    /// `None` disables the check; non-finite frames are always reported.
    pub divergence_bound: Option<f32>,
    /// Turn a divergence report into a hard `NumericDivergence` error
    pub abort_on_divergence: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dx: 1.0,
            dt: 0.01,
            mass: 1.0,
            boundary: BoundaryPolicy::Reflective,
            stencil: StencilCoefficients::five_point(),
            steps_per_frame: 20,
            divergence_bound: Some(10.0),
            abort_on_divergence: false,
        }
    }
}

impl SimulationConfig {
    /// Validate every field
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for non-positive or non-finite scalars and a zero frame
    /// stride, `InvalidStencil` for inconsistent Laplacian weights.
    pub fn validate(&self) -> SolverResult<()> {
        SolverError::check_positive("dx", self.dx)?;
        SolverError::check_positive("dt", self.dt)?;
        SolverError::check_positive("mass", self.mass)?;
        if self.steps_per_frame == 0 {
            return Err(SolverError::InvalidConfig(
                "steps_per_frame must be at least 1".to_string(),
            ));
        }
        if let Some(bound) = self.divergence_bound {
            SolverError::check_positive("divergence_bound", bound)?;
        }
        self.stencil.validate()
    }

    /// Largest time step for which the leapfrog scheme stays stable
    ///
    /// The scheme is stable while `dt * λ_max < 2`, where `λ_max` bounds the
    /// spectrum of the discrete Hamiltonian: the kinetic part
    /// `ρ / (2 m dx²)` plus the largest potential magnitude.
    ///
    /// # Arguments
    ///
    /// * `max_potential` - Largest `|V|` over the lattice
    #[must_use]
    pub fn stability_limit(&self, max_potential: f32) -> f32 {
        let kinetic = self.stencil.spectral_radius() / (2.0 * self.mass * self.dx * self.dx);
        2.0 / (kinetic + max_potential.abs())
    }

    /// Load configuration from a JSON file
    ///
    /// Missing fields fall back to [`SimulationConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, `Config` if it cannot be parsed
    /// and any validation error from [`SimulationConfig::validate`].
    pub fn load<P: AsRef<Path>>(path: P) -> SolverResult<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns `Config` on serialization failure, `Io` on write failure.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> SolverResult<()> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.boundary, BoundaryPolicy::Reflective);
        assert_eq!(config.steps_per_frame, 20);
    }

    #[test]
    fn test_stencil_presets_sum_to_zero() {
        assert!(StencilCoefficients::five_point().validate().is_ok());
        assert!(StencilCoefficients::nine_point().validate().is_ok());
        assert!(!StencilCoefficients::five_point().uses_diagonals());
        assert!(StencilCoefficients::nine_point().uses_diagonals());
    }

    #[test]
    fn test_inconsistent_stencil_rejected() {
        let stencil = StencilCoefficients {
            center: -4.0,
            orthogonal: 1.0,
            diagonal: 0.5,
        };
        match stencil.validate() {
            Err(SolverError::InvalidStencil { sum }) => assert_relative_eq!(sum, 2.0),
            other => panic!("expected InvalidStencil, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_scalars_rejected() {
        let config = SimulationConfig {
            dt: -0.1,
            ..SimulationConfig::default()
        };
        assert!(matches!(config.validate(), Err(SolverError::InvalidConfig(_))));

        let config = SimulationConfig {
            steps_per_frame: 0,
            ..SimulationConfig::default()
        };
        assert!(matches!(config.validate(), Err(SolverError::InvalidConfig(_))));

        let config = SimulationConfig {
            mass: f32::NAN,
            ..SimulationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stability_limit_five_point() {
        // ρ = 8 for the 5-point stencil, so λ_max = 8 / 2 = 4 and dt_max = 0.5
        let config = SimulationConfig::default();
        assert_relative_eq!(config.stability_limit(0.0), 0.5);
        // A deep potential well tightens the bound
        assert!(config.stability_limit(100.0) < 0.02);
    }

    #[test]
    fn test_spectral_radius_nine_point() {
        // Checkerboard: (-20/6 - 16/6 + 4/6) = -32/6
        assert_relative_eq!(
            StencilCoefficients::nine_point().spectral_radius(),
            32.0 / 6.0,
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_json_roundtrip_with_defaults() {
        let json = r#"{ "dt": 0.005, "boundary": "periodic" }"#;
        let config: SimulationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.dt, 0.005);
        assert_eq!(config.boundary, BoundaryPolicy::Periodic);
        assert_eq!(config.dx, 1.0);

        let text = serde_json::to_string(&config).unwrap();
        let back: SimulationConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
