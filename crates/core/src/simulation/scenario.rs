//! Scenario files: everything a driver needs to build and run a simulation
//!
//! ```json
//! {
//!   "width": 64,
//!   "height": 64,
//!   "frames": 50,
//!   "packet": { "center": [32.0, 32.0], "width": 4.0, "momentum": [5.0, 0.0] },
//!   "potential": { "kind": "double_slit", "x0": 40, "thickness": 2, "slit_width": 3, "separation": 10, "strength": 50.0 },
//!   "simulation": { "dt": 0.01, "boundary": "reflective" },
//!   "execution": { "kind": "thread_pool", "threads": null }
//! }
//! ```

use crate::config::SimulationConfig;
use crate::error::SolverResult;
use crate::grid::{GridState, Plane, PotentialField, WavePacket};
use crate::solver::ExecutionContext;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Named potential built by [`PotentialField`]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PotentialPreset {
    /// Free particle
    #[default]
    Zero,
    /// Harmonic trap centred on the grid
    Harmonic {
        /// Trap frequency
        omega: f32,
    },
    /// Vertical barrier
    Barrier {
        /// First column of the barrier
        x0: usize,
        /// Columns covered
        thickness: usize,
        /// Barrier height
        strength: f32,
    },
    /// Wall with two openings
    DoubleSlit {
        /// First column of the wall
        x0: usize,
        /// Columns covered
        thickness: usize,
        /// Opening size in cells
        slit_width: usize,
        /// Centre-to-centre distance of the openings
        separation: usize,
        /// Wall height
        strength: f32,
    },
    /// Centred square well
    BoxWell {
        /// Edge length in cells
        size: usize,
        /// Potential inside the well
        depth: f32,
    },
}

impl PotentialPreset {
    /// Build the potential plane
    #[must_use]
    pub fn build(&self, width: usize, height: usize, dx: f32, mass: f32) -> Plane {
        match *self {
            Self::Zero => PotentialField::zero(width, height),
            Self::Harmonic { omega } => PotentialField::harmonic(width, height, dx, mass, omega),
            Self::Barrier {
                x0,
                thickness,
                strength,
            } => PotentialField::barrier(width, height, x0, thickness, strength),
            Self::DoubleSlit {
                x0,
                thickness,
                slit_width,
                separation,
                strength,
            } => PotentialField::double_slit(
                width, height, x0, thickness, slit_width, separation, strength,
            ),
            Self::BoxWell { size, depth } => PotentialField::box_well(width, height, size, depth),
        }
    }
}

/// Complete description of one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Lattice width in cells
    pub width: usize,
    /// Lattice height in cells
    pub height: usize,
    /// Frames to emit
    pub frames: usize,
    /// Initial wave packet
    pub packet: WavePacket,
    /// Static potential
    pub potential: PotentialPreset,
    /// Integrator settings
    pub simulation: SimulationConfig,
    /// Executor selection
    pub execution: ExecutionContext,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            frames: 50,
            packet: WavePacket::default(),
            potential: PotentialPreset::Zero,
            simulation: SimulationConfig::default(),
            execution: ExecutionContext::Sequential,
        }
    }
}

impl ScenarioConfig {
    /// Build the seeded grid described by this scenario
    ///
    /// # Errors
    ///
    /// `InvalidDimension` for a zero-sized lattice, `InvalidConfig` for a bad `dx`.
    pub fn build_grid(&self) -> SolverResult<GridState> {
        let sim = &self.simulation;
        let potential = self.potential.build(self.width, self.height, sim.dx, sim.mass);
        let mut grid = GridState::new(self.width, self.height, sim.dx, potential)?;
        grid.seed_wave_packet(&self.packet);
        Ok(grid)
    }

    /// Load a scenario from a JSON file and validate its simulation settings
    ///
    /// # Errors
    ///
    /// `Io`, `Config` or any validation error.
    pub fn load<P: AsRef<Path>>(path: P) -> SolverResult<Self> {
        let contents = fs::read_to_string(path)?;
        let scenario: Self = serde_json::from_str(&contents)?;
        scenario.simulation.validate()?;
        Ok(scenario)
    }

    /// Save as pretty JSON
    ///
    /// # Errors
    ///
    /// `Config` on serialization failure, `Io` on write failure.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> SolverResult<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoundaryPolicy;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_partial_scenario() {
        let json = r#"{
            "width": 32,
            "potential": { "kind": "barrier", "x0": 20, "thickness": 2, "strength": 5.0 },
            "simulation": { "boundary": "periodic" },
            "execution": { "kind": "thread_pool", "threads": 2 }
        }"#;
        let scenario: ScenarioConfig = serde_json::from_str(json).unwrap();
        assert_eq!(scenario.width, 32);
        assert_eq!(scenario.height, 64);
        assert_eq!(scenario.simulation.boundary, BoundaryPolicy::Periodic);
        assert_eq!(scenario.simulation.dt, 0.01);
        assert_eq!(
            scenario.execution,
            ExecutionContext::ThreadPool { threads: Some(2) }
        );

        let grid = scenario.build_grid().unwrap();
        assert_eq!(grid.potential().get(20, 0), 5.0);
        assert_relative_eq!(grid.total_probability(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_default_round_trips_through_json() {
        let scenario = ScenarioConfig::default();
        let text = serde_json::to_string(&scenario).unwrap();
        let back: ScenarioConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, scenario);
    }

    #[test]
    fn test_zero_width_rejected() {
        let scenario = ScenarioConfig {
            width: 0,
            ..ScenarioConfig::default()
        };
        assert!(scenario.build_grid().is_err());
    }
}
