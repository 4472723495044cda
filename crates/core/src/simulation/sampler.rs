//! Frame sampling
//!
//! Turns the synchronized grid into an owned, immutable [`Frame`]. Sampling is
//! read-only and O(W·H); the engine only calls it after the executor's
//! synchronize barrier, so it always sees a consistent time level.

use crate::grid::GridState;
use serde::{Deserialize, Serialize};

/// Which quantity a frame carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Observable {
    /// Probability density `re² + im²` only
    #[default]
    Density,
    /// Density plus a copy of the raw complex field
    Amplitude,
}

/// Snapshot of the field at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame number, strictly increasing within a run
    pub index: usize,
    /// Integrator steps since the start of the run
    pub step: usize,
    /// Simulated time (`step · dt`)
    pub time: f32,
    /// Width in cells
    pub width: usize,
    /// Height in cells
    pub height: usize,
    /// Quantity requested at sampling time
    pub observable: Observable,
    /// `re² + im²` per cell, row-major
    pub density: Vec<f32>,
    /// `[re, im]` per cell, row-major; present for `Observable::Amplitude`
    pub amplitude: Option<Vec<[f32; 2]>>,
}

impl Frame {
    /// Build a frame from raw amplitudes, deriving the density
    #[must_use]
    pub fn from_amplitude(
        index: usize,
        step: usize,
        time: f32,
        width: usize,
        height: usize,
        amplitude: Vec<[f32; 2]>,
    ) -> Self {
        let density = amplitude.iter().map(|[re, im]| re * re + im * im).collect();
        Self {
            index,
            step,
            time,
            width,
            height,
            observable: Observable::Amplitude,
            density,
            amplitude: Some(amplitude),
        }
    }

    /// Density at `(x, y)`
    #[must_use]
    pub fn density_at(&self, x: usize, y: usize) -> f32 {
        self.density[y * self.width + x]
    }

    /// `Σ density · dx²`
    #[must_use]
    pub fn total_probability(&self, dx: f32) -> f32 {
        let sum: f64 = self.density.iter().map(|&d| f64::from(d)).sum();
        (sum * f64::from(dx * dx)) as f32
    }

    /// Largest density value (NaN if any cell is NaN)
    #[must_use]
    pub fn peak_density(&self) -> f32 {
        self.density.iter().fold(0.0_f32, |acc, &d| {
            if d.is_nan() || acc.is_nan() {
                f32::NAN
            } else {
                acc.max(d)
            }
        })
    }

    /// Density-weighted mean position `(x, y)` in cells
    ///
    /// Returns the grid centre for an all-zero frame.
    #[must_use]
    pub fn centroid(&self) -> (f32, f32) {
        let mut total = 0.0_f64;
        let mut sx = 0.0_f64;
        let mut sy = 0.0_f64;
        for (y, row) in self.density.chunks(self.width).enumerate() {
            for (x, &d) in row.iter().enumerate() {
                let d = f64::from(d);
                total += d;
                sx += d * x as f64;
                sy += d * y as f64;
            }
        }
        if total > 0.0 {
            ((sx / total) as f32, (sy / total) as f32)
        } else {
            (
                (self.width as f32 - 1.0) * 0.5,
                (self.height as f32 - 1.0) * 0.5,
            )
        }
    }

    /// Density-weighted variance `⟨|r - centroid|²⟩` in cells²
    ///
    /// Grows monotonically while a free packet disperses. Zero for an all-zero frame.
    #[must_use]
    pub fn spread(&self) -> f32 {
        let (cx, cy) = self.centroid();
        let (cx, cy) = (f64::from(cx), f64::from(cy));
        let mut total = 0.0_f64;
        let mut moment = 0.0_f64;
        for (y, row) in self.density.chunks(self.width).enumerate() {
            let ry = y as f64 - cy;
            for (x, &d) in row.iter().enumerate() {
                let d = f64::from(d);
                let rx = x as f64 - cx;
                total += d;
                moment += d * (rx * rx + ry * ry);
            }
        }
        if total > 0.0 {
            (moment / total) as f32
        } else {
            0.0
        }
    }

    /// Whether every density value is finite
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.density.iter().all(|d| d.is_finite())
    }
}

/// Extracts frames from a synchronized grid
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameSampler {
    observable: Observable,
}

impl FrameSampler {
    /// Create a sampler for the given observable
    #[must_use]
    pub fn new(observable: Observable) -> Self {
        Self { observable }
    }

    /// Observable this sampler produces
    #[must_use]
    pub fn observable(&self) -> Observable {
        self.observable
    }

    /// Snapshot `grid`
    #[must_use]
    pub fn sample(&self, grid: &GridState, index: usize, step: usize, time: f32) -> Frame {
        let re = grid.real().as_slice();
        let im = grid.imag().as_slice();
        let density = re.iter().zip(im).map(|(&r, &i)| r * r + i * i).collect();
        let amplitude = match self.observable {
            Observable::Density => None,
            Observable::Amplitude => Some(re.iter().zip(im).map(|(&r, &i)| [r, i]).collect()),
        };
        Frame {
            index,
            step,
            time,
            width: grid.width(),
            height: grid.height(),
            observable: self.observable,
            density,
            amplitude,
        }
    }
}
