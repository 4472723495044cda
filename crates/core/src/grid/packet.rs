//! Initial conditions: Gaussian wave packets and preset potentials

use super::Plane;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/// Gaussian wave packet `exp(-|r - r₀|² / 4σ²) · exp(i k·r)`
///
/// Positions and width are expressed in cells. Momentum is expressed in
/// cycles per domain length, so `momentum.0 = 5` puts five full phase
/// windings across the grid width; the physical wavenumber is
/// `k = 2π p / (N dx)`. This keeps any momentum below the grid's Nyquist
/// limit as long as `|p| < N / 2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WavePacket {
    /// Packet centre `(x, y)` in cells
    pub center: (f32, f32),
    /// Standard deviation of `|ψ|` in cells
    pub width: f32,
    /// Momentum `(px, py)` in cycles per domain length
    pub momentum: (f32, f32),
}

impl Default for WavePacket {
    fn default() -> Self {
        Self {
            center: (32.0, 32.0),
            width: 4.0,
            momentum: (5.0, 0.0),
        }
    }
}

impl WavePacket {
    /// Physical wavenumber `(kx, ky)` on a `width × height` grid with spacing `dx`
    #[must_use]
    pub fn wavenumber(&self, width: usize, height: usize, dx: f32) -> (f32, f32) {
        (
            TAU * self.momentum.0 / (width as f32 * dx),
            TAU * self.momentum.1 / (height as f32 * dx),
        )
    }

    /// Sample the un-normalized packet onto a pair of planes
    ///
    /// Phase is measured from the packet centre so the seed is symmetric about it.
    #[must_use]
    pub fn sample(&self, width: usize, height: usize, dx: f32) -> (Plane, Plane) {
        let (kx, ky) = self.wavenumber(width, height, dx);
        let inv_four_sigma_sq = 1.0 / (4.0 * self.width * self.width);
        let mut real = Plane::new(width, height);
        let mut imag = Plane::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let rx = x as f32 - self.center.0;
                let ry = y as f32 - self.center.1;
                let envelope = (-(rx * rx + ry * ry) * inv_four_sigma_sq).exp();
                let phase = (kx * rx + ky * ry) * dx;
                let idx = y * width + x;
                real.data[idx] = envelope * phase.cos();
                imag.data[idx] = envelope * phase.sin();
            }
        }
        (real, imag)
    }
}

/// Preset static potentials
///
/// The caller can always supply an arbitrary `Plane`; these cover the common
/// textbook setups.
pub struct PotentialField;

impl PotentialField {
    /// Free particle
    #[must_use]
    pub fn zero(width: usize, height: usize) -> Plane {
        Plane::new(width, height)
    }

    /// Isotropic harmonic trap `½ m ω² |r - c|²` centred on the grid
    ///
    /// `omega` is in inverse time units, distances in cells times `dx`.
    #[must_use]
    pub fn harmonic(width: usize, height: usize, dx: f32, mass: f32, omega: f32) -> Plane {
        let cx = (width as f32 - 1.0) * 0.5;
        let cy = (height as f32 - 1.0) * 0.5;
        Plane::from_fn(width, height, |x, y| {
            let rx = (x as f32 - cx) * dx;
            let ry = (y as f32 - cy) * dx;
            0.5 * mass * omega * omega * (rx * rx + ry * ry)
        })
    }

    /// Vertical barrier of height `strength` spanning columns `[x0, x0 + thickness)`
    #[must_use]
    pub fn barrier(width: usize, height: usize, x0: usize, thickness: usize, strength: f32) -> Plane {
        Plane::from_fn(width, height, |x, _| {
            if x >= x0 && x < x0 + thickness {
                strength
            } else {
                0.0
            }
        })
    }

    /// Vertical wall at column `x0` with two openings of `slit_width` cells
    /// separated by `separation` cells (centre to centre)
    #[must_use]
    pub fn double_slit(
        width: usize,
        height: usize,
        x0: usize,
        thickness: usize,
        slit_width: usize,
        separation: usize,
        strength: f32,
    ) -> Plane {
        let mid = height as f32 * 0.5;
        let half_gap = separation as f32 * 0.5;
        let half_slit = slit_width as f32 * 0.5;
        Plane::from_fn(width, height, |x, y| {
            if x < x0 || x >= x0 + thickness {
                return 0.0;
            }
            let yc = y as f32 + 0.5;
            let in_upper = (yc - (mid - half_gap)).abs() < half_slit;
            let in_lower = (yc - (mid + half_gap)).abs() < half_slit;
            if in_upper || in_lower {
                0.0
            } else {
                strength
            }
        })
    }

    /// Square well: `depth` (usually negative) inside a centred box of `size` cells
    #[must_use]
    pub fn box_well(width: usize, height: usize, size: usize, depth: f32) -> Plane {
        let x0 = width.saturating_sub(size) / 2;
        let y0 = height.saturating_sub(size) / 2;
        Plane::from_fn(width, height, |x, y| {
            if (x0..x0 + size).contains(&x) && (y0..y0 + size).contains(&y) {
                depth
            } else {
                0.0
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_packet_peak_at_center() {
        let packet = WavePacket {
            center: (8.0, 8.0),
            width: 2.0,
            momentum: (0.0, 0.0),
        };
        let (re, im) = packet.sample(16, 16, 1.0);
        assert_relative_eq!(re.get(8, 8), 1.0);
        assert_eq!(im.get(8, 8), 0.0);
        assert!(re.get(8, 8) > re.get(9, 8));
        assert_relative_eq!(re.get(7, 8), re.get(9, 8));
    }

    #[test]
    fn test_wavenumber_in_domain_cycles() {
        let packet = WavePacket::default();
        let (kx, ky) = packet.wavenumber(64, 64, 1.0);
        assert_relative_eq!(kx, TAU * 5.0 / 64.0);
        assert_eq!(ky, 0.0);
    }

    #[test]
    fn test_harmonic_minimum_at_center() {
        let v = PotentialField::harmonic(9, 9, 1.0, 1.0, 0.5);
        assert_eq!(v.get(4, 4), 0.0);
        assert_relative_eq!(v.get(5, 4), 0.125);
    }

    #[test]
    fn test_double_slit_has_two_openings() {
        let v = PotentialField::double_slit(32, 32, 16, 2, 2, 8, 50.0);
        let openings: Vec<usize> = (0..32).filter(|&y| v.get(16, y) == 0.0).collect();
        assert_eq!(openings, vec![11, 12, 19, 20]);
        assert_eq!(v.get(0, 0), 0.0);
        assert_eq!(v.get(17, 0), 50.0);
    }

    #[test]
    fn test_barrier_and_box() {
        let v = PotentialField::barrier(10, 4, 3, 2, 7.0);
        assert_eq!(v.get(3, 0), 7.0);
        assert_eq!(v.get(4, 3), 7.0);
        assert_eq!(v.get(5, 0), 0.0);

        let well = PotentialField::box_well(10, 10, 4, -3.0);
        assert_eq!(well.get(3, 3), -3.0);
        assert_eq!(well.get(6, 6), -3.0);
        assert_eq!(well.get(2, 3), 0.0);
    }
}
