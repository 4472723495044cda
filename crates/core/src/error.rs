//! Error types for grid construction, executor selection and trajectory I/O
//!
//! All errors derive [`thiserror::Error`], so binaries can bubble them up
//! through `anyhow` without extra glue.

use thiserror::Error;

/// Convenience alias used throughout the crate
pub type SolverResult<T> = Result<T, SolverError>;

/// Everything that can go wrong in the solver core
#[derive(Debug, Error)]
pub enum SolverError {
    /// Lattice width or height was zero (or the cell count overflowed)
    #[error("grid dimensions must be positive; got {width}x{height}")]
    InvalidDimension {
        /// Requested width in cells
        width: usize,
        /// Requested height in cells
        height: usize,
    },

    /// A supplied plane does not match the lattice it is attached to
    #[error("shape mismatch: expected {}x{}, got {}x{}", expected.0, expected.1, actual.0, actual.1)]
    ShapeMismatch {
        /// `(width, height)` of the lattice
        expected: (usize, usize),
        /// `(width, height)` that was supplied
        actual: (usize, usize),
    },

    /// A scalar configuration value is out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Laplacian coefficients do not annihilate a constant field
    #[error("stencil coefficients must sum to zero; got {sum}")]
    InvalidStencil {
        /// `center + 4 * orthogonal + 4 * diagonal`
        sum: f32,
    },

    /// The requested parallel device could not be acquired or a kernel failed
    #[error("execution device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Amplitude blew past the configured sanity bound
    #[error("numeric divergence at frame {frame}: peak density {peak}")]
    NumericDivergence {
        /// Index of the offending frame
        frame: usize,
        /// Peak density observed (may be NaN or infinite)
        peak: f32,
    },

    /// Trajectory output needs the raw field but the frame only carries density
    #[error("frame carries no amplitude data; sample with Observable::Amplitude")]
    MissingAmplitude,

    /// Trajectory input is malformed
    #[error("invalid trajectory file: {0}")]
    InvalidTrajectory(String),

    /// Underlying I/O failure
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration (de)serialization failure
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl SolverError {
    pub(crate) fn check_dimensions(width: usize, height: usize) -> SolverResult<usize> {
        if width == 0 || height == 0 {
            return Err(Self::InvalidDimension { width, height });
        }
        width
            .checked_mul(height)
            .ok_or(Self::InvalidDimension { width, height })
    }

    pub(crate) fn check_shape(
        expected: (usize, usize),
        actual: (usize, usize),
    ) -> SolverResult<()> {
        (expected == actual)
            .then_some(())
            .ok_or(Self::ShapeMismatch { expected, actual })
    }

    pub(crate) fn check_positive(name: &str, value: f32) -> SolverResult<()> {
        (value.is_finite() && value > 0.0)
            .then_some(())
            .ok_or_else(|| Self::InvalidConfig(format!("{name} must be finite and > 0; got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_dimensions() {
        assert_eq!(SolverError::check_dimensions(4, 8).unwrap(), 32);
        assert!(matches!(
            SolverError::check_dimensions(0, 8),
            Err(SolverError::InvalidDimension { width: 0, height: 8 })
        ));
        assert!(matches!(
            SolverError::check_dimensions(usize::MAX, 2),
            Err(SolverError::InvalidDimension { .. })
        ));
    }

    #[test]
    fn test_check_shape_message() {
        let err = SolverError::check_shape((4, 4), (4, 5)).unwrap_err();
        assert_eq!(err.to_string(), "shape mismatch: expected 4x4, got 4x5");
    }

    #[test]
    fn test_check_positive() {
        assert!(SolverError::check_positive("dt", 0.01).is_ok());
        assert!(SolverError::check_positive("dt", 0.0).is_err());
        assert!(SolverError::check_positive("dt", f32::NAN).is_err());
        assert!(SolverError::check_positive("dt", f32::INFINITY).is_err());
    }
}
