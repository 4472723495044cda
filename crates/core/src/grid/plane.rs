//! Flat real-valued lattice planes
//!
//! Every scalar field in the solver (real part, imaginary part, potential,
//! scratch) is a `Plane`: a `Vec<f32>` in row-major order plus its dimensions.

/// Real-valued 2D plane stored row-major (`y * width + x`)
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    /// Cell values in row-major order
    pub data: Vec<f32>,
    /// Width in cells
    pub width: usize,
    /// Height in cells
    pub height: usize,
}

impl Plane {
    /// Create a plane filled with zeros
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self::with_value(width, height, 0.0)
    }

    /// Create a plane filled with `value`
    #[must_use]
    pub fn with_value(width: usize, height: usize, value: f32) -> Self {
        Self {
            data: vec![value; width * height],
            width,
            height,
        }
    }

    /// Build a plane by evaluating `f(x, y)` at every cell
    #[must_use]
    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> f32,
    {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            data,
            width,
            height,
        }
    }

    /// Wrap an existing buffer
    ///
    /// Returns `None` when `data.len() != width * height`.
    #[must_use]
    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Option<Self> {
        (data.len() == width * height).then_some(Self {
            data,
            width,
            height,
        })
    }

    /// `(width, height)` pair
    #[must_use]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Get reference to plane data
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Get mutable reference to plane data
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Value at `(x, y)`
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        assert!(
            x < self.width && y < self.height,
            "Coordinates out of bounds"
        );
        self.data[y * self.width + x]
    }

    /// Set value at `(x, y)`
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        assert!(
            x < self.width && y < self.height,
            "Coordinates out of bounds"
        );
        self.data[y * self.width + x] = value;
    }

    /// Fill entire plane with a value
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Largest absolute value in the plane (0 for an empty plane)
    #[must_use]
    pub fn max_abs(&self) -> f32 {
        self.data.iter().fold(0.0_f32, |acc, v| acc.max(v.abs()))
    }

    /// Zero the outermost ring of cells
    pub fn zero_ring(&mut self) {
        let (w, h) = (self.width, self.height);
        self.data[..w].fill(0.0);
        self.data[(h - 1) * w..].fill(0.0);
        for y in 1..h.saturating_sub(1) {
            self.data[y * w] = 0.0;
            self.data[y * w + w - 1] = 0.0;
        }
    }
}
