//! Fiber type representing a single reconstructed tract.
//!
//! A fiber is an ordered polyline in physical (mm) space.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// A single fiber: an ordered sequence of 3-D points along a tract.
///
/// Fibers are immutable once constructed. Operations that change geometry
/// (resampling, transforming) return new fibers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fiber {
    points: Vec<Point3<f32>>,
}

impl Fiber {
    /// Create a fiber from its ordered points.
    pub fn new(points: Vec<Point3<f32>>) -> Self {
        Self { points }
    }

    /// Create a fiber from raw `[x, y, z]` coordinates.
    pub fn from_coords(coords: &[[f32; 3]]) -> Self {
        Self::new(coords.iter().map(|c| Point3::new(c[0], c[1], c[2])).collect())
    }

    /// Get the points of the fiber.
    pub fn points(&self) -> &[Point3<f32>] {
        &self.points
    }

    /// Number of points along the fiber.
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Whether the fiber has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Length of the fiber (sum of segment lengths).
    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| (w[1] - w[0]).norm() as f64)
            .sum()
    }

    /// The same tract traversed in the opposite direction.
    pub fn reversed(&self) -> Self {
        let mut points = self.points.clone();
        points.reverse();
        Self { points }
    }

    /// Whether every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.points.iter().all(|p| p.coords.iter().all(|c| c.is_finite()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fiber_length() {
        let fiber = Fiber::from_coords(&[[0.0, 0.0, 0.0], [3.0, 4.0, 0.0], [3.0, 4.0, 10.0]]);
        assert!((fiber.length() - 15.0).abs() < 1e-9);
        assert_eq!(fiber.num_points(), 3);
    }

    #[test]
    fn test_degenerate_fiber_length() {
        assert_eq!(Fiber::new(Vec::new()).length(), 0.0);
        assert_eq!(Fiber::from_coords(&[[1.0, 2.0, 3.0]]).length(), 0.0);
    }

    #[test]
    fn test_fiber_reversed() {
        let fiber = Fiber::from_coords(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 1.0, 0.0]]);
        let reversed = fiber.reversed();
        assert_eq!(reversed.points()[0], Point3::new(2.0, 1.0, 0.0));
        assert_eq!(reversed.points()[2], Point3::new(0.0, 0.0, 0.0));
        assert!((fiber.length() - reversed.length()).abs() < 1e-9);
    }

    #[test]
    fn test_fiber_finite() {
        assert!(Fiber::from_coords(&[[0.0, 1.0, 2.0]]).is_finite());
        assert!(!Fiber::from_coords(&[[0.0, f32::NAN, 2.0]]).is_finite());
    }
}
