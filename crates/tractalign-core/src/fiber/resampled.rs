//! Fixed point-count fiber representation used during objective evaluation.

use super::{Fiber, FiberSet};
use crate::filter::ResampleFiberFilter;

/// A block of fibers that all have exactly `points_per_fiber` points.
///
/// Coordinates are stored contiguously with shape
/// `[num_fibers, points_per_fiber, 3]`, which maps directly onto a
/// `[num_fibers * points_per_fiber, 3]` point tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct ResampledFibers {
    points_per_fiber: usize,
    coords: Vec<f32>,
}

impl ResampledFibers {
    /// Wrap a contiguous coordinate block.
    ///
    /// # Panics
    /// If `coords.len()` is not a multiple of `3 * points_per_fiber`.
    pub fn from_coords(points_per_fiber: usize, coords: Vec<f32>) -> Self {
        assert!(points_per_fiber > 0, "points_per_fiber must be positive");
        assert_eq!(
            coords.len() % (3 * points_per_fiber),
            0,
            "coordinate block does not hold whole fibers"
        );
        Self { points_per_fiber, coords }
    }

    /// Resample every fiber of a set to `points_per_fiber` points.
    pub fn from_fiber_set(set: &FiberSet, points_per_fiber: usize) -> Self {
        let filter = ResampleFiberFilter::new(points_per_fiber);
        let mut coords = Vec::with_capacity(set.len() * points_per_fiber * 3);
        for fiber in set {
            for p in filter.apply(fiber).points() {
                coords.extend_from_slice(&[p.x, p.y, p.z]);
            }
        }
        Self::from_coords(points_per_fiber, coords)
    }

    /// Points per fiber.
    pub fn points_per_fiber(&self) -> usize {
        self.points_per_fiber
    }

    /// Number of fibers.
    pub fn len(&self) -> usize {
        self.coords.len() / (3 * self.points_per_fiber)
    }

    /// Whether the block holds no fibers.
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Total number of points.
    pub fn num_points(&self) -> usize {
        self.coords.len() / 3
    }

    /// The flat coordinate block.
    pub fn coords(&self) -> &[f32] {
        &self.coords
    }

    /// Coordinates of one fiber (`3 * points_per_fiber` values).
    pub fn fiber(&self, index: usize) -> &[f32] {
        let stride = 3 * self.points_per_fiber;
        &self.coords[index * stride..(index + 1) * stride]
    }

    /// Copy the listed fibers into a new block.
    pub fn select(&self, indices: impl IntoIterator<Item = usize>) -> Self {
        let mut coords = Vec::new();
        for index in indices {
            coords.extend_from_slice(self.fiber(index));
        }
        Self::from_coords(self.points_per_fiber, coords)
    }

    /// Same fibers with replaced coordinates (e.g. after a transform).
    pub fn with_coords(&self, coords: Vec<f32>) -> Self {
        assert_eq!(coords.len(), self.coords.len(), "coordinate count changed");
        Self::from_coords(self.points_per_fiber, coords)
    }

    /// Convert one fiber back into a polyline.
    pub fn to_fiber(&self, index: usize) -> Fiber {
        let coords: Vec<[f32; 3]> = self
            .fiber(index)
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        Fiber::from_coords(&coords)
    }
}
