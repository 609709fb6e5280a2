//! Arc-length resampling of fibers.
//!
//! Reduces a polyline to a fixed number of points spaced uniformly along its
//! arc length, so that point `k` of two fibers can be compared directly.

use nalgebra::Point3;
use crate::fiber::Fiber;

/// Resample fiber filter.
///
/// Produces fibers with exactly `points_per_fiber` points by linear
/// interpolation at uniform arc-length positions. The first and last points
/// of the input are preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResampleFiberFilter {
    points_per_fiber: usize,
}

impl ResampleFiberFilter {
    /// Create a new resample filter.
    ///
    /// # Panics
    /// If `points_per_fiber` is zero.
    pub fn new(points_per_fiber: usize) -> Self {
        assert!(points_per_fiber > 0, "points_per_fiber must be positive");
        Self { points_per_fiber }
    }

    /// Resample one fiber.
    ///
    /// An empty fiber stays empty; a fiber without extent (one point, or all
    /// points coincident) repeats its first point.
    pub fn apply(&self, fiber: &Fiber) -> Fiber {
        let points = fiber.points();
        let n = self.points_per_fiber;
        let Some(&first) = points.first() else {
            return Fiber::new(Vec::new());
        };

        // Cumulative arc length at each input point
        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0f64;
        cumulative.push(0.0);
        for w in points.windows(2) {
            total += (w[1] - w[0]).norm() as f64;
            cumulative.push(total);
        }

        if total <= 0.0 || n == 1 {
            return Fiber::new(vec![first; n]);
        }

        let mut out = Vec::with_capacity(n);
        let mut segment = 0;
        for k in 0..n {
            let target = total * k as f64 / (n - 1) as f64;
            while segment + 2 < points.len() && cumulative[segment + 1] < target {
                segment += 1;
            }
            let start = cumulative[segment];
            let seg_len = cumulative[segment + 1] - start;
            let t = if seg_len > 0.0 {
                ((target - start) / seg_len).clamp(0.0, 1.0)
            } else {
                0.0
            };
            out.push(lerp(&points[segment], &points[segment + 1], t as f32));
        }
        Fiber::new(out)
    }
}

fn lerp(a: &Point3<f32>, b: &Point3<f32>, t: f32) -> Point3<f32> {
    a + (b - a) * t
}
