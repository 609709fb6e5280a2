//! Fiber set type holding the tractography of one brain.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use super::Fiber;
use crate::filter::LengthFilter;

/// Axis-aligned bounding box of a fiber set, in mm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Bounds {
    /// Extent along each axis.
    pub fn extent(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Grow the box by `margin` on every side.
    pub fn padded(&self, margin: f64) -> Self {
        let pad = Vector3::repeat(margin);
        Self {
            min: self.min - pad,
            max: self.max + pad,
        }
    }
}

/// The fibers belonging to one brain (subject or atlas).
///
/// A fiber set is created once at load time and never mutated; filtering,
/// downsampling and transforming all produce new sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FiberSet {
    fibers: Vec<Fiber>,
}

impl FiberSet {
    /// Create a fiber set.
    pub fn new(fibers: Vec<Fiber>) -> Self {
        Self { fibers }
    }

    /// Get the fibers.
    pub fn fibers(&self) -> &[Fiber] {
        &self.fibers
    }

    /// Iterate over the fibers.
    pub fn iter(&self) -> std::slice::Iter<'_, Fiber> {
        self.fibers.iter()
    }

    /// Get one fiber by index.
    pub fn get(&self, index: usize) -> Option<&Fiber> {
        self.fibers.get(index)
    }

    /// Number of fibers.
    pub fn len(&self) -> usize {
        self.fibers.len()
    }

    /// Whether the set contains no fibers.
    pub fn is_empty(&self) -> bool {
        self.fibers.is_empty()
    }

    /// Total number of points over all fibers.
    pub fn num_points(&self) -> usize {
        self.fibers.iter().map(Fiber::num_points).sum()
    }

    /// Consume the set and return its fibers.
    pub fn into_fibers(self) -> Vec<Fiber> {
        self.fibers
    }

    /// Keep only fibers with `min_length <= length <= max_length`.
    ///
    /// `min_length > max_length` yields an empty set.
    pub fn filter_by_length(&self, min_length: f64, max_length: f64) -> Self {
        LengthFilter::new(min_length, max_length).apply(self)
    }

    /// Mean of all points, or `None` for a set without points.
    pub fn centroid(&self) -> Option<Point3<f64>> {
        let count = self.num_points();
        if count == 0 {
            return None;
        }
        let sum = self
            .fibers
            .iter()
            .flat_map(|f| f.points().iter())
            .fold(Vector3::zeros(), |acc, p| acc + p.coords.cast::<f64>());
        Some(Point3::from(sum / count as f64))
    }

    /// Bounding box of all points, or `None` for a set without points.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut points = self.fibers.iter().flat_map(|f| f.points().iter());
        let first = points.next()?.cast::<f64>();
        let (min, max) = points.fold((first, first), |(lo, hi), p| {
            let p = p.cast::<f64>();
            (lo.inf(&p), hi.sup(&p))
        });
        Some(Bounds { min, max })
    }
}

impl FromIterator<Fiber> for FiberSet {
    fn from_iter<I: IntoIterator<Item = Fiber>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a FiberSet {
    type Item = &'a Fiber;
    type IntoIter = std::slice::Iter<'a, Fiber>;

    fn into_iter(self) -> Self::IntoIter {
        self.fibers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_fibers() -> FiberSet {
        FiberSet::new(vec![
            Fiber::from_coords(&[[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]]),
            Fiber::from_coords(&[[0.0, 4.0, -2.0], [2.0, 4.0, 6.0]]),
        ])
    }

    #[test]
    fn test_centroid() {
        let c = two_fibers().centroid().unwrap();
        assert!((c.x - 1.0).abs() < 1e-9);
        assert!((c.y - 2.0).abs() < 1e-9);
        assert!((c.z - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_bounds() {
        let b = two_fibers().bounds().unwrap();
        assert_eq!(b.min, Point3::new(0.0, 0.0, -2.0));
        assert_eq!(b.max, Point3::new(2.0, 4.0, 6.0));
        assert_eq!(b.padded(1.0).extent(), Vector3::new(4.0, 6.0, 10.0));
    }

    #[test]
    fn test_empty_set() {
        let set = FiberSet::default();
        assert!(set.is_empty());
        assert!(set.centroid().is_none());
        assert!(set.bounds().is_none());
    }
}
