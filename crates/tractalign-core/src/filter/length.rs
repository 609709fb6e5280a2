use crate::fiber::FiberSet;

/// Length filter.
///
/// Removes fibers whose length lies outside `[min_length, max_length]` (mm).
/// Short fibers are mostly tracking noise; very long ones tend to traverse
/// several structures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LengthFilter {
    min_length: f64,
    max_length: f64,
}

impl LengthFilter {
    /// Create a new length filter.
    pub fn new(min_length: f64, max_length: f64) -> Self {
        Self { min_length, max_length }
    }

    /// Whether a fiber of `length` passes the filter.
    pub fn accepts(&self, length: f64) -> bool {
        self.min_length <= length && length <= self.max_length
    }

    /// Apply the filter to a fiber set.
    pub fn apply(&self, set: &FiberSet) -> FiberSet {
        set.iter()
            .filter(|fiber| self.accepts(fiber.length()))
            .cloned()
            .collect()
    }
}
