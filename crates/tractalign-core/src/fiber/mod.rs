//! Fiber geometry types.
//!
//! This module provides the polyline representation of reconstructed
//! white-matter tracts and the fixed-size resampled form used during
//! objective evaluation.

pub mod fiber;
pub mod fiber_set;
pub mod resampled;

pub use fiber::Fiber;
pub use fiber_set::{Bounds, FiberSet};
pub use resampled::ResampledFibers;
