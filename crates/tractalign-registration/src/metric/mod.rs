//! Fiber-bundle dissimilarity measures.

pub mod trait_;
pub mod congealing;

pub use trait_::Metric;
pub use congealing::CongealingObjective;
