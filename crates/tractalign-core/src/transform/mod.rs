//! Transform types and operations.
//!
//! Tensor transforms (`AffineTransform`, `BSplineTransform`) do the point
//! arithmetic; `FiberTransform` is the parameter-vector form that the
//! registration searches over and commits.

pub mod trait_;
pub mod affine;
pub mod bspline;
pub mod parameters;

pub use trait_::Transform;
pub use affine::AffineTransform;
pub use bspline::BSplineTransform;
pub use parameters::{AffineDof, AffineParameters, BSplineParameters, FiberTransform, TransformKind};
