pub mod fiber;
pub mod filter;
pub mod transform;

pub use fiber::{Fiber, FiberSet, ResampledFibers};
pub use transform::{FiberTransform, Transform, TransformKind};
