//! Transform trait for spatial coordinate transformations.
//!
//! This module defines the core Transform trait that all fiber transforms
//! implement.

use burn::tensor::Tensor;
use burn::tensor::backend::Backend;

/// Transform trait for 3-D coordinate transformations.
///
/// Maps fiber points from subject space into atlas space. Implementations
/// are pure: applying a transform never changes it.
///
/// # Type Parameters
/// * `B` - The Burn backend
pub trait Transform<B: Backend> {
    /// Apply transform to a batch of points.
    ///
    /// # Arguments
    /// * `points` - Tensor of shape `[Batch, 3]` containing the input points
    ///
    /// # Returns
    /// Tensor of shape `[Batch, 3]` containing the transformed points
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2>;
}
