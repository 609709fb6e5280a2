//! Affine transform implementation.
//!
//! This module provides an affine transform (linear transformation + translation).

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use nalgebra::{Matrix3, Point3, Vector3};
use super::trait_::Transform;

/// Affine Transform (Linear transformation + Translation).
///
/// Represents a general affine transformation with a fixed center:
/// T(x) = A(x - c) + c + t
///
/// where:
/// * A is a 3×3 matrix (linear transformation: rotation, scale, shear)
/// * t is a 3-dimensional translation vector
/// * c is a 3-dimensional fixed center of rotation/scaling
#[derive(Debug, Clone)]
pub struct AffineTransform<B: Backend> {
    matrix: Tensor<B, 2>,      // [3, 3] linear transformation matrix
    translation: Tensor<B, 1>, // [3] translation vector
    center: Tensor<B, 1>,      // [3] fixed center
}

impl<B: Backend> AffineTransform<B> {
    /// Create a new affine transform.
    ///
    /// # Arguments
    /// * `matrix` - Tensor of shape `[3, 3]` containing the linear transformation matrix
    /// * `translation` - Tensor of shape `[3]` containing the translation vector
    /// * `center` - Tensor of shape `[3]` containing the fixed center
    pub fn new(matrix: Tensor<B, 2>, translation: Tensor<B, 1>, center: Tensor<B, 1>) -> Self {
        Self {
            matrix,
            translation,
            center,
        }
    }

    /// Build the tensor form from nalgebra values.
    pub fn from_parts(
        matrix: &Matrix3<f64>,
        translation: &Vector3<f64>,
        center: &Point3<f64>,
        device: &B::Device,
    ) -> Self {
        let rows: Vec<f32> = (0..3)
            .flat_map(|r| (0..3).map(move |c| matrix[(r, c)] as f32))
            .collect();
        let matrix = Tensor::<B, 2>::from_data(TensorData::new(rows, [3, 3]), device);
        Self::new(matrix, vector_tensor(translation, device), vector_tensor(&center.coords, device))
    }
}

fn vector_tensor<B: Backend>(v: &Vector3<f64>, device: &B::Device) -> Tensor<B, 1> {
    let values = vec![v.x as f32, v.y as f32, v.z as f32];
    Tensor::<B, 1>::from_data(TensorData::new(values, [3]), device)
}

impl<B: Backend> Transform<B> for AffineTransform<B> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        // T(x) = A(x - c) + c + t
        //
        // In row vector notation for [N, 3] inputs:
        // y = (x - c) @ A^T + c + t
        let c = self.center.clone().reshape([1, 3]);
        let t = self.translation.clone().reshape([1, 3]);
        let a = self.matrix.clone();

        let centered = points - c.clone();
        let rotated = centered.matmul(a.transpose());

        rotated + c + t
    }
}
