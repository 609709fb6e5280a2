//! B-Spline transform implementation.
//!
//! This module provides a cubic B-Spline free-form deformation over a
//! regular `g × g × g` control grid.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use super::trait_::Transform;

/// B-Spline Transform (Free-form deformation).
///
/// Uses a grid of control points to define a smooth deformation field.
/// The displacement at `x` is `Σ_ijk β(u_i) β(v_j) β(w_k) c_ijk`, where `β` is
/// the cubic B-spline kernel and `u, v, w` are the offsets from control node
/// `ijk` measured in grid spacings. Control nodes cover the domain
/// `[origin, origin + (g - 1) * spacing]`; the deformation fades out within
/// two grid spacings outside it.
#[derive(Debug, Clone)]
pub struct BSplineTransform<B: Backend> {
    /// Control points per axis
    grid_size: usize,
    /// Physical position of control node (0, 0, 0)
    origin: [f64; 3],
    /// Spacing between control nodes
    spacing: [f64; 3],
    /// Control point displacements [g³, 3], node (i, j, k) at row (i * g + j) * g + k
    coefficients: Tensor<B, 2>,
}

impl<B: Backend> BSplineTransform<B> {
    /// Create a new B-Spline transform.
    ///
    /// # Arguments
    /// * `grid_size` - Number of control points along each axis
    /// * `origin` - Physical position of the first control node
    /// * `spacing` - Distance between control nodes along each axis
    /// * `coefficients` - Control point displacements `[grid_size³, 3]`
    pub fn new(grid_size: usize, origin: [f64; 3], spacing: [f64; 3], coefficients: Tensor<B, 2>) -> Self {
        Self {
            grid_size,
            origin,
            spacing,
            coefficients,
        }
    }

    /// Cubic B-spline kernel evaluated elementwise.
    ///
    /// β(t) = ((2 - |t|)₊³ - 4 (1 - |t|)₊³) / 6
    fn cubic_bspline(t: Tensor<B, 2>) -> Tensor<B, 2> {
        let a = t.abs();
        let outer = a.clone().neg().add_scalar(2.0).clamp_min(0.0);
        let inner = a.neg().add_scalar(1.0).clamp_min(0.0);
        let outer3 = outer.clone() * outer.clone() * outer;
        let inner3 = inner.clone() * inner.clone() * inner;
        (outer3 - inner3.mul_scalar(4.0)).div_scalar(6.0)
    }

    /// Kernel weights of every control node along one axis: [Batch, g].
    fn axis_weights(&self, points: &Tensor<B, 2>, axis: usize) -> Tensor<B, 2> {
        let device = points.device();
        let [batch, _] = points.dims();
        let g = self.grid_size;

        let nodes: Vec<f32> = (0..g)
            .map(|i| (self.origin[axis] + i as f64 * self.spacing[axis]) as f32)
            .collect();
        let nodes = Tensor::<B, 2>::from_data(TensorData::new(nodes, [1, g]), &device);

        let coord = points.clone().slice([0..batch, axis..axis + 1]); // [Batch, 1]
        let offsets = (coord - nodes).div_scalar(self.spacing[axis] as f32); // [Batch, g]
        Self::cubic_bspline(offsets)
    }
}

impl<B: Backend> Transform<B> for BSplineTransform<B> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch, _] = points.dims();
        let g = self.grid_size;

        let wx = self.axis_weights(&points, 0).reshape([batch, g, 1, 1]);
        let wy = self.axis_weights(&points, 1).reshape([batch, 1, g, 1]);
        let wz = self.axis_weights(&points, 2).reshape([batch, 1, 1, g]);

        // Tensor-product weights [Batch, g, g, g] flattened in (i, j, k) order
        let weights = (wx * wy * wz).reshape([batch, g * g * g]);
        let displacement = weights.matmul(self.coefficients.clone()); // [Batch, 3]

        points + displacement
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn values(tensor: Tensor<TestBackend, 2>) -> Vec<f32> {
        tensor.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_zero_displacement_is_identity() {
        let device = Default::default();
        let coefficients = Tensor::<TestBackend, 2>::zeros([64, 3], &device);
        let transform = BSplineTransform::new(4, [0.0; 3], [10.0; 3], coefficients);
        let points = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0, 3.0], [25.0, -4.0, 40.0]], &device);
        assert_eq!(values(transform.transform_points(points)), vec![1.0, 2.0, 3.0, 25.0, -4.0, 40.0]);
    }

    #[test]
    fn test_uniform_displacement_translates_interior() {
        let device = Default::default();
        let g = 5;
        let n = g * g * g;
        let coeffs: Vec<f32> = (0..n).flat_map(|_| [1.0f32, -2.0, 0.5]).collect();
        let coefficients = Tensor::<TestBackend, 2>::from_data(TensorData::new(coeffs, [n, 3]), &device);
        let transform = BSplineTransform::new(g, [0.0; 3], [10.0; 3], coefficients);

        // Domain center: every kernel tap of the B-spline falls on a node, weights sum to one
        let points = Tensor::<TestBackend, 2>::from_floats([[20.0, 20.0, 20.0]], &device);
        let out = values(transform.transform_points(points));
        assert!((out[0] - 21.0).abs() < 1e-4);
        assert!((out[1] - 18.0).abs() < 1e-4);
        assert!((out[2] - 20.5).abs() < 1e-4);
    }

    #[test]
    fn test_single_node_weight() {
        let device = Default::default();
        let g = 3;
        let n = g * g * g;
        let mut coeffs = vec![0.0f32; n * 3];
        // Node (1, 1, 1) moves along x
        let center = (1 * g + 1) * g + 1;
        coeffs[center * 3] = 27.0;
        let coefficients = Tensor::<TestBackend, 2>::from_data(TensorData::new(coeffs, [n, 3]), &device);
        let transform = BSplineTransform::new(g, [0.0; 3], [1.0; 3], coefficients);

        // At the node itself the weight is β(0)³ = (2/3)³
        let points = Tensor::<TestBackend, 2>::from_floats([[1.0, 1.0, 1.0]], &device);
        let out = values(transform.transform_points(points));
        assert!((out[0] - (1.0 + 8.0)).abs() < 1e-4, "got {}", out[0]);
        assert!((out[1] - 1.0).abs() < 1e-6);
    }
}
