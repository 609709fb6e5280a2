//! Parameter-vector form of fiber transforms.
//!
//! The registration searches over flat parameter vectors. This module maps
//! those vectors onto concrete affine matrices and B-spline control grids,
//! and applies them to fiber geometry through the tensor transforms.

use burn::tensor::backend::Backend;
use burn::tensor::{DataError, Tensor, TensorData};
use nalgebra::{Matrix3, Matrix4, Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use super::{AffineTransform, BSplineTransform, Transform};
use crate::fiber::{Bounds, Fiber, FiberSet, ResampledFibers};

/// Points pushed through a tensor transform per batch.
const CHUNK_POINTS: usize = 1 << 14;

/// Number of values in a full affine parameter vector.
pub const AFFINE_PARAMETERS: usize = 12;

/// Family of a transform, fixed for a registration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformKind {
    Affine,
    Nonlinear,
}

/// Degrees of freedom searched by an affine registration.
///
/// Parameters are ordered translation, rotation, scale, shear, so each level
/// searches a prefix of the full vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AffineDof {
    /// Translation only (3).
    Translation,
    /// Translation and rotation (6).
    Rigid,
    /// Rigid plus per-axis scaling (9).
    Scaled,
    /// Full affine including shear (12).
    #[default]
    Full,
}

impl AffineDof {
    /// Number of searched parameters.
    pub fn num_parameters(self) -> usize {
        match self {
            Self::Translation => 3,
            Self::Rigid => 6,
            Self::Scaled => 9,
            Self::Full => AFFINE_PARAMETERS,
        }
    }
}

/// Affine transform parameters.
///
/// Values, in search units chosen so that a step of a few units is a
/// comparable perturbation for every parameter:
/// * `[0..3]` translation in mm
/// * `[3..6]` rotation about x, y, z in degrees
/// * `[6..9]` scale change per axis in percent (`s = 1 + v / 100`)
/// * `[9..12]` shear xy, xz, yz in percent
///
/// The linear part acts about a fixed center:
/// `x' = R·Sh·S·(x − c) + c + t` with `R = Rz·Ry·Rx`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffineParameters {
    values: [f64; AFFINE_PARAMETERS],
    center: [f64; 3],
    dof: AffineDof,
}

impl AffineParameters {
    /// Identity transform about `center`.
    pub fn identity(center: Point3<f64>, dof: AffineDof) -> Self {
        Self {
            values: [0.0; AFFINE_PARAMETERS],
            center: [center.x, center.y, center.z],
            dof,
        }
    }

    /// Replace all twelve values.
    pub fn with_values(mut self, values: [f64; AFFINE_PARAMETERS]) -> Self {
        self.values = values;
        self
    }

    /// All twelve values.
    pub fn values(&self) -> &[f64; AFFINE_PARAMETERS] {
        &self.values
    }

    /// Center of rotation and scaling.
    pub fn center(&self) -> Point3<f64> {
        Point3::from(self.center)
    }

    /// Searched degrees of freedom.
    pub fn dof(&self) -> AffineDof {
        self.dof
    }

    /// Translation vector in mm.
    pub fn translation(&self) -> Vector3<f64> {
        Vector3::new(self.values[0], self.values[1], self.values[2])
    }

    /// Linear part `R·Sh·S`.
    pub fn linear_matrix(&self) -> Matrix3<f64> {
        let v = &self.values;
        let rotation = Rotation3::from_euler_angles(
            v[3].to_radians(),
            v[4].to_radians(),
            v[5].to_radians(),
        )
        .into_inner();
        let scale = Matrix3::from_diagonal(&Vector3::new(
            1.0 + v[6] / 100.0,
            1.0 + v[7] / 100.0,
            1.0 + v[8] / 100.0,
        ));
        let shear = Matrix3::new(
            1.0, v[9] / 100.0, v[10] / 100.0,
            0.0, 1.0, v[11] / 100.0,
            0.0, 0.0, 1.0,
        );
        rotation * shear * scale
    }

    /// Homogeneous 4×4 matrix acting on world coordinates.
    pub fn homogeneous(&self) -> Matrix4<f64> {
        let a = self.linear_matrix();
        let c = self.center().coords;
        let offset = c + self.translation() - a * c;
        let mut m = a.to_homogeneous();
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&offset);
        m
    }

    /// Map one point (reference path without tensors).
    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        let c = self.center();
        c + self.linear_matrix() * (point - c) + self.translation()
    }

    /// Tensor form on `device`.
    pub fn to_transform<B: Backend>(&self, device: &B::Device) -> AffineTransform<B> {
        AffineTransform::from_parts(&self.linear_matrix(), &self.translation(), &self.center(), device)
    }
}

/// Cubic B-spline deformation parameters over a `g × g × g` control grid.
///
/// Displacements are stored node-major, `[node][x, y, z]`, in mm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BSplineParameters {
    grid_size: usize,
    origin: [f64; 3],
    spacing: [f64; 3],
    displacements: Vec<f64>,
}

impl BSplineParameters {
    /// Zero deformation with control nodes spanning `bounds`.
    ///
    /// # Panics
    /// If `grid_size < 2`.
    pub fn covering(grid_size: usize, bounds: &Bounds) -> Self {
        assert!(grid_size >= 2, "B-spline grid needs at least two nodes per axis");
        let extent = bounds.extent();
        let spacing = std::array::from_fn(|i| (extent[i] / (grid_size - 1) as f64).max(1.0));
        Self {
            grid_size,
            origin: [bounds.min.x, bounds.min.y, bounds.min.z],
            spacing,
            displacements: vec![0.0; 3 * grid_size * grid_size * grid_size],
        }
    }

    /// Control points per axis.
    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    /// Position of control node (0, 0, 0).
    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    /// Spacing between control nodes.
    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    /// Node displacements.
    pub fn displacements(&self) -> &[f64] {
        &self.displacements
    }

    /// Tensor form on `device`.
    pub fn to_transform<B: Backend>(&self, device: &B::Device) -> BSplineTransform<B> {
        let n = self.grid_size * self.grid_size * self.grid_size;
        let values: Vec<f32> = self.displacements.iter().map(|&d| d as f32).collect();
        let coefficients = Tensor::<B, 2>::from_data(TensorData::new(values, [n, 3]), device);
        BSplineTransform::new(self.grid_size, self.origin, self.spacing, coefficients)
    }
}

/// A committed or candidate transform of fiber geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FiberTransform {
    Affine(AffineParameters),
    Nonlinear(BSplineParameters),
}

impl FiberTransform {
    /// Identity affine transform about `center`.
    pub fn affine_identity(center: Point3<f64>, dof: AffineDof) -> Self {
        Self::Affine(AffineParameters::identity(center, dof))
    }

    /// Zero B-spline deformation spanning `bounds`.
    pub fn nonlinear_identity(grid_size: usize, bounds: &Bounds) -> Self {
        Self::Nonlinear(BSplineParameters::covering(grid_size, bounds))
    }

    /// Transform family.
    pub fn kind(&self) -> TransformKind {
        match self {
            Self::Affine(_) => TransformKind::Affine,
            Self::Nonlinear(_) => TransformKind::Nonlinear,
        }
    }

    /// Length of the searched parameter vector.
    pub fn num_parameters(&self) -> usize {
        match self {
            Self::Affine(p) => p.dof.num_parameters(),
            Self::Nonlinear(p) => p.displacements.len(),
        }
    }

    /// The searched parameters as a flat vector.
    pub fn search_vector(&self) -> Vec<f64> {
        match self {
            Self::Affine(p) => p.values[..p.dof.num_parameters()].to_vec(),
            Self::Nonlinear(p) => p.displacements.clone(),
        }
    }

    /// Copy of this transform with the searched parameters replaced.
    ///
    /// # Panics
    /// If `values.len() != self.num_parameters()`.
    pub fn with_search_vector(&self, values: &[f64]) -> Self {
        assert_eq!(values.len(), self.num_parameters(), "parameter vector length mismatch");
        match self {
            Self::Affine(p) => {
                let mut next = p.clone();
                next.values[..values.len()].copy_from_slice(values);
                Self::Affine(next)
            }
            Self::Nonlinear(p) => {
                let mut next = p.clone();
                next.displacements.copy_from_slice(values);
                Self::Nonlinear(next)
            }
        }
    }

    /// Whether every searched parameter is zero.
    pub fn is_identity(&self) -> bool {
        self.search_vector().iter().all(|v| *v == 0.0)
    }

    fn to_tensor_transform<B: Backend>(&self, device: &B::Device) -> Box<dyn Transform<B>> {
        match self {
            Self::Affine(p) => Box::new(p.to_transform::<B>(device)),
            Self::Nonlinear(p) => Box::new(p.to_transform::<B>(device)),
        }
    }

    /// Transform a flat `[x, y, z, x, y, z, ...]` coordinate block.
    pub fn apply_to_coords<B: Backend>(&self, coords: &[f32], device: &B::Device) -> Result<Vec<f32>, DataError> {
        let transform = self.to_tensor_transform::<B>(device);
        let mut out = Vec::with_capacity(coords.len());
        for chunk in coords.chunks(CHUNK_POINTS * 3) {
            let points = Tensor::<B, 2>::from_data(TensorData::new(chunk.to_vec(), [chunk.len() / 3, 3]), device);
            let moved = transform.transform_points(points);
            out.extend(moved.into_data().convert::<f32>().to_vec::<f32>()?);
        }
        Ok(out)
    }

    /// Transform every point of a resampled fiber block.
    pub fn apply_to_resampled<B: Backend>(
        &self,
        fibers: &ResampledFibers,
        device: &B::Device,
    ) -> Result<ResampledFibers, DataError> {
        let coords = self.apply_to_coords::<B>(fibers.coords(), device)?;
        Ok(fibers.with_coords(coords))
    }

    /// Transform every point of a fiber set, producing a new set.
    pub fn apply_to_fiber_set<B: Backend>(&self, set: &FiberSet, device: &B::Device) -> Result<FiberSet, DataError> {
        let coords: Vec<f32> = set
            .iter()
            .flat_map(|f| f.points().iter())
            .flat_map(|p| [p.x, p.y, p.z])
            .collect();
        let moved = self.apply_to_coords::<B>(&coords, device)?;

        let mut offset = 0;
        let fibers = set
            .iter()
            .map(|fiber| {
                let n = fiber.num_points() * 3;
                let points: Vec<[f32; 3]> = moved[offset..offset + n]
                    .chunks_exact(3)
                    .map(|c| [c[0], c[1], c[2]])
                    .collect();
                offset += n;
                Fiber::from_coords(&points)
            })
            .collect();
        Ok(fibers)
    }
}
