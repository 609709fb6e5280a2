//! Metric trait for fiber-bundle dissimilarity.

use burn::tensor::backend::Backend;
use rand_chacha::ChaCha8Rng;
use tractalign_core::FiberTransform;
use crate::error::Result;
use crate::sampler::FiberSampler;

/// Dissimilarity between a transformed subject and an atlas.
///
/// Lower values indicate better alignment. Implementations draw whatever
/// random samples they need from `rng`, which the caller seeds per
/// evaluation; two calls with equally seeded generators must agree.
pub trait Metric<B: Backend>: Send + Sync {
    /// Evaluate the dissimilarity of `transform` applied to the subject.
    ///
    /// # Errors
    /// `Data` if either sampler has no fibers.
    fn evaluate(
        &self,
        transform: &FiberTransform,
        subject: &FiberSampler,
        atlas: &FiberSampler,
        rng: &mut ChaCha8Rng,
        device: &B::Device,
    ) -> Result<f64>;

    /// Get the name of this metric.
    fn name(&self) -> &'static str;
}
