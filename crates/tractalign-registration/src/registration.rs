//! One registration iteration: optimize the transform once at a fixed scale.

use burn::tensor::backend::Backend;
use std::marker::PhantomData;
use tractalign_core::FiberTransform;
use crate::error::Result;
use crate::metric::Metric;
use crate::optimizer::{OptimizationResult, Optimizer};
use crate::sampler::{EvaluationStream, FiberSampler};

/// Result of one iteration.
#[derive(Debug, Clone)]
pub struct IterationResult {
    /// Transform to commit
    pub transform: FiberTransform,
    /// Optimizer statistics
    pub optimization: OptimizationResult,
}

/// Pairs a metric with an optimizer for one scale.
pub struct Registration<B, M, O>
where
    B: Backend,
    M: Metric<B>,
    O: Optimizer,
{
    optimizer: O,
    metric: M,
    _phantom: PhantomData<B>,
}

impl<B, M, O> Registration<B, M, O>
where
    B: Backend,
    M: Metric<B>,
    O: Optimizer,
{
    pub fn new(optimizer: O, metric: M) -> Self {
        Self {
            optimizer,
            metric,
            _phantom: PhantomData,
        }
    }

    pub fn metric(&self) -> &M {
        &self.metric
    }

    /// Run the optimizer once from `transform`.
    ///
    /// Every candidate vector is turned into a transform of the same kind and
    /// scored on fresh samples drawn from `stream`.
    pub fn execute(
        &self,
        transform: &FiberTransform,
        subject: &FiberSampler,
        atlas: &FiberSampler,
        stream: EvaluationStream,
        device: &B::Device,
    ) -> Result<IterationResult> {
        let start = transform.search_vector();
        let objective = |index: usize, x: &[f64]| -> Result<f64> {
            let candidate = transform.with_search_vector(x);
            let mut rng = stream.rng(index);
            self.metric.evaluate(&candidate, subject, atlas, &mut rng, device)
        };

        let optimization = self.optimizer.minimize(&start, objective)?;
        tracing::debug!(
            "{}: {:.6} -> {:.6} in {} evaluations",
            self.metric.name(),
            optimization.initial_value,
            optimization.value,
            optimization.evaluations
        );

        Ok(IterationResult {
            transform: transform.with_search_vector(&optimization.x),
            optimization,
        })
    }
}
