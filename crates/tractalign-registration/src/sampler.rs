//! Random fiber sampling for objective evaluation.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tractalign_core::{FiberSet, ResampledFibers};
use crate::error::{RegistrationError, Result};

/// Draws random subsets of a fiber set in resampled form.
///
/// Every fiber is resampled once at construction; each call to
/// [`sample`](Self::sample) copies a fresh subset out of that cache.
#[derive(Debug, Clone)]
pub struct FiberSampler {
    fibers: ResampledFibers,
}

impl FiberSampler {
    /// Resample every fiber of `set` to `points_per_fiber` points.
    pub fn new(set: &FiberSet, points_per_fiber: usize) -> Self {
        Self {
            fibers: ResampledFibers::from_fiber_set(set, points_per_fiber),
        }
    }

    /// Number of fibers available.
    pub fn len(&self) -> usize {
        self.fibers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fibers.is_empty()
    }

    pub fn points_per_fiber(&self) -> usize {
        self.fibers.points_per_fiber()
    }

    /// All fibers in resampled form.
    pub fn resampled(&self) -> &ResampledFibers {
        &self.fibers
    }

    /// Draw `min(n, len)` distinct fibers uniformly at random.
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<ResampledFibers> {
        if self.fibers.is_empty() {
            return Err(RegistrationError::data("cannot sample fibers from an empty fiber set"));
        }
        let k = n.min(self.fibers.len());
        let indices = rand::seq::index::sample(rng, self.fibers.len(), k);
        Ok(self.fibers.select(indices))
    }
}

/// Source of per-evaluation random generators.
///
/// Evaluation `i` of a run draws from ChaCha stream `offset + i` of the run
/// seed, so candidates evaluated in parallel get independent samples and a
/// seeded run is reproducible regardless of scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationStream {
    seed: u64,
    offset: u64,
}

impl EvaluationStream {
    pub fn new(seed: u64, offset: u64) -> Self {
        Self { seed, offset }
    }

    /// Generator for evaluation `index` of the current optimizer call.
    pub fn rng(&self, index: usize) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(self.offset.wrapping_add(index as u64));
        rng
    }
}
