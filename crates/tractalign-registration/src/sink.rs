//! Destination for registration results.

use tractalign_core::{FiberSet, FiberTransform};
use crate::error::Result;

/// Receives the transformed subject during and after a run.
///
/// Implementations decide where results go (files, memory, a background
/// writer). Failures are reported as `RegistrationError::Io`.
pub trait RegistrationSink {
    /// Result after iteration `iteration` (1-based); only called in verbose runs.
    fn save_intermediate(&mut self, iteration: usize, fibers: &FiberSet, transform: &FiberTransform) -> Result<()>;

    /// Result of the whole run; always called once on success.
    fn save_final(&mut self, fibers: &FiberSet, transform: &FiberTransform) -> Result<()>;
}

/// Sink that keeps results in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub intermediate: Vec<(usize, FiberSet, FiberTransform)>,
    pub final_result: Option<(FiberSet, FiberTransform)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistrationSink for MemorySink {
    fn save_intermediate(&mut self, iteration: usize, fibers: &FiberSet, transform: &FiberTransform) -> Result<()> {
        self.intermediate.push((iteration, fibers.clone(), transform.clone()));
        Ok(())
    }

    fn save_final(&mut self, fibers: &FiberSet, transform: &FiberTransform) -> Result<()> {
        self.final_result = Some((fibers.clone(), transform.clone()));
        Ok(())
    }
}

impl<S: RegistrationSink + ?Sized> RegistrationSink for &mut S {
    fn save_intermediate(&mut self, iteration: usize, fibers: &FiberSet, transform: &FiberTransform) -> Result<()> {
        (**self).save_intermediate(iteration, fibers, transform)
    }

    fn save_final(&mut self, fibers: &FiberSet, transform: &FiberTransform) -> Result<()> {
        (**self).save_final(fibers, transform)
    }
}
