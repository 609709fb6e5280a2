//! Optimizer trait for bounded derivative-free minimization.

use crate::error::Result;

/// Outcome of one optimizer call.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    /// Best parameter vector found
    pub x: Vec<f64>,
    /// Objective value at `x`
    pub value: f64,
    /// Objective value at the start vector
    pub initial_value: f64,
    /// Objective evaluations performed
    pub evaluations: usize,
    /// Whether the step fell below the final step (rather than the budget running out)
    pub converged: bool,
    /// Step size when the search stopped
    pub final_step: f64,
    /// Coordinate the next call should poll first
    pub next_axis: usize,
}

/// Minimizer of a scalar objective over a flat parameter vector.
///
/// The objective receives the index of the evaluation within this call
/// (0 for the start vector) and the candidate vector. Indices are assigned
/// deterministically so callers can derive per-evaluation random streams.
pub trait Optimizer: Send + Sync {
    /// Minimize `objective` starting from `initial`.
    ///
    /// Never calls `objective` more than [`max_evaluations`](Self::max_evaluations)
    /// times. The returned value is never worse than the start value.
    ///
    /// # Errors
    /// Objective errors are returned unchanged as soon as they occur.
    /// `Optimization` if no evaluated value was finite.
    fn minimize<F>(&self, initial: &[f64], objective: F) -> Result<OptimizationResult>
    where
        F: Fn(usize, &[f64]) -> Result<f64> + Sync;

    /// Evaluation budget per call.
    fn max_evaluations(&self) -> usize;
}
