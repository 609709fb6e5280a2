//! Opportunistic compass search with a quadratic model step.
//!
//! The search walks the coordinates cyclically. For each axis it polls
//! `x ± step · e_i` and moves at once if either poll point strictly improves the
//! incumbent, so one sweep can move every coordinate. Axes where neither
//! poll point improved give a parabola through `f(x − h)`, `f(x)`, `f(x + h)`; at
//! the end of a sweep the combined minimizer of those parabolas is tried as
//! one extra candidate so the search can settle between lattice points. A
//! sweep without any accepted move contracts the step.

use burn::config::Config;
use rayon::prelude::*;
use super::trait_::{OptimizationResult, Optimizer};
use crate::error::RegistrationError;
use crate::validation;

/// Pattern search configuration.
#[derive(Config, Debug)]
pub struct PatternSearchConfig {
    /// Starting poll step
    pub initial_step: f64,
    /// The search stops once the step falls below this
    pub final_step: f64,
    /// Hard cap on objective evaluations per call
    pub max_evaluations: usize,
    /// Step multiplier after an unsuccessful sweep
    #[config(default = 0.5)]
    pub contraction: f64,
    /// Evaluate the two poll points of one axis on the rayon pool
    #[config(default = true)]
    pub parallel: bool,
    /// First coordinate polled; lets successive calls continue the sweep
    #[config(default = 0)]
    pub start_axis: usize,
}

impl PatternSearchConfig {
    /// Initialize the optimizer.
    pub fn init(&self) -> crate::error::Result<PatternSearch> {
        validation::validate_step_bracket(self.initial_step, self.final_step)?;
        validation::validate_max_evaluations(self.max_evaluations)?;
        if !(self.contraction > 0.0 && self.contraction < 1.0) {
            return Err(RegistrationError::config(format!(
                "contraction must be in (0, 1), got {}",
                self.contraction
            )));
        }
        Ok(PatternSearch {
            initial_step: self.initial_step,
            final_step: self.final_step,
            max_evaluations: self.max_evaluations,
            contraction: self.contraction,
            parallel: self.parallel,
            start_axis: self.start_axis,
        })
    }
}

/// Pattern search optimizer.
#[derive(Debug, Clone)]
pub struct PatternSearch {
    initial_step: f64,
    final_step: f64,
    max_evaluations: usize,
    contraction: f64,
    parallel: bool,
    start_axis: usize,
}

/// Poll values `(f(x − h), f(x), f(x + h))` of an axis that did not move.
type Bracket = (f64, f64, f64);

/// `value` strictly improves on `incumbent`; non-finite values never do.
fn improves(value: f64, incumbent: f64) -> bool {
    value.is_finite() && (!incumbent.is_finite() || value < incumbent)
}

impl PatternSearch {
    fn evaluate_batch<F>(&self, objective: &F, points: &[Vec<f64>], first_index: usize) -> crate::error::Result<Vec<f64>>
    where
        F: Fn(usize, &[f64]) -> crate::error::Result<f64> + Sync,
    {
        if self.parallel {
            points
                .par_iter()
                .enumerate()
                .map(|(j, p)| objective(first_index + j, p))
                .collect()
        } else {
            points
                .iter()
                .enumerate()
                .map(|(j, p)| objective(first_index + j, p))
                .collect()
        }
    }

    /// Minimizer of the per-axis parabolas of the bracketed axes.
    fn model_step(x: &[f64], step: f64, brackets: &[Option<Bracket>]) -> Option<Vec<f64>> {
        let mut point = x.to_vec();
        let mut moved = false;
        for (axis, bracket) in brackets.iter().enumerate() {
            let Some((fm, f0, fp)) = *bracket else {
                continue;
            };
            let curvature = fp + fm - 2.0 * f0;
            if !(curvature > 0.0) {
                continue;
            }
            let delta = (step * (fm - fp) / (2.0 * curvature)).clamp(-step, step);
            if delta != 0.0 {
                point[axis] += delta;
                moved = true;
            }
        }
        moved.then_some(point)
    }
}

impl Optimizer for PatternSearch {
    fn minimize<F>(&self, initial: &[f64], objective: F) -> crate::error::Result<OptimizationResult>
    where
        F: Fn(usize, &[f64]) -> crate::error::Result<f64> + Sync,
    {
        let n = initial.len();
        let mut x = initial.to_vec();
        let initial_value = objective(0, &x)?;
        let mut fx = initial_value;
        let mut evaluations = 1;
        let mut step = self.initial_step;

        let mut axis = if n > 0 { self.start_axis % n } else { 0 };
        let mut visited = 0;
        let mut sweep_improved = false;
        let mut brackets: Vec<Option<Bracket>> = vec![None; n];

        while n > 0 && step >= self.final_step && evaluations < self.max_evaluations {
            let remaining = self.max_evaluations - evaluations;
            let candidates: Vec<Vec<f64>> = [1.0, -1.0]
                .iter()
                .take(remaining)
                .map(|sign| {
                    let mut point = x.clone();
                    point[axis] += sign * step;
                    point
                })
                .collect();
            let values = self.evaluate_batch(&objective, &candidates, evaluations)?;
            evaluations += values.len();

            let mut best: Option<usize> = None;
            for (j, &value) in values.iter().enumerate() {
                if improves(value, best.map_or(fx, |b| values[b])) {
                    best = Some(j);
                }
            }
            match best {
                Some(j) => {
                    x[axis] = candidates[j][axis];
                    fx = values[j];
                    sweep_improved = true;
                }
                None => {
                    if let [fp, fm] = values[..] {
                        if fx.is_finite() && fp.is_finite() && fm.is_finite() {
                            brackets[axis] = Some((fm, fx, fp));
                        }
                    }
                }
            }

            axis = (axis + 1) % n;
            visited += 1;
            if visited < n {
                continue;
            }

            if evaluations < self.max_evaluations {
                if let Some(point) = Self::model_step(&x, step, &brackets) {
                    let value = objective(evaluations, &point)?;
                    evaluations += 1;
                    if improves(value, fx) {
                        x = point;
                        fx = value;
                        sweep_improved = true;
                    }
                }
            }

            if sweep_improved {
                tracing::debug!("Sweep improved to {:.6} (step {:.4}, {} evaluations)", fx, step, evaluations);
            } else {
                step *= self.contraction;
                tracing::debug!("Sweep failed at {:.6}; step now {:.4}", fx, step);
            }
            visited = 0;
            sweep_improved = false;
            brackets.iter_mut().for_each(|b| *b = None);
        }

        if !fx.is_finite() {
            return Err(RegistrationError::optimization(format!(
                "no finite objective value in {} evaluations",
                evaluations
            )));
        }

        Ok(OptimizationResult {
            x,
            value: fx,
            initial_value,
            evaluations,
            converged: step < self.final_step,
            final_step: step,
            next_axis: axis,
        })
    }

    fn max_evaluations(&self) -> usize {
        self.max_evaluations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn bowl(center: &[f64]) -> impl Fn(usize, &[f64]) -> crate::error::Result<f64> + Sync + '_ {
        move |_, x| Ok(x.iter().zip(center).map(|(a, c)| (a - c) * (a - c)).sum())
    }

    #[test]
    fn test_finds_off_lattice_minimum() {
        let optimizer = PatternSearchConfig::new(5.0, 0.5, 200).init().unwrap();
        let center = [3.3, -7.1, 0.4];
        let result = optimizer.minimize(&[0.0; 3], bowl(&center)).unwrap();
        for (x, c) in result.x.iter().zip(&center) {
            assert!((x - c).abs() < 0.05, "{:?}", result.x);
        }
        assert!(result.value <= result.initial_value);
        assert!(result.evaluations <= 200);
    }

    #[test]
    fn test_budget_is_respected() {
        for budget in [1, 2, 5, 7, 13] {
            let calls = AtomicUsize::new(0);
            let optimizer = PatternSearchConfig::new(5.0, 1e-6, budget).init().unwrap();
            let result = optimizer
                .minimize(&[0.0; 4], |_, x| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(x.iter().map(|v| (v - 1.7).abs()).sum())
                })
                .unwrap();
            assert_eq!(calls.load(Ordering::SeqCst), result.evaluations);
            assert!(result.evaluations <= budget);
            assert!(!result.converged);
        }
    }

    #[test]
    fn test_stops_at_final_step() {
        let optimizer = PatternSearchConfig::new(4.0, 2.0, 1000).init().unwrap();
        let result = optimizer.minimize(&[0.0], bowl(&[0.0])).unwrap();
        assert!(result.converged);
        assert_eq!(result.x, vec![0.0]);
        // Start, then failed sweeps at steps 4 and 2
        assert_eq!(result.evaluations, 5);
        assert_eq!(result.final_step, 1.0);
    }

    #[test]
    fn test_short_budget_moves_many_coordinates() {
        // 40 coordinates, budget far below one full sweep of 81 evaluations
        let center = vec![1.0; 40];
        let optimizer = PatternSearchConfig::new(1.0, 0.5, 60).init().unwrap();
        let result = optimizer.minimize(&[0.0; 40], bowl(&center)).unwrap();

        let moved = result.x.iter().filter(|&&v| v != 0.0).count();
        assert_eq!(result.evaluations, 60);
        assert!(moved >= 25, "only {} coordinates moved", moved);
        assert_eq!(result.next_axis, moved);
    }

    #[test]
    fn test_start_axis_continues_sweep() {
        let center = vec![1.0; 40];
        let first = PatternSearchConfig::new(1.0, 0.5, 21).init().unwrap();
        let a = first.minimize(&[0.0; 40], bowl(&center)).unwrap();
        assert_eq!(a.next_axis, 10);

        let second = PatternSearchConfig::new(1.0, 0.5, 21)
            .with_start_axis(a.next_axis)
            .init()
            .unwrap();
        let b = second.minimize(&a.x, bowl(&center)).unwrap();
        assert!(b.x[..20].iter().all(|&v| v == 1.0));
        assert!(b.x[20..].iter().all(|&v| v == 0.0));
        assert_eq!(b.next_axis, 20);
    }

    #[test]
    fn test_start_axis_wraps() {
        let optimizer = PatternSearchConfig::new(1.0, 0.5, 3).with_start_axis(7).init().unwrap();
        let result = optimizer.minimize(&[0.0; 3], bowl(&[1.0, 1.0, 1.0])).unwrap();
        assert_eq!(result.x, vec![0.0, 1.0, 0.0]);
        assert_eq!(result.next_axis, 2);
    }

    #[test]
    fn test_all_non_finite_is_optimization_error() {
        let optimizer = PatternSearchConfig::new(1.0, 0.5, 10).init().unwrap();
        let result = optimizer.minimize(&[0.0, 0.0], |_, _| Ok(f64::NAN));
        assert!(matches!(result, Err(RegistrationError::Optimization { .. })));
    }

    #[test]
    fn test_recovers_from_non_finite_start() {
        let optimizer = PatternSearchConfig::new(1.0, 0.5, 20).init().unwrap();
        let result = optimizer
            .minimize(&[0.0], |_, x| Ok(if x[0] == 0.0 { f64::INFINITY } else { x[0].abs() }))
            .unwrap();
        assert!(result.value.is_finite());
    }

    #[test]
    fn test_objective_error_propagates() {
        let optimizer = PatternSearchConfig::new(1.0, 0.5, 20).init().unwrap();
        let result = optimizer.minimize(&[0.0], |i, _| {
            if i == 0 {
                Ok(1.0)
            } else {
                Err(RegistrationError::data("empty sample"))
            }
        });
        assert!(matches!(result, Err(RegistrationError::Data(_))));
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let center = [1.25, -2.5];
        let parallel = PatternSearchConfig::new(2.0, 0.1, 80).init().unwrap();
        let sequential = PatternSearchConfig::new(2.0, 0.1, 80).with_parallel(false).init().unwrap();
        let a = parallel.minimize(&[0.0; 2], bowl(&center)).unwrap();
        let b = sequential.minimize(&[0.0; 2], bowl(&center)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_config() {
        assert!(PatternSearchConfig::new(1.0, 2.0, 10).init().is_err());
        assert!(PatternSearchConfig::new(1.0, 0.5, 0).init().is_err());
        assert!(PatternSearchConfig::new(1.0, 0.5, 10).with_contraction(1.0).init().is_err());
    }
}
