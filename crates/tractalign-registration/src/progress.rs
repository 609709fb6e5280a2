//! Progress tracking and callbacks for registration runs.
//!
//! Percent complete is estimated from the number of fiber pairs compared,
//! since the cost of an iteration is roughly proportional to it. It is an
//! approximation: optimizer calls can stop early.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use indicatif::{ProgressBar, ProgressStyle};
use crate::schedule::ScaleSchedule;

/// Counters of a run in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressState {
    pub current_iteration: usize,
    pub total_iterations: usize,
    pub comparisons_so_far: u64,
    pub total_comparisons: u64,
}

impl ProgressState {
    /// Zeroed counters for `schedule`.
    pub fn new(schedule: &ScaleSchedule) -> Self {
        Self {
            current_iteration: 0,
            total_iterations: schedule.total_iterations(),
            comparisons_so_far: 0,
            total_comparisons: schedule.total_comparisons(),
        }
    }

    /// Record one finished iteration.
    pub fn record(&mut self, comparisons: u64) {
        self.current_iteration += 1;
        self.comparisons_so_far += comparisons;
    }

    /// Approximate percent complete.
    pub fn percent(&self) -> f64 {
        if self.total_comparisons == 0 {
            return 0.0;
        }
        100.0 * self.comparisons_so_far as f64 / self.total_comparisons as f64
    }
}

/// Progress information for registration iterations.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Iterations completed (1-based after the first).
    pub iteration: usize,
    /// Total number of iterations in the schedule.
    pub total_iterations: usize,
    /// Scale index of the last iteration.
    pub scale: usize,
    /// Kernel bandwidth of that scale.
    pub sigma: f64,
    /// Objective value after the last iteration.
    pub objective: f64,
    /// Objective evaluations performed so far.
    pub evaluations: usize,
    /// Approximate percent complete.
    pub percent: f64,
    /// Time elapsed since start.
    pub elapsed: Duration,
    /// Estimated remaining time.
    pub estimated_remaining: Option<Duration>,
}

impl ProgressInfo {
    /// Estimate the remaining time from the percent complete.
    pub fn calculate_remaining(&mut self) {
        if self.percent > 0.0 {
            let total = self.elapsed.as_secs_f64() * 100.0 / self.percent;
            self.estimated_remaining = Some(Duration::from_secs_f64((total - self.elapsed.as_secs_f64()).max(0.0)));
        }
    }
}

/// Progress callback trait for monitoring registration progress.
pub trait ProgressCallback: Send + Sync {
    /// Called after each iteration.
    fn on_progress(&self, info: &ProgressInfo);

    /// Called when the run starts.
    fn on_start(&self, _total_iterations: usize) {}

    /// Called when the run completes successfully.
    fn on_complete(&self, _info: &ProgressInfo) {}

    /// Called when the run fails.
    fn on_error(&self, _error: &str) {}
}

/// Console progress callback that logs to tracing.
#[derive(Debug, Clone, Default)]
pub struct ConsoleProgressCallback;

impl ProgressCallback for ConsoleProgressCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        let remaining = info
            .estimated_remaining
            .map(|d| format!("{:.1}s", d.as_secs_f64()))
            .unwrap_or_else(|| "N/A".to_string());
        tracing::info!(
            "Scale {} (sigma {}) | Objective: {:.6} | Evaluations: {} | Elapsed: {:.1}s | ETA: {}",
            info.scale,
            info.sigma,
            info.objective,
            info.evaluations,
            info.elapsed.as_secs_f64(),
            remaining
        );
    }

    fn on_start(&self, total_iterations: usize) {
        tracing::info!("Registration started ({} iterations)", total_iterations);
    }

    fn on_complete(&self, info: &ProgressInfo) {
        tracing::info!(
            "Registration completed in {:.2}s with final objective: {:.6}",
            info.elapsed.as_secs_f64(),
            info.objective
        );
    }

    fn on_error(&self, error: &str) {
        tracing::error!("Registration failed: {}", error);
    }
}

/// History callback that records all progress information.
#[derive(Debug, Clone, Default)]
pub struct HistoryCallback {
    history: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl HistoryCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the recorded history.
    pub fn get_history(&self) -> Vec<ProgressInfo> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Clear the history.
    pub fn clear(&self) {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl ProgressCallback for HistoryCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(info.clone());
    }
}

/// Terminal progress bar over iterations.
#[derive(Debug, Clone)]
pub struct ProgressBarCallback {
    bar: ProgressBar,
}

impl Default for ProgressBarCallback {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressBarCallback {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar }
    }

    /// A bar that draws nothing, for tests and batch runs.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl ProgressCallback for ProgressBarCallback {
    fn on_start(&self, total_iterations: usize) {
        self.bar.set_length(total_iterations as u64);
        self.bar.set_position(0);
    }

    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_position(info.iteration as u64);
        self.bar.set_message(format!("{:.2}% objective {:.6}", info.percent, info.objective));
    }

    fn on_complete(&self, _info: &ProgressInfo) {
        self.bar.finish_with_message("Registration complete");
    }

    fn on_error(&self, error: &str) {
        self.bar.abandon_with_message(format!("Registration failed: {}", error));
    }
}

/// Progress tracker that manages multiple callbacks.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    callbacks: Vec<Arc<dyn ProgressCallback>>,
    start_time: Option<Instant>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a callback.
    pub fn add_callback(&mut self, callback: Arc<dyn ProgressCallback>) {
        self.callbacks.push(callback);
    }

    /// Start tracking.
    pub fn start(&mut self, total_iterations: usize) {
        self.start_time = Some(Instant::now());
        for callback in &self.callbacks {
            callback.on_start(total_iterations);
        }
    }

    fn elapsed(&self) -> Duration {
        self.start_time.map(|t| t.elapsed()).unwrap_or(Duration::ZERO)
    }

    /// Build the info record for the current state.
    pub fn info(&self, state: &ProgressState, scale: usize, sigma: f64, objective: f64, evaluations: usize) -> ProgressInfo {
        let mut info = ProgressInfo {
            iteration: state.current_iteration,
            total_iterations: state.total_iterations,
            scale,
            sigma,
            objective,
            evaluations,
            percent: state.percent(),
            elapsed: self.elapsed(),
            estimated_remaining: None,
        };
        info.calculate_remaining();
        info
    }

    /// Update progress.
    pub fn update(&self, info: &ProgressInfo) {
        for callback in &self.callbacks {
            callback.on_progress(info);
        }
    }

    /// Complete tracking.
    pub fn complete(&self, info: &ProgressInfo) {
        for callback in &self.callbacks {
            callback.on_complete(info);
        }
    }

    /// Report error.
    pub fn error(&self, error: &str) {
        for callback in &self.callbacks {
            callback.on_error(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::RegistrationMode;

    #[test]
    fn test_progress_state_percent() {
        let schedule = ScaleSchedule::for_mode(RegistrationMode::AffineTest);
        let mut state = ProgressState::new(&schedule);
        assert_eq!(state.percent(), 0.0);
        for entry in schedule.entries() {
            state.record(entry.comparisons_per_iteration());
        }
        assert_eq!(state.current_iteration, 3);
        assert!((state.percent() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_history_callback() {
        let schedule = ScaleSchedule::for_mode(RegistrationMode::Affine);
        let mut state = ProgressState::new(&schedule);
        let history = Arc::new(HistoryCallback::new());
        let mut tracker = ProgressTracker::new();
        tracker.add_callback(history.clone());
        tracker.start(state.total_iterations);

        state.record(schedule.entries()[0].comparisons_per_iteration());
        tracker.update(&tracker.info(&state, 0, 30.0, 0.5, 45));
        state.record(schedule.entries()[0].comparisons_per_iteration());
        tracker.update(&tracker.info(&state, 0, 30.0, 0.4, 90));

        let recorded = history.get_history();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[1].iteration, 2);
        assert!(recorded[1].percent > recorded[0].percent);
        history.clear();
        assert!(history.get_history().is_empty());
    }

    #[test]
    fn test_remaining_estimate() {
        let mut info = ProgressInfo {
            iteration: 1,
            total_iterations: 4,
            scale: 0,
            sigma: 30.0,
            objective: 0.1,
            evaluations: 10,
            percent: 25.0,
            elapsed: Duration::from_secs(10),
            estimated_remaining: None,
        };
        info.calculate_remaining();
        let remaining = info.estimated_remaining.unwrap().as_secs_f64();
        assert!((remaining - 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_progress_bar_position() {
        let callback = ProgressBarCallback::hidden();
        callback.on_start(3);
        let schedule = ScaleSchedule::for_mode(RegistrationMode::AffineTest);
        let mut state = ProgressState::new(&schedule);
        state.record(1);
        state.record(1);
        callback.on_progress(&ProgressTracker::new().info(&state, 1, 10.0, 0.2, 20));
        assert_eq!(callback.position(), 2);
    }
}
