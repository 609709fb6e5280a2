//! Multi-scale registration controller.
//!
//! Drives the coarse-to-fine schedule of a mode: for every scale entry it
//! configures the congealing objective and the pattern search, runs the
//! entry's iterations from the committed transform, commits each result and
//! reports progress.

use std::sync::Arc;
use burn::tensor::backend::Backend;
use nalgebra::{Point3, Vector3};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tractalign_core::fiber::Bounds;
use tractalign_core::filter::DownsampleFilter;
use tractalign_core::{FiberSet, FiberTransform, TransformKind};
use crate::config::RegistrationConfig;
use crate::error::{RegistrationError, Result};
use crate::metric::CongealingObjective;
use crate::optimizer::PatternSearchConfig;
use crate::progress::{ProgressCallback, ProgressInfo, ProgressState, ProgressTracker};
use crate::registration::Registration;
use crate::sampler::{EvaluationStream, FiberSampler};
use crate::schedule::{RegistrationMode, ScaleSchedule};
use crate::sink::RegistrationSink;
use crate::validation;

/// Margin added around the subject when placing the B-spline grid, in mm.
const GRID_PADDING: f64 = 10.0;

/// Lifecycle of a registration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationState {
    Configured,
    Running { scale: usize, iteration: usize },
    Converged,
}

/// The transform currently accepted by the controller.
///
/// `version` counts commits; the optimizer never sees this value, it only
/// proposes candidates derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommittedTransform {
    pub transform: FiberTransform,
    pub version: u64,
}

impl CommittedTransform {
    fn commit(&mut self, transform: FiberTransform) {
        self.transform = transform;
        self.version += 1;
    }
}

/// Statistics of one finished iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationSummary {
    pub scale: usize,
    pub iteration: usize,
    pub sigma: f64,
    pub initial_value: f64,
    pub value: f64,
    pub evaluations: usize,
    pub percent: f64,
}

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    /// Final committed transform
    pub transform: CommittedTransform,
    /// The originally loaded subject under the final transform
    pub transformed: FiberSet,
    /// One entry per iteration, in order
    pub history: Vec<IterationSummary>,
    /// Objective evaluations over the whole run
    pub evaluations: u64,
}

/// Registration of one subject fiber set onto an atlas.
pub struct MultiScaleRegistration<B: Backend> {
    config: RegistrationConfig,
    schedule: ScaleSchedule,
    subject: FiberSet,
    subject_sampler: FiberSampler,
    atlas_sampler: FiberSampler,
    committed: CommittedTransform,
    state: RegistrationState,
    progress: ProgressState,
    evaluations: u64,
    /// Coordinate the next optimizer call polls first
    search_axis: usize,
    tracker: ProgressTracker,
    device: B::Device,
}

impl<B: Backend> MultiScaleRegistration<B> {
    /// Bind a subject and an atlas to a configuration.
    ///
    /// Resolves the mode before touching any fiber data, then checks
    /// geometry, filters both sets by length, downsamples them to
    /// `number_of_fibers` and builds the samplers and the identity
    /// transform of the mode's kind.
    ///
    /// # Errors
    /// `Config` for an unknown mode or invalid settings, `Data` for
    /// non-finite coordinates. Sets emptied by filtering are accepted here
    /// and fail at the first objective evaluation.
    pub fn new(config: RegistrationConfig, subject: FiberSet, atlas: FiberSet, device: B::Device) -> Result<Self> {
        let mode: RegistrationMode = config.registration_mode()?;
        config.validate()?;
        let schedule = ScaleSchedule::for_mode(mode);
        schedule.validate()?;
        validation::validate_points_per_fiber(schedule.points_per_fiber())?;

        validation::validate_fiber_set(&subject, "subject")?;
        validation::validate_fiber_set(&atlas, "atlas")?;

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let subject_kept = preprocess(&subject, &config, &mut rng, "subject");
        let atlas_kept = preprocess(&atlas, &config, &mut rng, "atlas");

        let points_per_fiber = schedule.points_per_fiber();
        let subject_sampler = FiberSampler::new(&subject_kept, points_per_fiber);
        let atlas_sampler = FiberSampler::new(&atlas_kept, points_per_fiber);

        let transform = match schedule.transform_kind() {
            TransformKind::Affine => {
                let center = subject_kept
                    .centroid()
                    .or_else(|| subject.centroid())
                    .unwrap_or_else(Point3::origin);
                FiberTransform::affine_identity(center, config.affine_dof)
            }
            TransformKind::Nonlinear => {
                let bounds = subject_kept.bounds().or_else(|| subject.bounds()).unwrap_or(Bounds {
                    min: Point3::from(Vector3::repeat(-1.0)),
                    max: Point3::from(Vector3::repeat(1.0)),
                });
                FiberTransform::nonlinear_identity(config.grid_size, &bounds.padded(GRID_PADDING))
            }
        };

        tracing::info!(
            "Registration configured: mode {}, {} subject / {} atlas fibers, {} parameters",
            mode,
            subject_sampler.len(),
            atlas_sampler.len(),
            transform.num_parameters()
        );

        Ok(Self {
            progress: ProgressState::new(&schedule),
            config,
            schedule,
            subject,
            subject_sampler,
            atlas_sampler,
            committed: CommittedTransform { transform, version: 0 },
            state: RegistrationState::Configured,
            evaluations: 0,
            search_axis: 0,
            tracker: ProgressTracker::new(),
            device,
        })
    }

    /// Start from an existing transform of the same kind.
    ///
    /// # Errors
    /// `Config` if the transform kind or parameter count does not match the mode.
    pub fn with_initial_transform(mut self, transform: FiberTransform) -> Result<Self> {
        let expected = self.schedule.transform_kind();
        if transform.kind() != expected {
            return Err(RegistrationError::config(format!(
                "incompatible mode sequencing: mode '{}' searches a {:?} transform, got {:?}",
                self.schedule.mode(),
                expected,
                transform.kind()
            )));
        }
        if transform.num_parameters() != self.committed.transform.num_parameters() {
            return Err(RegistrationError::config(format!(
                "incompatible mode sequencing: expected {} parameters, got {}",
                self.committed.transform.num_parameters(),
                transform.num_parameters()
            )));
        }
        self.committed.transform = transform;
        Ok(self)
    }

    /// Register a progress callback.
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.tracker.add_callback(callback);
        self
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    pub fn schedule(&self) -> &ScaleSchedule {
        &self.schedule
    }

    pub fn state(&self) -> RegistrationState {
        self.state
    }

    pub fn committed(&self) -> &CommittedTransform {
        &self.committed
    }

    pub fn progress(&self) -> &ProgressState {
        &self.progress
    }

    /// Objective evaluations performed so far.
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Coordinate the next optimizer call will poll first.
    pub fn search_axis(&self) -> usize {
        self.search_axis
    }

    pub fn subject_sampler(&self) -> &FiberSampler {
        &self.subject_sampler
    }

    pub fn atlas_sampler(&self) -> &FiberSampler {
        &self.atlas_sampler
    }

    /// Run every scale of the schedule and hand the results to `sink`.
    ///
    /// # Errors
    /// The first data, transform or optimization error ends the run;
    /// the committed transform keeps its last accepted value.
    pub fn run(&mut self, sink: &mut dyn RegistrationSink) -> Result<RegistrationOutcome> {
        let result = self.run_schedule(sink);
        if let Err(err) = &result {
            self.tracker.error(&err.to_string());
        }
        result
    }

    fn run_schedule(&mut self, sink: &mut dyn RegistrationSink) -> Result<RegistrationOutcome> {
        let entries = self.schedule.entries().to_vec();
        let total_iterations = self.schedule.total_iterations();
        self.tracker.start(total_iterations);

        let mut history = Vec::with_capacity(total_iterations);
        let mut last_info: Option<ProgressInfo> = None;

        for (scale, entry) in entries.iter().enumerate() {
            let metric = CongealingObjective::new(entry.sigma, entry.subject_brain_sample_size, entry.mean_brain_sample_size);
            let search = PatternSearchConfig::new(entry.initial_step, entry.final_step, entry.max_evaluations)
                .with_parallel(self.config.parallel);

            tracing::info!(
                "Starting scale {}/{}: sigma {}, steps {} -> {}, {} evaluations, {} atlas / {} subject fibers",
                scale + 1,
                entries.len(),
                entry.sigma,
                entry.initial_step,
                entry.final_step,
                entry.max_evaluations,
                entry.mean_brain_sample_size,
                entry.subject_brain_sample_size
            );

            for iteration in 0..entry.iterations {
                self.state = RegistrationState::Running { scale, iteration };
                let optimizer = search.clone().with_start_axis(self.search_axis).init()?;
                let registration = Registration::<B, _, _>::new(optimizer, metric);
                let stream = EvaluationStream::new(self.config.seed, self.evaluations);
                let step = registration
                    .execute(
                        &self.committed.transform,
                        &self.subject_sampler,
                        &self.atlas_sampler,
                        stream,
                        &self.device,
                    )
                    .map_err(|e| e.at_stage(scale, iteration))?;

                self.evaluations += step.optimization.evaluations as u64;
                self.search_axis = step.optimization.next_axis;
                self.committed.commit(step.transform);
                self.progress.record(entry.comparisons_per_iteration());

                tracing::info!(
                    "Done iteration {} / {}. Percent finished approx: {:.2}",
                    self.progress.current_iteration,
                    total_iterations,
                    self.progress.percent()
                );

                let info = self.tracker.info(
                    &self.progress,
                    scale,
                    entry.sigma,
                    step.optimization.value,
                    self.evaluations as usize,
                );
                self.tracker.update(&info);
                last_info = Some(info);

                history.push(IterationSummary {
                    scale,
                    iteration: self.progress.current_iteration,
                    sigma: entry.sigma,
                    initial_value: step.optimization.initial_value,
                    value: step.optimization.value,
                    evaluations: step.optimization.evaluations,
                    percent: self.progress.percent(),
                });

                if self.config.verbose {
                    let transformed = self.apply_to_subject()?;
                    sink.save_intermediate(self.progress.current_iteration, &transformed, &self.committed.transform)?;
                }
            }
        }

        self.state = RegistrationState::Converged;
        let transformed = self.apply_to_subject()?;
        sink.save_final(&transformed, &self.committed.transform)?;

        if let Some(info) = &last_info {
            self.tracker.complete(info);
        }

        Ok(RegistrationOutcome {
            transform: self.committed.clone(),
            transformed,
            history,
            evaluations: self.evaluations,
        })
    }

    /// The originally loaded subject under the committed transform.
    pub fn apply_to_subject(&self) -> Result<FiberSet> {
        Ok(self
            .committed
            .transform
            .apply_to_fiber_set::<B>(&self.subject, &self.device)?)
    }
}

/// Length filtering followed by seeded downsampling.
fn preprocess(set: &FiberSet, config: &RegistrationConfig, rng: &mut ChaCha8Rng, label: &str) -> FiberSet {
    let filtered = set.filter_by_length(config.fiber_length_min, config.fiber_length_max);
    if filtered.is_empty() {
        tracing::warn!(
            "No {} fibers remain after length filtering to [{}, {}] mm ({} loaded)",
            label,
            config.fiber_length_min,
            config.fiber_length_max,
            set.len()
        );
    }
    let kept = DownsampleFilter::new(config.number_of_fibers).apply(&filtered, rng);
    tracing::info!(
        "{}: {} fibers loaded, {} within length bounds, {} kept",
        label,
        set.len(),
        filtered.len(),
        kept.len()
    );
    kept
}
