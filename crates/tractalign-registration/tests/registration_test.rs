mod common;

use std::sync::Arc;
use burn_ndarray::NdArray;
use tractalign_core::transform::AffineDof;
use tractalign_core::TransformKind;
use tractalign_registration::{
    HistoryCallback, MemorySink, MultiScaleRegistration, RegistrationConfig, RegistrationError, RegistrationState,
};

type B = NdArray<f32>;

fn bind(config: RegistrationConfig, subject_shift: [f32; 3]) -> MultiScaleRegistration<B> {
    let atlas = common::synthetic_atlas(60);
    let subject = common::translated(&atlas, subject_shift);
    MultiScaleRegistration::<B>::new(config, subject, atlas, Default::default()).unwrap()
}

#[test]
fn test_affine_test_recovers_translation() {
    let atlas = common::synthetic_atlas(60);
    let subject = common::translated(&atlas, [4.0, -3.0, 2.5]);
    let config = RegistrationConfig::new("affineTEST".to_string()).with_affine_dof(AffineDof::Translation);
    let mut registration = MultiScaleRegistration::<B>::new(config, subject.clone(), atlas.clone(), Default::default()).unwrap();

    let before = common::mean_point_distance(&subject, &atlas);
    let mut sink = MemorySink::new();
    let outcome = registration.run(&mut sink).unwrap();
    let after = common::mean_point_distance(&outcome.transformed, &atlas);

    assert!(before > 5.0);
    assert!(after < 1.0, "mean distance {} mm after registration, transform {:?}", after, outcome.transform.transform);
}

#[test]
fn test_full_affine_improves_alignment() {
    let atlas = common::synthetic_atlas(60);
    let subject = common::translated(&atlas, [4.0, -3.0, 2.5]);
    let config = RegistrationConfig::new("affineTEST".to_string());
    let mut registration = MultiScaleRegistration::<B>::new(config, subject.clone(), atlas.clone(), Default::default()).unwrap();

    let outcome = registration.run(&mut MemorySink::new()).unwrap();
    let before = common::mean_point_distance(&subject, &atlas);
    let after = common::mean_point_distance(&outcome.transformed, &atlas);
    assert!(after < before, "{} -> {}", before, after);
    for step in &outcome.history {
        assert!(step.value <= step.initial_value);
    }
}

#[test]
fn test_unknown_mode_is_config_error() {
    let config = RegistrationConfig::new("unknown".to_string());
    let result = MultiScaleRegistration::<B>::new(config, common::synthetic_atlas(5), common::synthetic_atlas(5), Default::default());
    assert!(matches!(result, Err(RegistrationError::Config(_))));
}

#[test]
fn test_short_fibers_fail_at_first_evaluation() {
    let config = RegistrationConfig::new("affineTEST".to_string());
    let mut registration =
        MultiScaleRegistration::<B>::new(config, common::short_fibers(30), common::synthetic_atlas(10), Default::default())
            .unwrap();
    assert!(registration.subject_sampler().is_empty());

    let mut sink = MemorySink::new();
    let result = registration.run(&mut sink);
    assert!(matches!(result, Err(RegistrationError::Data(_))));
    assert_eq!(registration.evaluations(), 0);
    assert_eq!(registration.committed().version, 0);
    assert_eq!(registration.state(), RegistrationState::Running { scale: 0, iteration: 0 });
    assert!(sink.final_result.is_none());
}

#[test]
fn test_verbose_run_saves_every_iteration() {
    let config = RegistrationConfig::new("affineTEST".to_string())
        .with_verbose(true)
        .with_affine_dof(AffineDof::Rigid);
    let mut registration = bind(config, [2.0, 0.0, 0.0]);
    let mut sink = MemorySink::new();
    registration.run(&mut sink).unwrap();

    let iterations: Vec<usize> = sink.intermediate.iter().map(|(i, _, _)| *i).collect();
    assert_eq!(iterations, vec![1, 2, 3]);
    assert!(sink.final_result.is_some());
    // Intermediate results are the full loaded subject
    assert_eq!(sink.intermediate[0].1.len(), 60);
}

#[test]
fn test_quiet_run_saves_only_final() {
    let config = RegistrationConfig::new("affineTEST".to_string()).with_affine_dof(AffineDof::Translation);
    let mut registration = bind(config, [2.0, 0.0, 0.0]);
    let mut sink = MemorySink::new();
    let outcome = registration.run(&mut sink).unwrap();

    assert!(sink.intermediate.is_empty());
    let (fibers, transform) = sink.final_result.unwrap();
    assert_eq!(fibers, outcome.transformed);
    assert_eq!(transform, outcome.transform.transform);
}

#[test]
fn test_progress_reaches_one_hundred_percent() {
    let history = Arc::new(HistoryCallback::new());
    let config = RegistrationConfig::new("affineTEST".to_string()).with_affine_dof(AffineDof::Translation);
    let mut registration = bind(config, [1.0, 1.0, 0.0]).with_progress_callback(history.clone());
    registration.run(&mut MemorySink::new()).unwrap();

    let recorded = history.get_history();
    assert_eq!(recorded.len(), 3);
    assert!(recorded.windows(2).all(|w| w[1].percent > w[0].percent));
    assert!((recorded[2].percent - 100.0).abs() < 1e-9);
    assert_eq!(recorded[2].iteration, 3);
    assert_eq!(recorded[2].total_iterations, 3);
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let atlas = common::synthetic_atlas(150);
    let subject = common::translated(&atlas, [3.0, 1.0, -2.0]);
    let run = |parallel: bool| {
        let config = RegistrationConfig::new("affineTEST".to_string())
            .with_seed(5)
            .with_parallel(parallel)
            .with_affine_dof(AffineDof::Rigid);
        let mut registration =
            MultiScaleRegistration::<B>::new(config, subject.clone(), atlas.clone(), Default::default()).unwrap();
        registration.run(&mut MemorySink::new()).unwrap().transform
    };
    let first = run(true);
    assert_eq!(first, run(true));
    assert_eq!(first, run(false));
}

#[test]
fn test_nonlinear_test_smoke() {
    let config = RegistrationConfig::new("nonlinearTEST".to_string()).with_verbose(true);
    let mut registration = bind(config, [1.0, 0.0, -1.0]);
    assert_eq!(registration.committed().transform.kind(), TransformKind::Nonlinear);
    assert_eq!(registration.committed().transform.num_parameters(), 375);

    let mut sink = MemorySink::new();
    let outcome = registration.run(&mut sink).unwrap();
    assert_eq!(outcome.transform.transform.kind(), TransformKind::Nonlinear);
    assert!(outcome.evaluations <= 30);
    assert_eq!(outcome.history.len(), 3);
    assert_eq!(sink.intermediate.len(), 3);
    for step in &outcome.history {
        assert_eq!(step.evaluations, 10);
        assert!(step.value <= step.initial_value);
    }
    // Each iteration polls five control coordinates and the next one resumes after them
    assert_eq!(registration.search_axis(), 15);
    let moved: Vec<usize> = outcome
        .transform
        .transform
        .search_vector()
        .iter()
        .enumerate()
        .filter(|(_, v)| **v != 0.0)
        .map(|(i, _)| i)
        .collect();
    assert!(moved.iter().all(|&i| i < 15), "moved {:?}", moved);
}

#[test]
fn test_nonlinear_refines_affine_result() {
    let atlas = common::synthetic_atlas(60);
    let subject = common::translated(&atlas, [3.0, 0.0, 0.0]);

    let affine = RegistrationConfig::new("affineTEST".to_string()).with_affine_dof(AffineDof::Translation);
    let mut first = MultiScaleRegistration::<B>::new(affine, subject, atlas.clone(), Default::default()).unwrap();
    let aligned = first.run(&mut MemorySink::new()).unwrap().transformed;

    // A nonlinear mode cannot continue from an affine transform directly
    let nonlinear = RegistrationConfig::new("nonlinearTEST".to_string());
    let second = MultiScaleRegistration::<B>::new(nonlinear, aligned, atlas, Default::default()).unwrap();
    let affine_transform = first.committed().transform.clone();
    assert!(matches!(second.with_initial_transform(affine_transform), Err(RegistrationError::Config(_))));
}
