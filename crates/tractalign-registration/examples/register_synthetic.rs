//! Synthetic Fiber Registration Example
//!
//! Registers a displaced copy of a synthetic fiber bundle back onto the
//! original with the `affineTEST` schedule, then writes the registered
//! fibers, the transform and the configuration to an output directory.
//!
//! Pass `<subject.vtk> <atlas.vtk>` to register real tractography instead.
//!
//! Usage:
//!   cargo run --example register_synthetic -- [SUBJECT ATLAS] [--output DIR] [--mode MODE] [--verbose]

use std::path::PathBuf;
use std::sync::Arc;
use burn_ndarray::NdArray;
use clap::Parser;
use tractalign_core::{Fiber, FiberSet};
use tractalign_io::{read_fiber_geometry, BackgroundWriter, OutputDirectory};
use tractalign_registration::{MultiScaleRegistration, ProgressBarCallback, RegistrationConfig};

type Backend = NdArray<f32>;

#[derive(Parser)]
#[command(name = "register_synthetic")]
#[command(about = "Register a subject fiber set onto an atlas")]
struct Cli {
    /// Subject and atlas VTK files; a synthetic pair is used when omitted
    #[arg(num_args = 2, value_names = ["SUBJECT", "ATLAS"])]
    inputs: Vec<PathBuf>,

    /// Directory receiving one sub-directory per subject
    #[arg(short, long, default_value = "tractalign_output")]
    output: PathBuf,

    /// Registration mode (affine, affine_neonate, nonlinear, affineTEST, nonlinearTEST)
    #[arg(short, long, default_value = "affineTEST")]
    mode: String,

    /// Save the transformed subject after every iteration
    #[arg(short, long)]
    verbose: bool,

    /// Seed for fiber sampling
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn synthetic_bundle(count: usize, shift: [f32; 3], tilt: f32) -> FiberSet {
    (0..count)
        .map(|i| {
            let t = i as f32;
            let axis = i % 3;
            let offset = [
                ((t * 7.3) % 60.0) - 30.0,
                ((t * 13.1) % 60.0) - 30.0,
                ((t * 3.7) % 60.0) - 30.0,
            ];
            let length = 90.0 + (t * 11.0) % 40.0;
            let coords: Vec<[f32; 3]> = (0..=30)
                .map(|k| {
                    let s = k as f32 / 30.0;
                    let mut p = offset;
                    p[axis] += (s - 0.5) * length;
                    p[(axis + 1) % 3] += 6.0 * (std::f32::consts::PI * s).sin();
                    // Small shear of y by x
                    p[1] += tilt * p[0];
                    [p[0] + shift[0], p[1] + shift[1], p[2] + shift[2]]
                })
                .collect();
            Fiber::from_coords(&coords)
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let output = &cli.output;

    let (subject, atlas, out) = match cli.inputs.as_slice() {
        [] => {
            println!("Using a synthetic atlas and a displaced subject");
            let atlas = synthetic_bundle(150, [0.0; 3], 0.0);
            let subject = synthetic_bundle(150, [6.0, -4.0, 3.0], 0.03);
            (subject, atlas, OutputDirectory::new(output, "synthetic")?)
        }
        [subject_path, atlas_path] => {
            let subject = read_fiber_geometry(subject_path)?;
            let atlas = read_fiber_geometry(atlas_path)?;
            (subject, atlas, OutputDirectory::for_subject_file(output, subject_path)?)
        }
        other => anyhow::bail!("expected either no inputs or <subject.vtk> <atlas.vtk>, got {} paths", other.len()),
    };
    println!("Subject: {} fibers, atlas: {} fibers", subject.len(), atlas.len());

    let config = RegistrationConfig::new(cli.mode.clone())
        .with_verbose(cli.verbose)
        .with_seed(cli.seed);
    out.save_config(&config)?;

    let device = Default::default();
    let mut registration = MultiScaleRegistration::<Backend>::new(config, subject, atlas, device)?
        .with_progress_callback(Arc::new(ProgressBarCallback::new()));
    println!(
        "Mode {}: {} scales, {} iterations, {} parameters",
        registration.schedule().mode(),
        registration.schedule().num_scales(),
        registration.schedule().total_iterations(),
        registration.committed().transform.num_parameters(),
    );

    let mut writer = BackgroundWriter::spawn(out)?;
    let outcome = registration.run(&mut writer)?;
    let out = writer.finish()?;

    for step in &outcome.history {
        println!(
            "  scale {} iteration {}: objective {:.6} -> {:.6} ({} evaluations)",
            step.scale, step.iteration, step.initial_value, step.value, step.evaluations
        );
    }
    println!("Total evaluations: {}", outcome.evaluations);
    println!("Results written to {}", out.root().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_inputs_come_in_pairs() {
        let cli = Cli::try_parse_from(["register_synthetic", "--mode", "affine"]).unwrap();
        assert!(cli.inputs.is_empty());
        assert_eq!(cli.mode, "affine");

        let cli = Cli::try_parse_from(["register_synthetic", "s.vtk", "a.vtk", "-o", "out"]).unwrap();
        assert_eq!(cli.inputs, vec![PathBuf::from("s.vtk"), PathBuf::from("a.vtk")]);
        assert_eq!(cli.output, PathBuf::from("out"));

        assert!(Cli::try_parse_from(["register_synthetic", "s.vtk"]).is_err());
    }
}
