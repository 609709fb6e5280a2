//! On-disk layout of registration results.
//!
//! A run for subject `<id>` writes into `<output>/<id>/`:
//!
//! ```text
//! <id>_reg.vtk                          registered subject fibers
//! <id>_transform.json                   committed transform parameters
//! <id>_config.json                      configuration used for the run
//! intermediate/<id>_iteration_00001.vtk per-iteration results (verbose runs)
//! ```

use anyhow::{anyhow, Context, Result};
use burn::config::Config;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use tractalign_core::{FiberSet, FiberTransform};
use tractalign_registration::{RegistrationConfig, RegistrationError, RegistrationSink};

use crate::vtk_io::{write_fiber_geometry, VtkEncoding};

/// Read a transform written by [`write_transform`].
pub fn read_transform<P: AsRef<Path>>(path: P) -> Result<FiberTransform> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read transform {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid transform in {}", path.display()))
}

/// Write a transform as pretty-printed JSON.
pub fn write_transform<P: AsRef<Path>>(transform: &FiberTransform, path: P) -> Result<()> {
    let path = path.as_ref();
    let text = serde_json::to_string_pretty(transform)?;
    fs::write(path, text).with_context(|| format!("Failed to write transform {}", path.display()))
}

/// Per-subject output directory; also a [`RegistrationSink`].
#[derive(Debug, Clone)]
pub struct OutputDirectory {
    root: PathBuf,
    subject_id: String,
    encoding: VtkEncoding,
}

impl OutputDirectory {
    /// Create `<output>/<subject_id>/`.
    pub fn new<P: AsRef<Path>>(output: P, subject_id: impl Into<String>) -> Result<Self> {
        let subject_id = subject_id.into();
        let root = output.as_ref().join(&subject_id);
        fs::create_dir_all(&root).with_context(|| format!("Failed to create output directory {}", root.display()))?;
        Ok(Self {
            root,
            subject_id,
            encoding: VtkEncoding::Binary,
        })
    }

    /// Use the file stem of `subject_path` as the subject id.
    pub fn for_subject_file<P: AsRef<Path>, Q: AsRef<Path>>(output: P, subject_path: Q) -> Result<Self> {
        let subject_path = subject_path.as_ref();
        let stem = subject_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("Cannot derive a subject id from {}", subject_path.display()))?;
        Self::new(output, stem)
    }

    pub fn with_encoding(mut self, encoding: VtkEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn registered_path(&self) -> PathBuf {
        self.root.join(format!("{}_reg.vtk", self.subject_id))
    }

    pub fn transform_path(&self) -> PathBuf {
        self.root.join(format!("{}_transform.json", self.subject_id))
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(format!("{}_config.json", self.subject_id))
    }

    pub fn intermediate_path(&self, iteration: usize) -> PathBuf {
        self.root
            .join("intermediate")
            .join(format!("{}_iteration_{:05}.vtk", self.subject_id, iteration))
    }

    /// Record the configuration next to the results.
    pub fn save_config(&self, config: &RegistrationConfig) -> Result<()> {
        let path = self.config_path();
        config
            .save(&path)
            .with_context(|| format!("Failed to write config {}", path.display()))
    }

    fn write_intermediate(&self, iteration: usize, fibers: &FiberSet) -> Result<()> {
        let path = self.intermediate_path(iteration);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_fiber_geometry(fibers, &path, self.encoding)
    }

    fn write_final(&self, fibers: &FiberSet, transform: &FiberTransform) -> Result<()> {
        write_fiber_geometry(fibers, self.registered_path(), self.encoding)?;
        write_transform(transform, self.transform_path())?;
        tracing::info!("Saved registered fibers to {}", self.registered_path().display());
        Ok(())
    }
}

fn to_io_error(err: anyhow::Error) -> RegistrationError {
    RegistrationError::io(format!("{:#}", err))
}

impl RegistrationSink for OutputDirectory {
    fn save_intermediate(
        &mut self,
        iteration: usize,
        fibers: &FiberSet,
        _transform: &FiberTransform,
    ) -> tractalign_registration::Result<()> {
        self.write_intermediate(iteration, fibers).map_err(to_io_error)
    }

    fn save_final(&mut self, fibers: &FiberSet, transform: &FiberTransform) -> tractalign_registration::Result<()> {
        self.write_final(fibers, transform).map_err(to_io_error)
    }
}

enum Job {
    Intermediate(usize, FiberSet, FiberTransform),
    Final(FiberSet, FiberTransform),
}

/// Runs a sink on a worker thread so that writes overlap optimization.
///
/// Jobs are processed in submission order. The first failure is kept and
/// returned by [`BackgroundWriter::finish`]; later jobs are dropped.
pub struct BackgroundWriter<S: RegistrationSink + Send + 'static> {
    sender: Option<Sender<Job>>,
    handle: Option<JoinHandle<(S, Option<RegistrationError>)>>,
}

impl<S: RegistrationSink + Send + 'static> BackgroundWriter<S> {
    pub fn spawn(sink: S) -> Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("tractalign-writer".into())
            .spawn(move || Self::work(sink, receiver))
            .context("Failed to start background writer")?;
        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    fn work(mut sink: S, receiver: Receiver<Job>) -> (S, Option<RegistrationError>) {
        let mut failure = None;
        for job in receiver {
            if failure.is_some() {
                continue;
            }
            let result = match job {
                Job::Intermediate(iteration, fibers, transform) => sink.save_intermediate(iteration, &fibers, &transform),
                Job::Final(fibers, transform) => sink.save_final(&fibers, &transform),
            };
            if let Err(err) = result {
                tracing::error!("Background write failed: {}", err);
                failure = Some(err);
            }
        }
        (sink, failure)
    }

    fn submit(&self, job: Job) -> tractalign_registration::Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| RegistrationError::io("background writer already closed"))?;
        sender
            .send(job)
            .map_err(|_| RegistrationError::io("background writer stopped"))
    }

    /// Wait for pending writes and return the sink, or the first write error.
    pub fn finish(mut self) -> tractalign_registration::Result<S> {
        self.sender.take();
        let handle = self
            .handle
            .take()
            .ok_or_else(|| RegistrationError::io("background writer already finished"))?;
        let (sink, failure) = handle
            .join()
            .map_err(|_| RegistrationError::io("background writer panicked"))?;
        match failure {
            Some(err) => Err(err),
            None => Ok(sink),
        }
    }
}

impl<S: RegistrationSink + Send + 'static> RegistrationSink for BackgroundWriter<S> {
    fn save_intermediate(
        &mut self,
        iteration: usize,
        fibers: &FiberSet,
        transform: &FiberTransform,
    ) -> tractalign_registration::Result<()> {
        self.submit(Job::Intermediate(iteration, fibers.clone(), transform.clone()))
    }

    fn save_final(&mut self, fibers: &FiberSet, transform: &FiberTransform) -> tractalign_registration::Result<()> {
        self.submit(Job::Final(fibers.clone(), transform.clone()))
    }
}

impl<S: RegistrationSink + Send + 'static> Drop for BackgroundWriter<S> {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;
    use tractalign_core::transform::AffineDof;
    use tractalign_core::Fiber;
    use tractalign_registration::MemorySink;

    fn fibers() -> FiberSet {
        FiberSet::new(vec![Fiber::from_coords(&[[0.0, 0.0, 0.0], [0.0, 0.0, 10.0]])])
    }

    #[test]
    fn test_layout() {
        let dir = tempfile::tempdir().unwrap();
        let out = OutputDirectory::for_subject_file(dir.path(), "/data/subj01.vtk").unwrap();
        assert_eq!(out.subject_id(), "subj01");
        assert!(out.root().is_dir());
        assert!(out.registered_path().ends_with("subj01/subj01_reg.vtk"));
        assert!(out.intermediate_path(3).ends_with("subj01/intermediate/subj01_iteration_00003.vtk"));
    }

    #[test]
    fn test_transform_json_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        let identity = FiberTransform::affine_identity(Point3::new(0.45000003112687004, -12.300000190734863, 1e-17), AffineDof::Full);
        let values: Vec<f64> = (0..12).map(|i| (i as f64 + 0.1) / 3.0 * 1.000000119).collect();
        let transform = identity.with_search_vector(&values);

        write_transform(&transform, &path).unwrap();
        assert_eq!(read_transform(&path).unwrap(), transform);
    }

    #[test]
    fn test_background_writer_preserves_order() {
        let mut writer = BackgroundWriter::spawn(MemorySink::new()).unwrap();
        let transform = FiberTransform::affine_identity(Point3::origin(), AffineDof::Full);
        for i in 1..=4 {
            writer.save_intermediate(i, &fibers(), &transform).unwrap();
        }
        writer.save_final(&fibers(), &transform).unwrap();

        let sink = writer.finish().unwrap();
        let order: Vec<usize> = sink.intermediate.iter().map(|(i, _, _)| *i).collect();
        assert_eq!(order, vec![1, 2, 3, 4]);
        assert!(sink.final_result.is_some());
    }

    struct FailingSink;

    impl RegistrationSink for FailingSink {
        fn save_intermediate(&mut self, _: usize, _: &FiberSet, _: &FiberTransform) -> tractalign_registration::Result<()> {
            Err(RegistrationError::io("disk full"))
        }

        fn save_final(&mut self, _: &FiberSet, _: &FiberTransform) -> tractalign_registration::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_background_writer_reports_first_failure() {
        let mut writer = BackgroundWriter::spawn(FailingSink).unwrap();
        let transform = FiberTransform::affine_identity(Point3::origin(), AffineDof::Full);
        writer.save_intermediate(1, &fibers(), &transform).unwrap();
        writer.save_final(&fibers(), &transform).unwrap();
        match writer.finish() {
            Err(RegistrationError::Io(msg)) => assert!(msg.contains("disk full")),
            other => panic!("expected Io error, got {:?}", other.map(|_| ())),
        }
    }
}
