//! Coarse-to-fine scale schedules.
//!
//! Each registration mode maps to a fixed table of scale entries. Early
//! scales use a wide kernel, few fibers and large steps; later scales narrow
//! the kernel and sample more fibers.

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use tractalign_core::TransformKind;
use crate::error::{RegistrationError, Result};

/// Named registration schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistrationMode {
    Affine,
    AffineNeonate,
    Nonlinear,
    AffineTest,
    NonlinearTest,
}

impl RegistrationMode {
    /// Every mode, in table order.
    pub const ALL: [RegistrationMode; 5] = [
        Self::Affine,
        Self::AffineNeonate,
        Self::Nonlinear,
        Self::AffineTest,
        Self::NonlinearTest,
    ];

    /// Name used in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Affine => "affine",
            Self::AffineNeonate => "affine_neonate",
            Self::Nonlinear => "nonlinear",
            Self::AffineTest => "affineTEST",
            Self::NonlinearTest => "nonlinearTEST",
        }
    }

    /// Transform family searched by this mode.
    pub fn transform_kind(self) -> TransformKind {
        match self {
            Self::Affine | Self::AffineNeonate | Self::AffineTest => TransformKind::Affine,
            Self::Nonlinear | Self::NonlinearTest => TransformKind::Nonlinear,
        }
    }

    /// Points each fiber is resampled to during evaluation.
    pub fn points_per_fiber(self) -> usize {
        match self.transform_kind() {
            TransformKind::Affine => 10,
            TransformKind::Nonlinear => 15,
        }
    }
}

impl fmt::Display for RegistrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationMode {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|m| m.as_str()).collect();
                RegistrationError::config(format!(
                    "Unknown registration mode '{}' (expected one of: {})",
                    s,
                    known.join(", ")
                ))
            })
    }
}

/// Settings of one scale. Immutable once the schedule is built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleEntry {
    /// Kernel bandwidth in mm
    pub sigma: f64,
    /// Initial optimizer step in search units
    pub initial_step: f64,
    /// Step below which the optimizer stops
    pub final_step: f64,
    /// Objective evaluations allowed per optimizer call
    pub max_evaluations: usize,
    /// Atlas fibers drawn per evaluation
    pub mean_brain_sample_size: usize,
    /// Subject fibers drawn per evaluation
    pub subject_brain_sample_size: usize,
    /// Optimizer calls at this scale
    pub iterations: usize,
}

impl ScaleEntry {
    /// Fiber pairs compared by one iteration; the unit of progress.
    pub fn comparisons_per_iteration(&self) -> u64 {
        self.mean_brain_sample_size as u64 * self.subject_brain_sample_size as u64
    }
}

struct Columns {
    sigma: &'static [f64],
    iterations: &'static [usize],
    max_evaluations: &'static [usize],
    mean_size: &'static [usize],
    subject_size: &'static [usize],
    initial_step: &'static [f64],
    final_step: &'static [f64],
}

fn columns(mode: RegistrationMode) -> Columns {
    match mode {
        RegistrationMode::Affine => Columns {
            sigma: &[30.0, 10.0, 7.5, 5.0],
            iterations: &[2, 2, 2, 2],
            max_evaluations: &[45, 60, 75, 90],
            mean_size: &[1000, 3000, 4000, 5000],
            subject_size: &[250, 1500, 1750, 2000],
            initial_step: &[10.0, 5.0, 5.0, 5.0],
            final_step: &[5.0, 2.0, 2.0, 2.0],
        },
        RegistrationMode::AffineNeonate => Columns {
            sigma: &[20.0, 10.0, 7.5, 5.0],
            iterations: &[2, 2, 2, 2],
            max_evaluations: &[50, 80, 80, 200],
            mean_size: &[1000, 3000, 5000, 7500],
            subject_size: &[250, 1500, 2000, 2500],
            initial_step: &[10.0, 5.0, 5.0, 5.0],
            final_step: &[5.0, 2.0, 2.0, 2.0],
        },
        RegistrationMode::Nonlinear => Columns {
            sigma: &[3.0, 2.0, 1.0],
            iterations: &[1, 1, 1],
            max_evaluations: &[375, 500, 750],
            mean_size: &[2000, 2000, 2000],
            subject_size: &[500, 750, 900],
            initial_step: &[5.0, 3.0, 2.0],
            final_step: &[2.0, 1.0, 1.0],
        },
        RegistrationMode::AffineTest => Columns {
            sigma: &[30.0, 10.0, 7.5],
            iterations: &[1, 1, 1],
            max_evaluations: &[60, 80, 100],
            mean_size: &[1500, 2000, 3000],
            subject_size: &[100, 500, 1000],
            initial_step: &[5.0, 5.0, 5.0],
            final_step: &[2.0, 2.0, 2.0],
        },
        RegistrationMode::NonlinearTest => Columns {
            sigma: &[3.0, 2.0, 1.0],
            iterations: &[1, 1, 1],
            max_evaluations: &[10, 10, 10],
            mean_size: &[1500, 2000, 3000],
            subject_size: &[500, 750, 1000],
            initial_step: &[5.0, 3.0, 1.0],
            final_step: &[2.0, 1.0, 0.05],
        },
    }
}

/// Ordered scale entries of one mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleSchedule {
    mode: RegistrationMode,
    entries: Vec<ScaleEntry>,
}

impl ScaleSchedule {
    /// The fixed table of `mode`.
    pub fn for_mode(mode: RegistrationMode) -> Self {
        let c = columns(mode);
        let entries = (0..c.sigma.len())
            .map(|i| ScaleEntry {
                sigma: c.sigma[i],
                initial_step: c.initial_step[i],
                final_step: c.final_step[i],
                max_evaluations: c.max_evaluations[i],
                mean_brain_sample_size: c.mean_size[i],
                subject_brain_sample_size: c.subject_size[i],
                iterations: c.iterations[i],
            })
            .collect();
        Self { mode, entries }
    }

    /// A custom schedule. Call [`validate`](Self::validate) before use.
    pub fn from_entries(mode: RegistrationMode, entries: Vec<ScaleEntry>) -> Self {
        Self { mode, entries }
    }

    pub fn mode(&self) -> RegistrationMode {
        self.mode
    }

    pub fn entries(&self) -> &[ScaleEntry] {
        &self.entries
    }

    pub fn num_scales(&self) -> usize {
        self.entries.len()
    }

    pub fn points_per_fiber(&self) -> usize {
        self.mode.points_per_fiber()
    }

    pub fn transform_kind(&self) -> TransformKind {
        self.mode.transform_kind()
    }

    /// Sum of iterations over all scales.
    pub fn total_iterations(&self) -> usize {
        self.entries.iter().map(|e| e.iterations).sum()
    }

    /// Fiber pairs compared over the whole run.
    pub fn total_comparisons(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| e.iterations as u64 * e.comparisons_per_iteration())
            .sum()
    }

    /// Check the structural invariants of the table.
    pub fn validate(&self) -> Result<()> {
        if self.entries.is_empty() {
            return Err(RegistrationError::config(format!("Schedule for mode '{}' has no scales", self.mode)));
        }
        for (i, entry) in self.entries.iter().enumerate() {
            if !(entry.sigma > 0.0 && entry.sigma.is_finite()) {
                return Err(RegistrationError::config(format!("Scale {}: sigma must be positive, got {}", i, entry.sigma)));
            }
            if let Some(prev) = i.checked_sub(1).map(|p| &self.entries[p]) {
                if entry.sigma > prev.sigma {
                    return Err(RegistrationError::config(format!(
                        "Scale {}: sigma {} increases from {}",
                        i, entry.sigma, prev.sigma
                    )));
                }
            }
            crate::validation::validate_step_bracket(entry.initial_step, entry.final_step)?;
            crate::validation::validate_max_evaluations(entry.max_evaluations)?;
            crate::validation::validate_sample_size(entry.mean_brain_sample_size, "mean_brain_sample_size")?;
            crate::validation::validate_sample_size(entry.subject_brain_sample_size, "subject_brain_sample_size")?;
            if entry.iterations == 0 {
                return Err(RegistrationError::config(format!("Scale {}: iterations must be positive", i)));
            }
        }
        Ok(())
    }
}
