//! Validation utilities for registration inputs.
//!
//! Geometry problems are data errors; bad numeric settings are configuration
//! errors. Both are detected before any scale executes.

use tractalign_core::FiberSet;
use crate::error::{RegistrationError, Result};

/// Check that every fiber has points and every coordinate is finite.
pub fn validate_fiber_set(set: &FiberSet, label: &str) -> Result<()> {
    if let Some(index) = set.iter().position(|f| f.is_empty()) {
        return Err(RegistrationError::data(format!("{} fiber {} has no points", label, index)));
    }
    if let Some(index) = set.iter().position(|f| !f.is_finite()) {
        return Err(RegistrationError::data(format!(
            "{} fiber {} has non-finite coordinates",
            label, index
        )));
    }
    Ok(())
}

/// Check an optimizer step bracket: both positive and `final <= initial`.
pub fn validate_step_bracket(initial_step: f64, final_step: f64) -> Result<()> {
    if !(initial_step > 0.0 && initial_step.is_finite()) {
        return Err(RegistrationError::config(format!(
            "Initial step must be positive, got {}",
            initial_step
        )));
    }
    if !(final_step > 0.0 && final_step.is_finite()) {
        return Err(RegistrationError::config(format!(
            "Final step must be positive, got {}",
            final_step
        )));
    }
    if final_step > initial_step {
        return Err(RegistrationError::config(format!(
            "Final step {} exceeds initial step {}",
            final_step, initial_step
        )));
    }
    Ok(())
}

/// Check an evaluation budget.
pub fn validate_max_evaluations(max_evaluations: usize) -> Result<()> {
    if max_evaluations == 0 {
        return Err(RegistrationError::config("max_evaluations must be positive"));
    }
    Ok(())
}

/// Points per fiber must allow a direction to be defined.
pub fn validate_points_per_fiber(points_per_fiber: usize) -> Result<()> {
    if points_per_fiber < 2 {
        return Err(RegistrationError::config(format!(
            "points_per_fiber must be at least 2, got {}",
            points_per_fiber
        )));
    }
    Ok(())
}

/// Sample sizes must be positive.
pub fn validate_sample_size(size: usize, name: &str) -> Result<()> {
    if size == 0 {
        return Err(RegistrationError::config(format!("{} must be positive", name)));
    }
    Ok(())
}
