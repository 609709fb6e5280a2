//! Registration run configuration.

use burn::config::Config;
use tractalign_core::transform::AffineDof;
use crate::error::RegistrationError;
use crate::schedule::RegistrationMode;
use crate::validation;

/// Settings of one subject-to-atlas registration run.
///
/// `mode` selects the scale schedule and is kept as free text so that an
/// unknown name is reported as a configuration error when the run is built.
#[derive(Config, Debug)]
pub struct RegistrationConfig {
    /// Schedule name: `affine`, `affine_neonate`, `nonlinear`, `affineTEST` or `nonlinearTEST`
    pub mode: String,
    /// Fibers kept from each brain after length filtering
    #[config(default = 20000)]
    pub number_of_fibers: usize,
    /// Shortest fiber kept, in mm
    #[config(default = 80.0)]
    pub fiber_length_min: f64,
    /// Longest fiber kept, in mm
    #[config(default = 150.0)]
    pub fiber_length_max: f64,
    /// Save the transformed subject after every iteration
    #[config(default = false)]
    pub verbose: bool,
    /// Seed for downsampling and every objective evaluation
    #[config(default = 0)]
    pub seed: u64,
    /// B-spline control points per axis for nonlinear modes
    #[config(default = 5)]
    pub grid_size: usize,
    /// Parameters searched by affine modes
    #[config(default = "AffineDof::Full")]
    pub affine_dof: AffineDof,
    /// Evaluate optimizer candidates on the rayon pool
    #[config(default = true)]
    pub parallel: bool,
}

impl RegistrationConfig {
    /// Resolve the mode name.
    pub fn registration_mode(&self) -> crate::error::Result<RegistrationMode> {
        self.mode.parse()
    }

    /// Check the numeric settings. Does not look at the mode.
    pub fn validate(&self) -> crate::error::Result<()> {
        validation::validate_sample_size(self.number_of_fibers, "number_of_fibers")?;
        if !self.fiber_length_min.is_finite() || !self.fiber_length_max.is_finite() {
            return Err(RegistrationError::config(format!(
                "Fiber length bounds must be finite, got [{}, {}]",
                self.fiber_length_min, self.fiber_length_max
            )));
        }
        if self.grid_size < 2 {
            return Err(RegistrationError::config(format!(
                "grid_size must be at least 2, got {}",
                self.grid_size
            )));
        }
        Ok(())
    }
}
