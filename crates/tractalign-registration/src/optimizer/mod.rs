//! Derivative-free optimizers.
//!
//! The objective is stochastic and has no usable gradient, so parameters are
//! searched by direct polling within a fixed evaluation budget.
//!
//! # Examples
//!
//! ```rust,ignore
//! use tractalign_registration::optimizer::{Optimizer, PatternSearchConfig};
//!
//! let optimizer = PatternSearchConfig::new(5.0, 2.0, 60).init()?;
//! let result = optimizer.minimize(&[0.0, 0.0], |_, x| Ok(x[0] * x[0] + x[1] * x[1]))?;
//! ```

pub mod trait_;
pub mod pattern_search;

pub use trait_::{OptimizationResult, Optimizer};
pub use pattern_search::{PatternSearch, PatternSearchConfig};
