//! Regression fits consumed by the estimators.
//!
//! - [aft]: parametric accelerated failure time model for the outcome
//! - [cox]: proportional hazards model for the censored covariate given the
//!   fully observed one, with its Breslow baseline cumulative hazard

pub mod aft;
pub mod cox;
pub mod distributions;
pub mod error;

pub use aft::{AftFit, AftRegression, Design, INTERCEPT};
pub use cox::{BaselineHazard, CoxFit, CoxRegression};
pub use distributions::OutcomeFamily;
pub use error::ModelFitError;
