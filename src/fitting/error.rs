//! Model fitting error types

use thiserror::Error;

/// Errors raised by the regression fits
///
/// These are treated as fatal for the replicate that produced them: the
/// caller aborts the replicate instead of substituting a default.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelFitError {
    /// Nothing to fit
    #[error("No observations to fit")]
    Empty,

    /// Inputs with mismatched lengths or invalid values
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Every observation is censored
    #[error("No events in the data")]
    NoEvents,

    /// Collinear design or a covariate without variation
    #[error("The information matrix of the {model} fit is singular")]
    Singular { model: &'static str },

    #[error("The {model} fit did not converge after {iterations} iterations")]
    NotConverged {
        model: &'static str,
        iterations: usize,
    },

    /// The log-likelihood could not be evaluated at the starting values
    #[error("Non-finite log-likelihood in the {model} fit")]
    NonFinite { model: &'static str },
}
