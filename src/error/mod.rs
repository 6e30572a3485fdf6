use thiserror::Error;

pub use crate::fitting::ModelFitError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AftImputeError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    /// The conditional survival curve could not be inverted for a draw.
    #[error("No root found while inverting the conditional distribution: {reason}")]
    RootNotFound { reason: String },
    #[error("Rubin's rules need at least two imputations, got {replicates}")]
    InsufficientReplicates { replicates: usize },
    #[error("Failed to write results: {0}")]
    Output(String),
    #[error("Error in the model fit: {0}")]
    ModelFit(#[from] ModelFitError),
}

impl AftImputeError {
    pub(crate) fn root_not_found(reason: impl Into<String>) -> Self {
        AftImputeError::RootNotFound {
            reason: reason.into(),
        }
    }

    /// Whether a fresh bootstrap draw may get past this error.
    pub fn is_redrawable(&self) -> bool {
        matches!(self, AftImputeError::RootNotFound { .. })
    }
}
