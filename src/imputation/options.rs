use serde::{Deserialize, Serialize};

use crate::error::AftImputeError;
use crate::fitting::OutcomeFamily;

/// Configuration of the multiple-imputation estimator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImputationOptions {
    /// Number of imputations M (default: 5)
    pub replicates: usize,

    /// Search interval for inverting the conditional distribution
    ///
    /// `None` uses `(0, 1 + max candidate level)` of the bootstrap sample.
    pub root_bracket: Option<(f64, f64)>,

    /// Family of the outcome model, shared with the complete-case fit
    /// (default: Weibull)
    pub outcome_family: OutcomeFamily,

    /// Iteration cap for the root solver; reaching it is a root-finding
    /// failure (default: 100)
    pub max_root_iters: u64,

    /// Absolute tolerance of the root solver (default: 1e-10)
    pub root_tolerance: f64,

    /// Bootstrap redraws allowed per imputation after a root-finding failure
    /// (default: 0, every failure is returned to the caller)
    pub max_redraws: usize,
}

impl Default for ImputationOptions {
    fn default() -> Self {
        Self {
            replicates: 5,
            root_bracket: None,
            outcome_family: OutcomeFamily::Weibull,
            max_root_iters: 100,
            root_tolerance: 1e-10,
            max_redraws: 0,
        }
    }
}

impl ImputationOptions {
    pub fn with_replicates(mut self, replicates: usize) -> Self {
        self.replicates = replicates;
        self
    }

    pub fn with_root_bracket(mut self, lower: f64, upper: f64) -> Self {
        self.root_bracket = Some((lower, upper));
        self
    }

    pub fn with_outcome_family(mut self, family: OutcomeFamily) -> Self {
        self.outcome_family = family;
        self
    }

    pub fn with_max_root_iters(mut self, iterations: u64) -> Self {
        self.max_root_iters = iterations;
        self
    }

    pub fn with_root_tolerance(mut self, tolerance: f64) -> Self {
        self.root_tolerance = tolerance;
        self
    }

    pub fn with_max_redraws(mut self, redraws: usize) -> Self {
        self.max_redraws = redraws;
        self
    }

    /// Reject options no run could use
    ///
    /// A replicate count of one is accepted here and rejected by the pooling
    /// step, which is where Rubin's rules need the second imputation.
    pub fn validate(&self) -> Result<(), AftImputeError> {
        if self.replicates == 0 {
            return Err(AftImputeError::Configuration(
                "the number of imputations must be positive".to_string(),
            ));
        }
        if let Some((lower, upper)) = self.root_bracket {
            if !(lower.is_finite() && upper.is_finite() && lower < upper) {
                return Err(AftImputeError::Configuration(format!(
                    "root bracket ({}, {}) is not a finite increasing interval",
                    lower, upper
                )));
            }
        }
        if self.max_root_iters == 0 {
            return Err(AftImputeError::Configuration(
                "the root solver needs at least one iteration".to_string(),
            ));
        }
        if !(self.root_tolerance.is_finite() && self.root_tolerance > 0.0) {
            return Err(AftImputeError::Configuration(format!(
                "root tolerance must be positive, got {}",
                self.root_tolerance
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let options = ImputationOptions::default();
        assert_eq!(options.replicates, 5);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_bracket() {
        let options = ImputationOptions::default().with_root_bracket(3.0, 1.0);
        assert!(matches!(
            options.validate(),
            Err(AftImputeError::Configuration(_))
        ));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let options: ImputationOptions =
            serde_json::from_str(r#"{ "replicates": 10, "outcome_family": "LogNormal" }"#).unwrap();
        assert_eq!(options.replicates, 10);
        assert_eq!(options.outcome_family, OutcomeFamily::LogNormal);
        assert_eq!(options.max_root_iters, 100);
    }
}
