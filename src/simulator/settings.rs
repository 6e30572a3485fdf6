use serde::{Deserialize, Serialize};

use crate::error::AftImputeError;
use crate::fitting::OutcomeFamily;
use crate::imputation::ImputationOptions;

/// Weibull shape of the covariate censoring time
pub const CENSORING_SHAPE: f64 = 0.5;

// Censoring rate giving P(X > C) = p under the default covariate model
const CENSORING_RATES: [(f64, f64); 3] = [
    (0.2, 0.17016010022883388),
    (0.4, 0.3914194239050024),
    (0.6, 0.7095346163581567),
];

/// Rate of the covariate censoring time for a supported censoring proportion
///
/// Only 0.2, 0.4 and 0.6 are calibrated; anything else is a
/// [AftImputeError::Configuration] error.
pub fn censoring_rate(proportion: f64) -> Result<f64, AftImputeError> {
    CENSORING_RATES
        .iter()
        .find(|(p, _)| (p - proportion).abs() < 1e-9)
        .map(|&(_, rate)| rate)
        .ok_or_else(|| {
            AftImputeError::Configuration(format!(
                "unsupported covariate censoring proportion {}, expected one of 0.2, 0.4, 0.6",
                proportion
            ))
        })
}

/// Proportional hazards Weibull model of the censored covariate
///
/// `X = (E / (rate · exp(gamma · Z)))^(1 / shape)` with `E ~ Exp(1)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CovariateModel {
    pub shape: f64,
    pub rate: f64,
    pub gamma: f64,
}

impl Default for CovariateModel {
    fn default() -> Self {
        Self {
            shape: 3.0,
            rate: 0.125,
            gamma: 0.5,
        }
    }
}

/// Settings of one simulation replicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Master seed of every random stream in the run
    pub seed: u64,
    /// Number of units (default: 200)
    pub n: usize,
    /// Target proportion of censored covariates, one of 0.2, 0.4, 0.6
    pub censoring_proportion: f64,
    /// Error family of the data-generating and fitted outcome models
    pub outcome_family: OutcomeFamily,
    /// True `(β0, β1, β2)` of `log T = β0 + β1 X + β2 Z + σ W`
    pub coefficients: [f64; 3],
    /// True scale `σ`
    pub scale: f64,
    pub covariate: CovariateModel,
    /// Rate of the exponential outcome censoring time
    pub outcome_censoring_rate: f64,
    pub imputation: ImputationOptions,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            seed: 24601,
            n: 200,
            censoring_proportion: 0.4,
            outcome_family: OutcomeFamily::Weibull,
            coefficients: [1.0, 0.7, 1.0],
            scale: 0.5,
            covariate: CovariateModel::default(),
            outcome_censoring_rate: 0.01,
            imputation: ImputationOptions::default().with_max_redraws(20),
        }
    }
}

impl SimulationSettings {
    /// Parse settings from JSON, missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, AftImputeError> {
        let settings: SimulationSettings = serde_json::from_str(json)
            .map_err(|e| AftImputeError::Configuration(format!("invalid settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_n(mut self, n: usize) -> Self {
        self.n = n;
        self
    }

    pub fn with_censoring_proportion(mut self, proportion: f64) -> Self {
        self.censoring_proportion = proportion;
        self
    }

    /// Sets the family of both the simulated outcome and every fitted model
    pub fn with_outcome_family(mut self, family: OutcomeFamily) -> Self {
        self.outcome_family = family;
        self.imputation.outcome_family = family;
        self
    }

    pub fn with_coefficients(mut self, b0: f64, b1: f64, b2: f64) -> Self {
        self.coefficients = [b0, b1, b2];
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_outcome_censoring_rate(mut self, rate: f64) -> Self {
        self.outcome_censoring_rate = rate;
        self
    }

    pub fn with_imputation(mut self, imputation: ImputationOptions) -> Self {
        self.imputation = imputation;
        self
    }

    /// Rate of the covariate censoring time for the configured proportion
    pub fn censoring_rate(&self) -> Result<f64, AftImputeError> {
        censoring_rate(self.censoring_proportion)
    }

    pub fn validate(&self) -> Result<(), AftImputeError> {
        self.censoring_rate()?;
        if self.n < 2 {
            return Err(AftImputeError::Configuration(format!(
                "a replicate needs at least two units, got {}",
                self.n
            )));
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(AftImputeError::Configuration(format!(
                "outcome scale must be positive, got {}",
                self.scale
            )));
        }
        if !(self.outcome_censoring_rate.is_finite() && self.outcome_censoring_rate > 0.0) {
            return Err(AftImputeError::Configuration(format!(
                "outcome censoring rate must be positive, got {}",
                self.outcome_censoring_rate
            )));
        }
        let covariate = &self.covariate;
        if [covariate.shape, covariate.rate]
            .iter()
            .any(|v| !(v.is_finite() && *v > 0.0))
            || !covariate.gamma.is_finite()
        {
            return Err(AftImputeError::Configuration(
                "covariate model needs a positive shape and rate and a finite gamma".to_string(),
            ));
        }
        if self.imputation.outcome_family != self.outcome_family {
            tracing::warn!(
                "Outcome simulated as {} but imputed with a {} model",
                self.outcome_family,
                self.imputation.outcome_family
            );
        }
        self.imputation.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_proportions() {
        assert_eq!(censoring_rate(0.4).unwrap(), 0.3914194239050024);
        assert!(censoring_rate(0.2).is_ok());
        assert!(censoring_rate(0.6).is_ok());
    }

    #[test]
    fn unsupported_proportion_is_a_configuration_error() {
        assert!(matches!(
            censoring_rate(0.3),
            Err(AftImputeError::Configuration(_))
        ));
        let settings = SimulationSettings::default().with_censoring_proportion(0.5);
        assert!(matches!(
            settings.validate(),
            Err(AftImputeError::Configuration(_))
        ));
    }

    #[test]
    fn json_overrides_defaults() {
        let settings = SimulationSettings::from_json(
            r#"{ "seed": 7, "censoring_proportion": 0.2, "imputation": { "replicates": 10 } }"#,
        )
        .unwrap();
        assert_eq!(settings.seed, 7);
        assert_eq!(settings.n, 200);
        assert_eq!(settings.imputation.replicates, 10);
        assert_eq!(settings.coefficients, [1.0, 0.7, 1.0]);
    }

    #[test]
    fn malformed_json_is_a_configuration_error() {
        assert!(matches!(
            SimulationSettings::from_json("{ seed: }"),
            Err(AftImputeError::Configuration(_))
        ));
    }
}
