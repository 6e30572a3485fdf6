//! The competing estimators of the outcome model coefficients.
//!
//! Complete-case analysis, mean substitution and the missing-indicator method
//! are single fits of the outcome model. Multiple imputation delegates to
//! [crate::imputation::MultipleImputation].

use super::results::ResultRow;
use super::streams::StreamBank;
use crate::data::Dataset;
use crate::error::AftImputeError;
use crate::fitting::{AftRegression, Design, OutcomeFamily};
use crate::imputation::conditional::{ADJUSTMENT, COVARIATE};
use crate::imputation::engine::fit_outcome;
use crate::imputation::{ImputationOptions, MultipleImputation, ReplicateEstimate};

/// Name of the missingness indicator column of [MissingIndicator]
pub const INDICATOR: &str = "missing";

/// An estimator of `(b1, b2)` and their variances from one dataset
pub trait Estimator: Send + Sync {
    /// Label of the method in the result table
    fn name(&self) -> &'static str;

    /// Estimate both coefficients; `streams` is only drawn from by estimators
    /// that need randomness
    fn estimate(&self, data: &Dataset, streams: &StreamBank) -> Result<ResultRow, AftImputeError>;
}

/// Outcome model fitted on the units with an observed covariate
#[derive(Debug, Clone, Copy, Default)]
pub struct CompleteCase {
    pub family: OutcomeFamily,
}

impl Estimator for CompleteCase {
    fn name(&self) -> &'static str {
        "complete-case"
    }

    fn estimate(&self, data: &Dataset, _: &StreamBank) -> Result<ResultRow, AftImputeError> {
        let complete = data.complete_cases();
        let fit = fit_outcome(self.family, complete.iter().map(|&o| (o, o.x())))?;
        Ok(ResultRow::from_fit(
            self.name(),
            &ReplicateEstimate::from_fit(&fit)?,
        ))
    }
}

/// Censored covariates replaced by the mean of the observed ones
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanSubstitution {
    pub family: OutcomeFamily,
}

impl MeanSubstitution {
    /// The dataset with every censored covariate set to the observed mean
    pub fn substitute(data: &Dataset) -> Result<Dataset, AftImputeError> {
        let mean = data.observed_covariate_mean().ok_or_else(|| {
            AftImputeError::InvalidData("no observed covariate to average".to_string())
        })?;
        Ok(data.with_censored_replaced(mean))
    }
}

impl Estimator for MeanSubstitution {
    fn name(&self) -> &'static str {
        "mean-substitution"
    }

    fn estimate(&self, data: &Dataset, _: &StreamBank) -> Result<ResultRow, AftImputeError> {
        let substituted = Self::substitute(data)?;
        let fit = fit_outcome(self.family, substituted.iter().map(|o| (o, o.x())))?;
        Ok(ResultRow::from_fit(
            self.name(),
            &ReplicateEstimate::from_fit(&fit)?,
        ))
    }
}

/// Recorded covariate (value or bound) plus an indicator of censoring
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingIndicator {
    pub family: OutcomeFamily,
}

impl Estimator for MissingIndicator {
    fn name(&self) -> &'static str {
        "missing-indicator"
    }

    fn estimate(&self, data: &Dataset, _: &StreamBank) -> Result<ResultRow, AftImputeError> {
        let design = Design::with_intercept(&[
            (COVARIATE, data.iter().map(|o| o.x()).collect()),
            (ADJUSTMENT, data.iter().map(|o| o.z()).collect()),
            (
                INDICATOR,
                data.iter().map(|o| f64::from(u8::from(o.is_censored()))).collect(),
            ),
        ])?;
        let times: Vec<f64> = data.iter().map(|o| o.y()).collect();
        let events: Vec<bool> = data.iter().map(|o| o.delta()).collect();
        let fit = AftRegression::new(self.family).fit(&design, &times, &events)?;
        Ok(ResultRow::from_fit(
            self.name(),
            &ReplicateEstimate::from_fit(&fit)?,
        ))
    }
}

impl Estimator for MultipleImputation {
    fn name(&self) -> &'static str {
        "multiple-imputation"
    }

    fn estimate(&self, data: &Dataset, streams: &StreamBank) -> Result<ResultRow, AftImputeError> {
        let pooled = self.run(data, streams)?;
        tracing::debug!(
            "Pooled {} imputations, missing information {:.3} / {:.3}",
            pooled.replicates,
            pooled.b1.missing_information,
            pooled.b2.missing_information
        );
        Ok(ResultRow::from_pooled(self.name(), &pooled))
    }
}

/// The four methods in table order, sharing the outcome family of `options`
pub fn all_estimators(options: &ImputationOptions) -> Vec<Box<dyn Estimator>> {
    let family = options.outcome_family;
    vec![
        Box::new(CompleteCase { family }),
        Box::new(MeanSubstitution { family }),
        Box::new(MissingIndicator { family }),
        Box::new(MultipleImputation::new(options.clone())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DatasetBuilderExt;

    fn data() -> Dataset {
        let mut builder = Dataset::builder();
        for i in 0..40 {
            let x = 1.0 + (i % 10) as f64 * 0.3;
            let z = ((i * 7) % 9) as f64 / 4.0 - 1.0;
            let y = (1.0 + 0.7 * x + z + 0.2 * ((i % 5) as f64 - 2.0)).exp();
            if i % 4 == 0 {
                builder = builder.censored(y, i % 6 != 0, x * 0.7, z);
            } else {
                builder = builder.observed(y, i % 6 != 0, x, z);
            }
        }
        builder.build().unwrap()
    }

    #[test]
    fn mean_substitution_keeps_the_indicator() {
        let data = data();
        let substituted = MeanSubstitution::substitute(&data).unwrap();
        let mean = data.observed_covariate_mean().unwrap();
        for (before, after) in data.iter().zip(substituted.iter()) {
            assert_eq!(before.v(), after.v());
            if before.v() {
                assert_eq!(before.x(), after.x());
            } else {
                assert_eq!(after.x(), mean);
            }
        }
        assert_eq!(
            substituted.n_censored_covariates(),
            data.n_censored_covariates()
        );
    }

    #[test]
    fn missing_indicator_reports_covariate_coefficients() {
        let row = MissingIndicator::default()
            .estimate(&data(), &StreamBank::new(1))
            .unwrap();
        assert_eq!(row.method, "missing-indicator");
        assert!(row.b1.is_finite() && row.var_b1 > 0.0);
        assert!(row.b2.is_finite() && row.var_b2 > 0.0);
    }

    #[test]
    fn complete_case_ignores_censored_units() {
        let data = data();
        let complete = Dataset::new(data.complete_cases().into_iter().cloned().collect()).unwrap();
        let streams = StreamBank::new(1);
        let a = CompleteCase::default().estimate(&data, &streams).unwrap();
        let b = CompleteCase::default().estimate(&complete, &streams).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn table_order() {
        let names: Vec<&str> = all_estimators(&ImputationOptions::default())
            .iter()
            .map(|e| e.name())
            .collect();
        assert_eq!(
            names,
            [
                "complete-case",
                "mean-substitution",
                "missing-indicator",
                "multiple-imputation"
            ]
        );
    }
}
