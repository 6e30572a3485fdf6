//! Rubin's rules and the multiple-imputation fan-out.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::engine::{run_replicate, ReplicateEstimate};
use super::options::ImputationOptions;
use crate::data::{sample_variance, Dataset};
use crate::error::AftImputeError;
use crate::simulator::streams::{Slot, StreamBank};

/// One coefficient pooled over the imputations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PooledCoefficient {
    /// Mean of the per-imputation estimates
    pub estimate: f64,
    /// Total variance `W + (1 + 1/M) B`
    pub variance: f64,
    /// Mean within-imputation variance `W`
    pub within: f64,
    /// Between-imputation variance `B` (sample variance of the estimates)
    pub between: f64,
    /// Degrees of freedom of the reference t distribution, infinite when `B = 0`
    pub degrees_of_freedom: f64,
    /// Fraction of missing information `(1 + 1/M) B / T`
    pub missing_information: f64,
}

impl PooledCoefficient {
    fn combine(estimates: &[f64], variances: &[f64]) -> Self {
        let m = estimates.len() as f64;
        let estimate = estimates.iter().sum::<f64>() / m;
        let within = variances.iter().sum::<f64>() / m;
        let between = sample_variance(estimates).unwrap_or(0.0);
        let inflated = (1.0 + 1.0 / m) * between;
        let variance = within + inflated;

        let degrees_of_freedom = if inflated > 0.0 {
            (m - 1.0) * (1.0 + within / inflated).powi(2)
        } else {
            f64::INFINITY
        };
        let missing_information = if variance > 0.0 {
            inflated / variance
        } else {
            0.0
        };

        Self {
            estimate,
            variance,
            within,
            between,
            degrees_of_freedom,
            missing_information,
        }
    }
}

/// Pooled multiple-imputation estimate of both coefficients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PooledEstimate {
    pub b1: PooledCoefficient,
    pub b2: PooledCoefficient,
    pub replicates: usize,
}

/// Combine per-imputation estimates with Rubin's rules
///
/// Fails with [AftImputeError::InsufficientReplicates] for fewer than two
/// replicates, where the between-imputation variance is undefined.
pub fn pool(replicates: &[ReplicateEstimate]) -> Result<PooledEstimate, AftImputeError> {
    if replicates.len() < 2 {
        return Err(AftImputeError::InsufficientReplicates {
            replicates: replicates.len(),
        });
    }
    let column = |f: fn(&ReplicateEstimate) -> f64| replicates.iter().map(f).collect::<Vec<_>>();
    Ok(PooledEstimate {
        b1: PooledCoefficient::combine(&column(|r| r.b1), &column(|r| r.var_b1)),
        b2: PooledCoefficient::combine(&column(|r| r.b2), &column(|r| r.var_b2)),
        replicates: replicates.len(),
    })
}

/// Multiple imputation of a censored covariate
///
/// Runs the configured number of imputation replicates in parallel, each on
/// its own sub-stream, and pools them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultipleImputation {
    options: ImputationOptions,
}

impl MultipleImputation {
    pub fn new(options: ImputationOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ImputationOptions {
        &self.options
    }

    /// Impute, refit and pool
    ///
    /// Replicate `m` always uses the sub-stream of [Slot::Imputation]`(m)`, so
    /// the result does not depend on how rayon schedules the work. The first
    /// failing replicate (in replicate order) aborts the estimate.
    pub fn run(
        &self,
        data: &Dataset,
        streams: &StreamBank,
    ) -> Result<PooledEstimate, AftImputeError> {
        self.options.validate()?;
        if self.options.replicates < 2 {
            return Err(AftImputeError::InsufficientReplicates {
                replicates: self.options.replicates,
            });
        }

        let results: Vec<Result<ReplicateEstimate, AftImputeError>> = (0..self.options.replicates)
            .into_par_iter()
            .map(|m| self.replicate(data, streams, m))
            .collect();
        let replicates = results.into_iter().collect::<Result<Vec<_>, _>>()?;
        pool(&replicates)
    }

    /// One replicate, redrawing the bootstrap after a root-finding failure
    fn replicate(
        &self,
        data: &Dataset,
        streams: &StreamBank,
        m: usize,
    ) -> Result<ReplicateEstimate, AftImputeError> {
        let mut rng = streams.stream(Slot::Imputation(m));
        let mut redraws = 0;
        loop {
            match run_replicate(data, &self.options, &mut rng) {
                Err(e) if e.is_redrawable() && redraws < self.options.max_redraws => {
                    redraws += 1;
                    tracing::warn!(
                        "Imputation {} failed ({}), redrawing the bootstrap ({}/{})",
                        m,
                        e,
                        redraws,
                        self.options.max_redraws
                    );
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn replicate(b1: f64, b2: f64, var_b1: f64, var_b2: f64) -> ReplicateEstimate {
        ReplicateEstimate {
            b1,
            b2,
            var_b1,
            var_b2,
        }
    }

    #[test]
    fn pooled_coefficient_is_the_mean() {
        let pooled = pool(&[
            replicate(1.0, 0.5, 0.1, 0.2),
            replicate(1.2, 0.5, 0.1, 0.2),
            replicate(0.8, 0.5, 0.1, 0.2),
        ])
        .unwrap();
        assert_relative_eq!(pooled.b1.estimate, 1.0, epsilon = 1e-12);
        assert_relative_eq!(pooled.b1.between, 0.04, epsilon = 1e-12);
        // 0.1 + (1 + 1/3) * 0.04
        assert_relative_eq!(pooled.b1.variance, 0.1 + 4.0 / 3.0 * 0.04, epsilon = 1e-12);
        assert_eq!(pooled.replicates, 3);
    }

    #[test]
    fn identical_replicates_pool_to_within_variance() {
        let pooled = pool(&[replicate(0.75, 1.0, 0.25, 0.125); 4]).unwrap();
        assert_eq!(pooled.b1.variance, 0.25);
        assert_eq!(pooled.b2.variance, 0.125);
        assert_eq!(pooled.b1.between, 0.0);
        assert!(pooled.b1.degrees_of_freedom.is_infinite());
        assert_eq!(pooled.b1.missing_information, 0.0);
    }

    #[test]
    fn degrees_of_freedom_follow_rubin() {
        let pooled = pool(&[
            replicate(1.0, 0.0, 0.05, 0.1),
            replicate(1.2, 0.0, 0.05, 0.1),
            replicate(0.8, 0.0, 0.05, 0.1),
        ])
        .unwrap();
        let inflated: f64 = 4.0 / 3.0 * 0.04;
        let expected = 2.0 * (1.0 + 0.05 / inflated).powi(2);
        assert_relative_eq!(pooled.b1.degrees_of_freedom, expected, epsilon = 1e-10);
        assert_relative_eq!(
            pooled.b1.missing_information,
            inflated / (0.05 + inflated),
            epsilon = 1e-12
        );
    }

    #[test]
    fn single_replicate_is_rejected() {
        assert_eq!(
            pool(&[replicate(1.0, 1.0, 0.1, 0.1)]),
            Err(AftImputeError::InsufficientReplicates { replicates: 1 })
        );
        assert!(matches!(
            pool(&[]),
            Err(AftImputeError::InsufficientReplicates { replicates: 0 })
        ));
    }

    #[test]
    fn run_rejects_one_imputation() {
        let data = Dataset::new(vec![crate::data::Observation::new(1.0, true, 1.0, true, 0.0)])
            .unwrap();
        let mi = MultipleImputation::new(ImputationOptions::default().with_replicates(1));
        assert!(matches!(
            mi.run(&data, &StreamBank::new(1)),
            Err(AftImputeError::InsufficientReplicates { replicates: 1 })
        ));
    }

    // Observed covariates in [0.5, 2.5); `stranded` censored units sit above all
    // of them, the rest below
    fn stranded(n: usize, stranded: usize) -> Dataset {
        use crate::data::DatasetBuilderExt;
        let mut builder = Dataset::builder();
        for i in 0..n {
            let x = 0.5 + (i % 20) as f64 * 0.1;
            let z = ((i * 7) % 11) as f64 / 5.0 - 1.0;
            let y = (1.0 + 0.7 * x + z + ((i * 13) % 7) as f64 / 10.0 - 0.3).exp();
            if i < stranded {
                builder = builder.censored(y, true, 5.0, z);
            } else if i % 4 == 0 {
                builder = builder.censored(y, true, x * 0.5, z);
            } else {
                builder = builder.observed(y, i % 5 != 0, x, z);
            }
        }
        builder.build().unwrap()
    }

    #[test]
    fn strict_policy_surfaces_root_failures() {
        let data = stranded(60, 20);
        let mi = MultipleImputation::new(ImputationOptions::default().with_replicates(2));
        assert_eq!(mi.options().max_redraws, 0);
        let err = mi.run(&data, &StreamBank::new(9)).unwrap_err();
        assert!(matches!(err, AftImputeError::RootNotFound { .. }), "{}", err);
    }

    #[test]
    fn redraws_recover_from_root_failures() {
        // One stranded unit is left out of roughly a third of all bootstraps
        let data = stranded(60, 1);
        let options = ImputationOptions::default()
            .with_replicates(3)
            .with_max_redraws(50);
        let pooled = MultipleImputation::new(options)
            .run(&data, &StreamBank::new(9))
            .unwrap();
        assert_eq!(pooled.replicates, 3);
        assert!(pooled.b1.estimate.is_finite() && pooled.b1.variance > 0.0);
    }
}
