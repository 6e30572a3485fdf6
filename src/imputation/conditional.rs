//! Conditional distribution of a censored covariate.
//!
//! For a unit whose covariate is only known to exceed a bound `c`, the
//! conditional survival curve `F(t) = P(X > t | X > c, Y, Δ, Z)` is built on a
//! discrete grid: the bound itself followed by every distinct fully observed
//! covariate value above it. Each level `τ_k` is weighted by the outcome
//! likelihood `L_k` of the unit if its covariate were `τ_k`, and by the drop of
//! the auxiliary Cox survival curve `S_k` into that level. The unnormalized
//! tail mass at level `k` is
//!
//! ```text
//! G_k = L_k S_k + Σ_{j ≥ k} (L_{j+1} − L_j) S_j − L_m S_m
//!     = Σ_{j > k} L_j (S_{j−1} − S_j)
//! ```
//!
//! and the curve is `F(τ_k) = G_k / G_0`, linear between levels.

use crate::data::Observation;
use crate::error::AftImputeError;
use crate::fitting::{AftFit, CoxFit, OutcomeFamily, INTERCEPT};

/// Name of the censored covariate in the outcome model
pub const COVARIATE: &str = "x";
/// Name of the fully observed covariate in the outcome model
pub const ADJUSTMENT: &str = "z";

/// Piecewise-linear conditional survival curve of one censored covariate
///
/// `levels[0]` is the censoring bound, `values[0] = 1` and the last value is
/// `0`. Values never increase along the levels.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalSurvival {
    levels: Vec<f64>,
    values: Vec<f64>,
}

impl ConditionalSurvival {
    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// The censoring bound the curve starts at
    pub fn bound(&self) -> f64 {
        self.levels[0]
    }

    /// Largest level, where the curve reaches zero
    pub fn max_level(&self) -> f64 {
        self.levels[self.levels.len() - 1]
    }

    /// `F(t)`: 1 up to the bound, 0 from the largest level on, linear in between
    pub fn evaluate(&self, t: f64) -> f64 {
        if t <= self.bound() {
            return 1.0;
        }
        if t >= self.max_level() {
            return 0.0;
        }
        // First level strictly above t, at least 1 because t > levels[0]
        let upper = self.levels.partition_point(|&level| level <= t);
        let lower = upper - 1;
        let (t0, t1) = (self.levels[lower], self.levels[upper]);
        let (f0, f1) = (self.values[lower], self.values[upper]);
        f0 + (f1 - f0) * (t - t0) / (t1 - t0)
    }
}

/// Builds [ConditionalSurvival] curves from a pair of fitted models
///
/// The outcome model must carry the coefficients [INTERCEPT], [COVARIATE] and
/// [ADJUSTMENT]; the auxiliary model a single coefficient for `z`.
#[derive(Debug, Clone)]
pub struct ConditionalBuilder<'a> {
    levels: &'a [f64],
    family: OutcomeFamily,
    intercept: f64,
    beta_x: f64,
    beta_z: f64,
    sigma: f64,
    auxiliary: &'a CoxFit,
}

impl<'a> ConditionalBuilder<'a> {
    /// # Arguments
    ///
    /// * `levels` - Sorted distinct fully observed covariate values of the sample
    /// * `outcome` - Outcome model `Y, Δ ~ x + z`
    /// * `auxiliary` - Cox model of the covariate on `z`
    pub fn new(
        levels: &'a [f64],
        outcome: &AftFit,
        auxiliary: &'a CoxFit,
    ) -> Result<Self, AftImputeError> {
        if auxiliary.coefficients().len() != 1 {
            return Err(AftImputeError::Configuration(format!(
                "the auxiliary model must have one coefficient, found {}",
                auxiliary.coefficients().len()
            )));
        }
        Ok(Self {
            levels,
            family: outcome.family(),
            intercept: outcome.coefficient(INTERCEPT)?,
            beta_x: outcome.coefficient(COVARIATE)?,
            beta_z: outcome.coefficient(ADJUSTMENT)?,
            sigma: outcome.scale(),
            auxiliary,
        })
    }

    /// Outcome likelihood of `unit` with its covariate set to `level`
    fn likelihood(&self, unit: &Observation, level: f64) -> f64 {
        let eta = self.intercept + self.beta_x * level + self.beta_z * unit.z();
        if unit.delta() {
            self.family.density(unit.y(), eta, self.sigma)
        } else {
            self.family.survival(unit.y(), eta, self.sigma)
        }
    }

    /// Conditional survival curve for one unit with a censored covariate
    ///
    /// Fails with [AftImputeError::RootNotFound] when no observed level lies
    /// above the bound or the curve cannot be normalized.
    pub fn build(&self, unit: &Observation) -> Result<ConditionalSurvival, AftImputeError> {
        let bound = unit.x();
        let above = self.levels.partition_point(|&level| level <= bound);
        if above == self.levels.len() {
            return Err(AftImputeError::root_not_found(format!(
                "no observed covariate value above the bound {:.6}",
                bound
            )));
        }

        let mut levels = Vec::with_capacity(self.levels.len() - above + 1);
        levels.push(bound);
        levels.extend_from_slice(&self.levels[above..]);

        let survival: Vec<f64> = levels
            .iter()
            .map(|&level| self.auxiliary.survival(level, &[unit.z()]))
            .collect();
        let likelihood: Vec<f64> = levels
            .iter()
            .map(|&level| self.likelihood(unit, level))
            .collect();
        if likelihood.iter().chain(&survival).any(|v| !v.is_finite()) {
            return Err(AftImputeError::root_not_found(
                "non-finite likelihood in the conditional distribution",
            ));
        }

        // Reverse cumulative sum of L_j (S_{j-1} - S_j)
        let m = levels.len();
        let mut mass = vec![0.0; m];
        for j in (1..m).rev() {
            let drop = (survival[j - 1] - survival[j]).max(0.0);
            mass[j - 1] = mass[j] + likelihood[j] * drop;
        }

        let total = mass[0];
        if !(total.is_finite() && total > 0.0) {
            return Err(AftImputeError::root_not_found(format!(
                "conditional distribution cannot be normalized (mass {})",
                total
            )));
        }

        let values = mass.iter().map(|g| g / total).collect();
        Ok(ConditionalSurvival { levels, values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitting::{AftRegression, CoxRegression, Design};
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    // Deterministic sample with a covariate effect in both models
    fn fits() -> (Vec<f64>, AftFit, CoxFit) {
        let n = 60;
        let z: Vec<f64> = (0..n).map(|i| ((i * 7) % 11) as f64 / 5.0 - 1.0).collect();
        let x: Vec<f64> = (0..n)
            .map(|i| 1.0 + (i as f64) * 0.05 + 0.3 * z[i].abs())
            .collect();
        let v: Vec<bool> = (0..n).map(|i| i % 4 != 0).collect();
        let y: Vec<f64> = (0..n)
            .map(|i| (0.5 + 0.4 * x[i] + 0.6 * z[i] + ((i * 13) % 7) as f64 / 10.0 - 0.3).exp())
            .collect();
        let delta: Vec<bool> = (0..n).map(|i| i % 5 != 0).collect();

        let cc: Vec<usize> = (0..n).filter(|&i| v[i]).collect();
        let design = Design::with_intercept(&[
            (COVARIATE, cc.iter().map(|&i| x[i]).collect()),
            (ADJUSTMENT, cc.iter().map(|&i| z[i]).collect()),
        ])
        .unwrap();
        let outcome = AftRegression::new(OutcomeFamily::Weibull)
            .fit(
                &design,
                &cc.iter().map(|&i| y[i]).collect::<Vec<_>>(),
                &cc.iter().map(|&i| delta[i]).collect::<Vec<_>>(),
            )
            .unwrap();
        let auxiliary = CoxRegression::new()
            .fit(&x, &v, &DMatrix::from_column_slice(n, 1, &z))
            .unwrap();

        let mut levels: Vec<f64> = cc.iter().map(|&i| x[i]).collect();
        levels.sort_by(|a, b| a.total_cmp(b));
        levels.dedup();
        (levels, outcome, auxiliary)
    }

    #[test]
    fn curve_is_a_survival_function() {
        let (levels, outcome, auxiliary) = fits();
        let builder = ConditionalBuilder::new(&levels, &outcome, &auxiliary).unwrap();
        for delta in [true, false] {
            let unit = Observation::new(4.0, delta, 2.0, false, 0.3);
            let curve = builder.build(&unit).unwrap();
            assert_eq!(curve.bound(), 2.0);
            assert_relative_eq!(curve.evaluate(2.0), 1.0);
            assert_relative_eq!(curve.evaluate(curve.max_level()), 0.0);
            assert_eq!(curve.values()[0], 1.0);
            assert!(curve
                .values()
                .windows(2)
                .all(|pair| pair[1] <= pair[0]));

            let mut previous = 1.0;
            let mut t = 1.5;
            while t < curve.max_level() + 0.5 {
                let value = curve.evaluate(t);
                assert!(value <= previous + 1e-15);
                assert!((0.0..=1.0).contains(&value));
                previous = value;
                t += 0.01;
            }
        }
    }

    #[test]
    fn matches_gap_weighted_form() {
        let (levels, outcome, auxiliary) = fits();
        let builder = ConditionalBuilder::new(&levels, &outcome, &auxiliary).unwrap();
        let unit = Observation::new(3.0, true, 1.8, false, -0.2);
        let curve = builder.build(&unit).unwrap();

        let tau = curve.levels();
        let risk = auxiliary.linear_predictor(&[unit.z()]);
        let s: Vec<f64> = tau
            .iter()
            .map(|&t| (-auxiliary.baseline().cumulative_hazard(t) * risk.exp()).exp())
            .collect();
        let l: Vec<f64> = tau.iter().map(|&t| builder.likelihood(&unit, t)).collect();
        let m = tau.len() - 1;
        let g = |k: usize| {
            let slope: f64 = (k..m)
                .map(|j| (l[j + 1] - l[j]) / (tau[j + 1] - tau[j]) * s[j] * (tau[j + 1] - tau[j]))
                .sum();
            l[k] * s[k] + slope - l[m] * s[m]
        };
        let g0 = g(0);
        for k in 0..=m {
            assert_relative_eq!(curve.values()[k], g(k) / g0, epsilon = 1e-10);
        }
    }

    #[test]
    fn interpolates_between_levels() {
        let curve = ConditionalSurvival {
            levels: vec![1.0, 2.0, 4.0],
            values: vec![1.0, 0.5, 0.0],
        };
        assert_relative_eq!(curve.evaluate(0.2), 1.0);
        assert_relative_eq!(curve.evaluate(1.5), 0.75);
        assert_relative_eq!(curve.evaluate(3.0), 0.25);
        assert_relative_eq!(curve.evaluate(10.0), 0.0);
    }

    #[test]
    fn bound_above_every_level_fails() {
        let (levels, outcome, auxiliary) = fits();
        let builder = ConditionalBuilder::new(&levels, &outcome, &auxiliary).unwrap();
        let unit = Observation::new(2.0, true, levels[levels.len() - 1] + 1.0, false, 0.0);
        assert!(matches!(
            builder.build(&unit),
            Err(AftImputeError::RootNotFound { .. })
        ));
    }

    #[test]
    fn bound_at_largest_level_fails() {
        let (levels, outcome, auxiliary) = fits();
        let builder = ConditionalBuilder::new(&levels, &outcome, &auxiliary).unwrap();
        let unit = Observation::new(2.0, false, levels[levels.len() - 1], false, 0.0);
        let err = builder.build(&unit).unwrap_err();
        assert!(err.is_redrawable());
    }

    #[test]
    fn zero_mass_is_not_normalized() {
        let (levels, outcome, auxiliary) = fits();
        let builder = ConditionalBuilder::new(&levels, &outcome, &auxiliary).unwrap();
        // An event this late has zero density at every level
        let unit = Observation::new(1e300, true, levels[0], false, 0.0);
        match builder.build(&unit) {
            Err(AftImputeError::RootNotFound { reason }) => {
                assert!(reason.contains("cannot be normalized"), "{}", reason)
            }
            other => panic!("expected a normalization failure, got {:?}", other),
        }
    }
}
