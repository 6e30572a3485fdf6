//! Cox proportional hazards regression with a Breslow baseline hazard.
//!
//! Used as the auxiliary model for the censored covariate: the covariate
//! plays the role of the "time", its observed indicator the role of the
//! event, and the fully observed covariates the role of predictors.

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use super::error::ModelFitError;

const MODEL: &str = "Cox";
const MAX_ITER: usize = 100;
const TOL: f64 = 1e-9;

/// Breslow estimate of the baseline cumulative hazard
///
/// A non-decreasing, right-continuous step function that jumps at every
/// distinct event time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineHazard {
    times: Vec<f64>,
    cumulative: Vec<f64>,
}

impl BaselineHazard {
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.cumulative
    }

    /// `H0(t)`: zero before the first jump, constant after the last one
    pub fn cumulative_hazard(&self, t: f64) -> f64 {
        let jumps = self.times.partition_point(|&s| s <= t);
        if jumps == 0 {
            0.0
        } else {
            self.cumulative[jumps - 1]
        }
    }

    /// `exp(-H0(t) * exp(lp))`
    pub fn survival(&self, t: f64, linear_predictor: f64) -> f64 {
        (-self.cumulative_hazard(t) * linear_predictor.exp()).exp()
    }
}

/// Fitted auxiliary model
#[derive(Debug, Clone, Serialize)]
pub struct CoxFit {
    coefficients: Vec<f64>,
    #[serde(skip)]
    covariance: DMatrix<f64>,
    baseline: BaselineHazard,
    log_partial_likelihood: f64,
    iterations: usize,
}

impl CoxFit {
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    pub fn baseline(&self) -> &BaselineHazard {
        &self.baseline
    }

    pub fn log_partial_likelihood(&self) -> f64 {
        self.log_partial_likelihood
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn linear_predictor(&self, covariates: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(covariates)
            .map(|(b, z)| b * z)
            .sum()
    }

    /// Survival probability at `t` for a unit with the given covariates
    pub fn survival(&self, t: f64, covariates: &[f64]) -> f64 {
        self.baseline
            .survival(t, self.linear_predictor(covariates))
    }
}

/// Newton-Raphson fitter for the Breslow partial likelihood
#[derive(Debug, Clone, Copy)]
pub struct CoxRegression {
    max_iter: usize,
}

impl Default for CoxRegression {
    fn default() -> Self {
        Self { max_iter: MAX_ITER }
    }
}

impl CoxRegression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Fit a Cox model
    ///
    /// # Arguments
    ///
    /// * `times` - Observed times (the covariate or its censoring bound)
    /// * `events` - `true` where the time is fully observed
    /// * `covariates` - One row per unit, one column per predictor
    pub fn fit(
        &self,
        times: &[f64],
        events: &[bool],
        covariates: &DMatrix<f64>,
    ) -> Result<CoxFit, ModelFitError> {
        let risk = RiskSets::new(times, events, covariates)?;
        let q = covariates.ncols();

        let mut beta = DVector::zeros(q);
        let mut current = risk.partial_likelihood(&beta);
        let mut converged = false;
        let mut iterations = 0;

        for iter in 0..self.max_iter {
            iterations = iter + 1;
            let delta = current
                .information
                .clone()
                .lu()
                .solve(&current.score)
                .ok_or(ModelFitError::Singular { model: MODEL })?;

            if delta.amax() < TOL {
                converged = true;
                break;
            }

            // Step-halving: the partial likelihood must not decrease
            let mut step = 1.0;
            let (candidate, next) = loop {
                let candidate = &beta + &delta * step;
                let next = risk.partial_likelihood(&candidate);
                if (next.ll.is_finite() && next.ll >= current.ll - 1e-10) || step < 1e-4 {
                    break (candidate, next);
                }
                step *= 0.5;
            };
            beta = candidate;
            current = next;
            tracing::trace!(iteration = iterations, ll = current.ll, "Cox Newton step");
        }

        if !converged {
            return Err(ModelFitError::NotConverged {
                model: MODEL,
                iterations,
            });
        }

        let covariance = current
            .information
            .clone()
            .try_inverse()
            .ok_or(ModelFitError::Singular { model: MODEL })?;

        Ok(CoxFit {
            coefficients: beta.iter().copied().collect(),
            covariance,
            baseline: risk.breslow(&beta),
            log_partial_likelihood: current.ll,
            iterations,
        })
    }
}

struct PartialLikelihood {
    ll: f64,
    score: DVector<f64>,
    information: DMatrix<f64>,
}

/// Units ordered by time with event times grouped for tie handling
struct RiskSets<'a> {
    times: &'a [f64],
    covariates: &'a DMatrix<f64>,
    /// Unit indices sorted by ascending time
    order: Vec<usize>,
    /// Distinct event times, ascending, with the units that fail there
    event_times: Vec<(f64, Vec<usize>)>,
}

impl<'a> RiskSets<'a> {
    fn new(
        times: &'a [f64],
        events: &[bool],
        covariates: &'a DMatrix<f64>,
    ) -> Result<Self, ModelFitError> {
        let n = times.len();
        if n == 0 {
            return Err(ModelFitError::Empty);
        }
        if events.len() != n || covariates.nrows() != n {
            return Err(ModelFitError::InvalidInput(format!(
                "{} times, {} event indicators and {} covariate rows",
                n,
                events.len(),
                covariates.nrows()
            )));
        }
        if covariates.ncols() == 0 {
            return Err(ModelFitError::InvalidInput(
                "a Cox model needs at least one covariate".to_string(),
            ));
        }
        if times.iter().any(|t| !t.is_finite()) || covariates.iter().any(|z| !z.is_finite()) {
            return Err(ModelFitError::InvalidInput(
                "times and covariates must be finite".to_string(),
            ));
        }
        if !events.iter().any(|&d| d) {
            return Err(ModelFitError::NoEvents);
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| times[a].total_cmp(&times[b]));

        let mut event_times: Vec<(f64, Vec<usize>)> = Vec::new();
        for &i in order.iter().filter(|&&i| events[i]) {
            if let Some((t, units)) = event_times.last_mut() {
                if *t == times[i] {
                    units.push(i);
                    continue;
                }
            }
            event_times.push((times[i], vec![i]));
        }

        Ok(Self {
            times,
            covariates,
            order,
            event_times,
        })
    }

    fn row_dot(&self, i: usize, beta: &DVector<f64>) -> f64 {
        (0..beta.len()).map(|j| self.covariates[(i, j)] * beta[j]).sum()
    }

    /// Breslow partial log-likelihood, score and information at `beta`
    fn partial_likelihood(&self, beta: &DVector<f64>) -> PartialLikelihood {
        let q = beta.len();
        let mut ll = 0.0;
        let mut score = DVector::zeros(q);
        let mut information = DMatrix::zeros(q, q);

        let mut s0 = 0.0;
        let mut s1 = DVector::<f64>::zeros(q);
        let mut s2 = DMatrix::<f64>::zeros(q, q);
        let mut right = self.order.len();

        for (t, failures) in self.event_times.iter().rev() {
            // Everyone with time >= t joins the risk set
            while right > 0 && self.times[self.order[right - 1]] >= *t {
                right -= 1;
                let unit = self.order[right];
                let w = self.row_dot(unit, beta).exp();
                let z = self.covariates.row(unit).transpose();
                s0 += w;
                s1 += &z * w;
                s2 += &z * z.transpose() * w;
            }
            if s0 <= 0.0 {
                continue;
            }

            let d = failures.len() as f64;
            for &unit in failures {
                ll += self.row_dot(unit, beta);
                score += self.covariates.row(unit).transpose();
            }
            ll -= d * s0.ln();
            let mean = &s1 / s0;
            score -= &mean * d;
            information += (&s2 / s0 - &mean * mean.transpose()) * d;
        }

        PartialLikelihood {
            ll,
            score,
            information,
        }
    }

    /// Uncentred Breslow cumulative hazard at the fitted coefficients
    fn breslow(&self, beta: &DVector<f64>) -> BaselineHazard {
        let weights: Vec<f64> = (0..self.times.len())
            .map(|i| self.row_dot(i, beta).exp())
            .collect();

        let mut times = Vec::with_capacity(self.event_times.len());
        let mut cumulative = Vec::with_capacity(self.event_times.len());
        let mut at_risk: f64 = weights.iter().sum();
        let mut next = 0;
        let mut total = 0.0;
        for (t, failures) in &self.event_times {
            // Drop everyone who left before t
            while next < self.order.len() && self.times[self.order[next]] < *t {
                at_risk -= weights[self.order[next]];
                next += 1;
            }
            total += failures.len() as f64 / at_risk;
            times.push(*t);
            cumulative.push(total);
        }

        BaselineHazard { times, cumulative }
    }
}
