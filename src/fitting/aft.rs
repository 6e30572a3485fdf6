//! Accelerated failure time regression by maximum likelihood.
//!
//! Model: `log T = x'β + σ W`, with `W` drawn from an [OutcomeFamily].
//! Parameters are estimated on `(β, log σ)` by Newton-Raphson using the
//! analytic score and observed information, with step-halving whenever the
//! log-likelihood fails to improve. The covariance matrix is the inverse of
//! the observed information at the optimum.

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use super::distributions::OutcomeFamily;
use super::error::ModelFitError;

const MODEL: &str = "AFT";
const MAX_ITER: usize = 100;
const STEP_TOL: f64 = 1e-8;
const LL_TOL: f64 = 1e-10;
const MIN_STEP: f64 = 1e-6;
const SCORE_TOL: f64 = 1e-4;

pub const INTERCEPT: &str = "(Intercept)";

/// A named design matrix, one row per unit
#[derive(Debug, Clone, PartialEq)]
pub struct Design {
    names: Vec<String>,
    matrix: DMatrix<f64>,
}

impl Design {
    /// Build a design with a leading intercept column
    ///
    /// # Arguments
    ///
    /// * `columns` - `(name, values)` pairs, all of the same length
    pub fn with_intercept(columns: &[(&str, Vec<f64>)]) -> Result<Self, ModelFitError> {
        let n = columns.first().map(|(_, values)| values.len()).unwrap_or(0);
        if n == 0 {
            return Err(ModelFitError::Empty);
        }
        if let Some((name, values)) = columns.iter().find(|(_, values)| values.len() != n) {
            return Err(ModelFitError::InvalidInput(format!(
                "column {} has {} rows, expected {}",
                name,
                values.len(),
                n
            )));
        }
        let mut names = vec![INTERCEPT.to_string()];
        names.extend(columns.iter().map(|(name, _)| name.to_string()));
        let matrix = DMatrix::from_fn(n, columns.len() + 1, |i, j| {
            if j == 0 {
                1.0
            } else {
                columns[j - 1].1[i]
            }
        });
        Ok(Design { names, matrix })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    pub fn nrows(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.matrix.ncols()
    }
}

/// Fitted outcome model
#[derive(Debug, Clone, Serialize)]
pub struct AftFit {
    family: OutcomeFamily,
    names: Vec<String>,
    coefficients: Vec<f64>,
    log_scale: f64,
    /// Covariance over `(coefficients..., log σ)`
    #[serde(skip)]
    covariance: DMatrix<f64>,
    log_likelihood: f64,
    iterations: usize,
}

impl AftFit {
    pub fn family(&self) -> OutcomeFamily {
        self.family
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn scale(&self) -> f64 {
        self.log_scale.exp()
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    fn index_of(&self, name: &str) -> Result<usize, ModelFitError> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| ModelFitError::InvalidInput(format!("no coefficient named {}", name)))
    }

    /// Estimated coefficient for a named covariate
    pub fn coefficient(&self, name: &str) -> Result<f64, ModelFitError> {
        Ok(self.coefficients[self.index_of(name)?])
    }

    /// Diagonal covariance term for a named covariate
    pub fn variance(&self, name: &str) -> Result<f64, ModelFitError> {
        let i = self.index_of(name)?;
        Ok(self.covariance[(i, i)])
    }
}

/// Maximum-likelihood fitter for a location-scale AFT model
#[derive(Debug, Clone, Copy)]
pub struct AftRegression {
    family: OutcomeFamily,
    max_iter: usize,
}

impl AftRegression {
    pub fn new(family: OutcomeFamily) -> Self {
        Self {
            family,
            max_iter: MAX_ITER,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Fit `log(times) ~ design` with right-censoring given by `events`
    pub fn fit(
        &self,
        design: &Design,
        times: &[f64],
        events: &[bool],
    ) -> Result<AftFit, ModelFitError> {
        let problem = Likelihood::new(self.family, design, times, events)?;
        let p = design.ncols();

        let mut par = problem.initial_values()?;
        let mut current = problem.derivatives(&par);
        if !current.ll.is_finite() {
            return Err(ModelFitError::NonFinite { model: MODEL });
        }

        let mut converged = false;
        let mut iterations = 0;
        for iter in 0..self.max_iter {
            iterations = iter + 1;
            let information = -current.hessian.clone();
            let mut direction = information
                .lu()
                .solve(&current.gradient)
                .ok_or(ModelFitError::Singular { model: MODEL })?;
            if direction.dot(&current.gradient) <= 0.0 {
                // Information not positive definite here, fall back to ascent
                direction = current.gradient.clone();
            }

            let mut step = 1.0;
            let accepted = loop {
                let candidate = &par + &direction * step;
                let next = problem.derivatives(&candidate);
                if next.ll.is_finite() && next.ll >= current.ll - LL_TOL {
                    break Some((candidate, next));
                }
                if step < MIN_STEP {
                    break None;
                }
                step *= 0.5;
            };
            let Some((candidate, next)) = accepted else {
                // No step improves the likelihood: only a stationary point counts
                converged = current.gradient.amax() < SCORE_TOL;
                break;
            };

            let moved = (&candidate - &par).amax();
            let gain = (next.ll - current.ll).abs();
            par = candidate;
            current = next;
            tracing::trace!(iteration = iterations, ll = current.ll, moved, "AFT Newton step");
            let settled = moved < STEP_TOL || (gain < LL_TOL && moved < 1e-5);
            if settled && current.gradient.amax() < SCORE_TOL {
                converged = true;
                break;
            }
        }

        if !converged {
            return Err(ModelFitError::NotConverged {
                model: MODEL,
                iterations,
            });
        }

        let covariance = (-current.hessian.clone())
            .try_inverse()
            .ok_or(ModelFitError::Singular { model: MODEL })?;
        if (0..=p).any(|i| !(covariance[(i, i)].is_finite() && covariance[(i, i)] > 0.0)) {
            return Err(ModelFitError::Singular { model: MODEL });
        }

        Ok(AftFit {
            family: self.family,
            names: design.names().to_vec(),
            coefficients: par.rows(0, p).iter().copied().collect(),
            log_scale: par[p],
            covariance,
            log_likelihood: current.ll,
            iterations,
        })
    }
}

struct Derivatives {
    ll: f64,
    gradient: DVector<f64>,
    hessian: DMatrix<f64>,
}

struct Likelihood<'a> {
    family: OutcomeFamily,
    design: &'a DMatrix<f64>,
    log_times: Vec<f64>,
    events: &'a [bool],
}

impl<'a> Likelihood<'a> {
    fn new(
        family: OutcomeFamily,
        design: &'a Design,
        times: &[f64],
        events: &'a [bool],
    ) -> Result<Self, ModelFitError> {
        let n = design.nrows();
        if n == 0 || times.is_empty() {
            return Err(ModelFitError::Empty);
        }
        if times.len() != n || events.len() != n {
            return Err(ModelFitError::InvalidInput(format!(
                "design has {} rows but {} times and {} event indicators",
                n,
                times.len(),
                events.len()
            )));
        }
        if times.iter().any(|t| !(t.is_finite() && *t > 0.0)) {
            return Err(ModelFitError::InvalidInput(
                "AFT models require finite times > 0".to_string(),
            ));
        }
        if !events.iter().any(|&d| d) {
            return Err(ModelFitError::NoEvents);
        }
        if n <= design.ncols() {
            return Err(ModelFitError::InvalidInput(format!(
                "{} observations cannot identify {} coefficients and a scale",
                n,
                design.ncols()
            )));
        }
        Ok(Self {
            family,
            design: design.matrix(),
            log_times: times.iter().map(|t| t.ln()).collect(),
            events,
        })
    }

    /// Least squares on log-times for `β`, residual spread for `log σ`
    fn initial_values(&self) -> Result<DVector<f64>, ModelFitError> {
        let x = self.design;
        let w = DVector::from_column_slice(&self.log_times);
        let xtx = x.transpose() * x;
        let xtw = x.transpose() * &w;
        let beta = xtx
            .lu()
            .solve(&xtw)
            .ok_or(ModelFitError::Singular { model: MODEL })?;
        let residuals = &w - x * &beta;
        let n = residuals.len() as f64;
        let spread = (residuals.norm_squared() / n).sqrt();
        let log_scale = if spread.is_finite() && spread > 1e-8 {
            spread.ln()
        } else {
            0.0
        };

        let p = x.ncols();
        let mut par = DVector::zeros(p + 1);
        par.rows_mut(0, p).copy_from(&beta);
        par[p] = log_scale;
        Ok(par)
    }

    fn derivatives(&self, par: &DVector<f64>) -> Derivatives {
        let p = self.design.ncols();
        let theta = par[p];
        let sigma = theta.exp();

        let mut ll = 0.0;
        let mut gradient = DVector::zeros(p + 1);
        let mut hessian = DMatrix::zeros(p + 1, p + 1);

        for (i, (&w, &event)) in self.log_times.iter().zip(self.events).enumerate() {
            let row = self.design.row(i);
            let eta: f64 = (0..p).map(|a| row[a] * par[a]).sum();
            let z = (w - eta) / sigma;
            let terms = if event {
                self.family.log_density_terms(z)
            } else {
                self.family.log_survival_terms(z)
            };
            let d = if event { 1.0 } else { 0.0 };
            ll += terms.value - d * theta;

            // dz/dβ = -x/σ, dz/dθ = -z
            for a in 0..p {
                let xa = row[a];
                gradient[a] -= terms.d1 * xa / sigma;
                for b in 0..=a {
                    hessian[(a, b)] += terms.d2 * xa * row[b] / (sigma * sigma);
                }
                hessian[(p, a)] += xa * (terms.d2 * z + terms.d1) / sigma;
            }
            gradient[p] -= terms.d1 * z + d;
            hessian[(p, p)] += terms.d2 * z * z + terms.d1 * z;
        }

        for a in 0..=p {
            for b in 0..a {
                hessian[(b, a)] = hessian[(a, b)];
            }
        }

        Derivatives {
            ll,
            gradient,
            hessian,
        }
    }
}
