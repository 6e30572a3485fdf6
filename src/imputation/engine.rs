//! One imputation replicate: bootstrap, fit, impute, refit.

use argmin::core::{CostFunction, Error, Executor, State, TerminationReason, TerminationStatus};
use argmin::solver::brent::BrentRoot;
use nalgebra::DMatrix;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::conditional::{ConditionalBuilder, ConditionalSurvival, ADJUSTMENT, COVARIATE};
use super::options::ImputationOptions;
use crate::data::{bootstrap, Dataset, Observation};
use crate::error::AftImputeError;
use crate::fitting::{AftFit, AftRegression, CoxFit, CoxRegression, Design, OutcomeFamily};

/// Coefficients and variances of one completed-data fit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplicateEstimate {
    /// Coefficient of the censored covariate
    pub b1: f64,
    /// Coefficient of the fully observed covariate
    pub b2: f64,
    pub var_b1: f64,
    pub var_b2: f64,
}

impl ReplicateEstimate {
    /// Read both coefficients of an outcome model fitted on `x + z`
    pub fn from_fit(fit: &AftFit) -> Result<Self, AftImputeError> {
        Ok(Self {
            b1: fit.coefficient(COVARIATE)?,
            b2: fit.coefficient(ADJUSTMENT)?,
            var_b1: fit.variance(COVARIATE)?,
            var_b2: fit.variance(ADJUSTMENT)?,
        })
    }
}

/// Fit `Y, Δ ~ x + z` on the given units with the given covariate values
pub(crate) fn fit_outcome<'a>(
    family: OutcomeFamily,
    units: impl IntoIterator<Item = (&'a Observation, f64)>,
) -> Result<AftFit, AftImputeError> {
    let mut x = Vec::new();
    let mut z = Vec::new();
    let mut y = Vec::new();
    let mut delta = Vec::new();
    for (unit, value) in units {
        x.push(value);
        z.push(unit.z());
        y.push(unit.y());
        delta.push(unit.delta());
    }
    let design = Design::with_intercept(&[(COVARIATE, x), (ADJUSTMENT, z)])?;
    Ok(AftRegression::new(family).fit(&design, &y, &delta)?)
}

/// Fit the auxiliary Cox model of the covariate on `z`
pub(crate) fn fit_auxiliary(data: &Dataset) -> Result<CoxFit, AftImputeError> {
    let times: Vec<f64> = data.iter().map(|o| o.x()).collect();
    let events: Vec<bool> = data.iter().map(|o| o.v()).collect();
    let z: Vec<f64> = data.iter().map(|o| o.z()).collect();
    let covariates = DMatrix::from_column_slice(data.len(), 1, &z);
    Ok(CoxRegression::new().fit(&times, &events, &covariates)?)
}

/// `F(t) - u`, whose root is the imputed value
struct Inversion<'a> {
    curve: &'a ConditionalSurvival,
    u: f64,
}

impl CostFunction for Inversion<'_> {
    type Param = f64;
    type Output = f64;

    fn cost(&self, t: &Self::Param) -> Result<Self::Output, Error> {
        Ok(self.curve.evaluate(*t) - self.u)
    }
}

/// Solve `F(t) = u` for one conditional survival curve
///
/// The root is searched by Brent's method on `bracket`. Deterministic: the
/// same curve, `u` and options always give the same value.
pub fn impute_unit(
    curve: &ConditionalSurvival,
    u: f64,
    bracket: (f64, f64),
    options: &ImputationOptions,
) -> Result<f64, AftImputeError> {
    let (lower, upper) = bracket;
    let problem = Inversion { curve, u };
    let (f_lower, f_upper) = (curve.evaluate(lower) - u, curve.evaluate(upper) - u);
    if f_lower * f_upper > 0.0 {
        return Err(AftImputeError::root_not_found(format!(
            "no sign change on [{}, {}] for u = {}",
            lower, upper, u
        )));
    }

    let solver = BrentRoot::new(lower, upper, options.root_tolerance);
    let res = Executor::new(problem, solver)
        .configure(|state| state.max_iters(options.max_root_iters))
        .run()
        .map_err(|e| AftImputeError::root_not_found(e.to_string()))?;

    if matches!(
        res.state.get_termination_status(),
        TerminationStatus::Terminated(TerminationReason::MaxItersReached)
    ) {
        return Err(AftImputeError::root_not_found(format!(
            "Brent's method did not converge in {} iterations",
            options.max_root_iters
        )));
    }
    res.state
        .get_param()
        .copied()
        .filter(|t| t.is_finite())
        .ok_or_else(|| AftImputeError::root_not_found("the root solver returned no value"))
}

/// Run one imputation replicate
///
/// Draws a bootstrap sample of `data`, fits the auxiliary Cox model on it and
/// the outcome model on its complete cases, imputes every censored covariate
/// of the sample by inverting its conditional survival curve at a uniform
/// draw, then refits the outcome model on the completed sample.
pub fn run_replicate<R: Rng + ?Sized>(
    data: &Dataset,
    options: &ImputationOptions,
    rng: &mut R,
) -> Result<ReplicateEstimate, AftImputeError> {
    let mut sample = bootstrap(data, rng);
    let levels = sample.candidate_levels();
    if levels.is_empty() {
        return Err(AftImputeError::InvalidData(
            "the bootstrap sample has no observed covariate".to_string(),
        ));
    }

    let auxiliary = fit_auxiliary(&sample)?;
    let complete = sample.complete_cases();
    let outcome = fit_outcome(
        options.outcome_family,
        complete.iter().map(|&o| (o, o.x())),
    )?;
    tracing::debug!(
        "Outcome fit on {} complete cases converged in {} iterations",
        complete.len(),
        outcome.iterations()
    );

    let bracket = options
        .root_bracket
        .unwrap_or((0.0, 1.0 + levels[levels.len() - 1]));
    let builder = ConditionalBuilder::new(&levels, &outcome, &auxiliary)?;

    let mut imputed = Vec::with_capacity(sample.n_censored_covariates());
    for (index, unit) in sample.iter().enumerate().filter(|(_, o)| o.is_censored()) {
        let curve = builder.build(unit)?;
        let u: f64 = rng.random();
        imputed.push((index, impute_unit(&curve, u, bracket, options)?));
    }
    let units = sample.observations_mut();
    for (index, value) in imputed {
        units[index].set_imputed_x(value);
    }

    let completed = fit_outcome(
        options.outcome_family,
        sample
            .iter()
            .filter_map(|o| o.completed_x().map(|value| (o, value))),
    )?;
    let estimate = ReplicateEstimate::from_fit(&completed)?;
    tracing::debug!(
        "Replicate estimate b1 = {:.4}, b2 = {:.4}",
        estimate.b1,
        estimate.b2
    );
    Ok(estimate)
}
