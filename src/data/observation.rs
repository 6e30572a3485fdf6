use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AftImputeError;

/// A single simulated unit
///
/// Holds the observed outcome time `y` with its event indicator `delta`, the
/// covariate `x` with its observed indicator `v`, and the fully observed
/// covariate `z`. When `v` is `false`, `x` is the unit's censoring bound: the
/// true covariate is only known to exceed it.
///
/// The only field written after construction is the imputed covariate, set by
/// the imputation engine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Observation {
    y: f64,
    delta: bool,
    x: f64,
    v: bool,
    z: f64,
    imputed_x: Option<f64>,
}

impl Observation {
    /// Create a new [Observation]
    ///
    /// # Arguments
    ///
    /// * `y` - Observed event or censoring time, must be positive
    /// * `delta` - `true` when the event was observed
    /// * `x` - Covariate value, or the censoring bound when `v` is `false`
    /// * `v` - `true` when `x` is fully observed
    /// * `z` - Fully observed covariate
    pub fn new(y: f64, delta: bool, x: f64, v: bool, z: f64) -> Self {
        Observation {
            y,
            delta,
            x,
            v,
            z,
            imputed_x: None,
        }
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn delta(&self) -> bool {
        self.delta
    }

    /// The recorded covariate: the value itself or the censoring bound
    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn v(&self) -> bool {
        self.v
    }

    pub fn z(&self) -> f64 {
        self.z
    }

    pub fn is_censored(&self) -> bool {
        !self.v
    }

    pub fn imputed_x(&self) -> Option<f64> {
        self.imputed_x
    }

    /// The covariate to use in a completed-data fit
    ///
    /// Observed units return `x`, censored units return their imputed value,
    /// or `None` if nothing has been imputed yet.
    pub fn completed_x(&self) -> Option<f64> {
        if self.v {
            Some(self.x)
        } else {
            self.imputed_x
        }
    }

    pub(crate) fn set_imputed_x(&mut self, value: f64) {
        self.imputed_x = Some(value);
    }

    pub(crate) fn clear_imputation(&mut self) {
        self.imputed_x = None;
    }

    fn validate(&self, index: usize) -> Result<(), AftImputeError> {
        if !(self.y.is_finite() && self.y > 0.0) {
            return Err(AftImputeError::InvalidData(format!(
                "observation {} has a non-positive or non-finite time ({})",
                index, self.y
            )));
        }
        if !(self.x.is_finite() && self.x > 0.0) {
            return Err(AftImputeError::InvalidData(format!(
                "observation {} has a non-positive or non-finite covariate ({})",
                index, self.x
            )));
        }
        if !self.z.is_finite() {
            return Err(AftImputeError::InvalidData(format!(
                "observation {} has a non-finite z ({})",
                index, self.z
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "y={:.4} delta={} x={:.4}{} z={:.4}",
            self.y,
            u8::from(self.delta),
            self.x,
            if self.v { "" } else { "+" },
            self.z
        )
    }
}

/// An ordered collection of [Observation]s belonging to one simulation replicate
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    observations: Vec<Observation>,
}

impl Dataset {
    /// Constructs a validated [Dataset]
    ///
    /// Fails with [AftImputeError::InvalidData] if the dataset is empty or an
    /// observation carries a non-positive time or covariate.
    pub fn new(observations: Vec<Observation>) -> Result<Self, AftImputeError> {
        if observations.is_empty() {
            return Err(AftImputeError::InvalidData(
                "a dataset needs at least one observation".to_string(),
            ));
        }
        for (index, observation) in observations.iter().enumerate() {
            observation.validate(index)?;
        }
        Ok(Dataset { observations })
    }

    // Rows drawn from an already validated dataset
    pub(crate) fn from_validated(observations: Vec<Observation>) -> Self {
        Dataset { observations }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub(crate) fn observations_mut(&mut self) -> &mut [Observation] {
        &mut self.observations
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter()
    }

    /// Number of units whose covariate is censored
    pub fn n_censored_covariates(&self) -> usize {
        self.observations.iter().filter(|o| o.is_censored()).count()
    }

    /// Subset of units with a fully observed covariate
    pub fn complete_cases(&self) -> Vec<&Observation> {
        self.observations.iter().filter(|o| o.v()).collect()
    }

    /// Mean of the fully observed covariate values, `None` if there are none
    pub fn observed_covariate_mean(&self) -> Option<f64> {
        let observed: Vec<f64> = self.complete_cases().iter().map(|o| o.x()).collect();
        if observed.is_empty() {
            return None;
        }
        Some(observed.iter().sum::<f64>() / observed.len() as f64)
    }

    /// Sample variance of the recorded covariate column over every unit
    pub fn covariate_variance(&self) -> Option<f64> {
        let x: Vec<f64> = self.observations.iter().map(|o| o.x()).collect();
        sample_variance(&x)
    }

    /// Sorted distinct values of the fully observed covariate
    ///
    /// These are the candidate levels over which conditional distributions of
    /// censored covariates are built.
    pub fn candidate_levels(&self) -> Vec<f64> {
        let mut levels: Vec<f64> = self
            .observations
            .iter()
            .filter(|o| o.v())
            .map(|o| o.x())
            .collect();
        levels.sort_by(|a, b| a.total_cmp(b));
        levels.dedup();
        levels
    }

    /// A copy with every censored covariate replaced by `value`
    ///
    /// The observed indicator is left untouched.
    pub fn with_censored_replaced(&self, value: f64) -> Dataset {
        let observations = self
            .observations
            .iter()
            .map(|o| {
                if o.v() {
                    o.clone()
                } else {
                    Observation {
                        x: value,
                        ..o.clone()
                    }
                }
            })
            .collect();
        Dataset { observations }
    }
}

/// Sample variance (n - 1 denominator), `None` for fewer than two values
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    Some(values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0))
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Dataset: {} units, {} censored covariates",
            self.len(),
            self.n_censored_covariates()
        )?;
        for observation in &self.observations {
            writeln!(f, "  {}", observation)?;
        }
        Ok(())
    }
}
