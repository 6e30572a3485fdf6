use crate::data::*;
use crate::error::AftImputeError;

pub trait DatasetBuilderExt {
    fn builder() -> DatasetBuilder;
}

impl DatasetBuilderExt for Dataset {
    fn builder() -> DatasetBuilder {
        DatasetBuilder {
            observations: Vec::new(),
        }
    }
}

/// Fluent construction of a [Dataset]
///
/// ```
/// use aftimpute::*;
///
/// let data = Dataset::builder()
///     .observed(2.1, true, 0.8, 0.3)
///     .censored(4.0, false, 1.2, -0.5)
///     .build()
///     .unwrap();
/// assert_eq!(data.n_censored_covariates(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DatasetBuilder {
    observations: Vec<Observation>,
}

impl DatasetBuilder {
    pub fn observation(mut self, observation: Observation) -> Self {
        self.observations.push(observation);
        self
    }

    /// Add a unit whose covariate `x` is fully observed
    pub fn observed(self, y: f64, delta: bool, x: f64, z: f64) -> Self {
        self.observation(Observation::new(y, delta, x, true, z))
    }

    /// Add a unit whose covariate is only known to exceed `bound`
    pub fn censored(self, y: f64, delta: bool, bound: f64, z: f64) -> Self {
        self.observation(Observation::new(y, delta, bound, false, z))
    }

    pub fn build(self) -> Result<Dataset, AftImputeError> {
        Dataset::new(self.observations)
    }
}
