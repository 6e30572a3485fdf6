use rand::Rng;
use rand_distr::{Distribution, Exp1, StandardNormal};
use serde::Serialize;

use super::settings::{SimulationSettings, CENSORING_SHAPE};
use super::streams::{Slot, StreamBank};
use crate::data::{Dataset, Observation};
use crate::error::AftImputeError;

/// A synthetic dataset together with the covariate values it hides
#[derive(Debug, Clone, Serialize)]
pub struct SimulatedData {
    pub dataset: Dataset,
    /// True covariate of every unit, in dataset order
    pub true_x: Vec<f64>,
}

/// Generate one dataset from the [Slot::Generate] stream of `streams`
pub fn generate(
    settings: &SimulationSettings,
    streams: &StreamBank,
) -> Result<SimulatedData, AftImputeError> {
    settings.validate()?;
    let mut rng = streams.stream(Slot::Generate);
    generate_with(settings, &mut rng)
}

/// Generate one dataset from an explicit random source
///
/// ```text
/// Z ~ N(0, 1)
/// X = (E / (λ exp(γ Z)))^(1/k)          E ~ Exp(1)
/// C = (E' / μ_p)^(1/0.5)                E' ~ Exp(1)
/// log T = β0 + β1 X + β2 Z + σ W
/// C_y ~ Exp(rate)
/// ```
pub fn generate_with<R: Rng + ?Sized>(
    settings: &SimulationSettings,
    rng: &mut R,
) -> Result<SimulatedData, AftImputeError> {
    let censoring_rate = settings.censoring_rate()?;
    let covariate = settings.covariate;
    let [b0, b1, b2] = settings.coefficients;

    let mut observations = Vec::with_capacity(settings.n);
    let mut true_x = Vec::with_capacity(settings.n);
    for _ in 0..settings.n {
        let z: f64 = StandardNormal.sample(rng);
        let e: f64 = Exp1.sample(rng);
        let x = (e / (covariate.rate * (covariate.gamma * z).exp())).powf(1.0 / covariate.shape);
        let e: f64 = Exp1.sample(rng);
        let bound = (e / censoring_rate).powf(1.0 / CENSORING_SHAPE);

        let w = settings.outcome_family.sample_error(rng);
        let t = (b0 + b1 * x + b2 * z + settings.scale * w).exp();
        let e: f64 = Exp1.sample(rng);
        let outcome_censoring = e / settings.outcome_censoring_rate;

        let observed = x <= bound;
        observations.push(Observation::new(
            t.min(outcome_censoring),
            t <= outcome_censoring,
            x.min(bound),
            observed,
            z,
        ));
        true_x.push(x);
    }

    let dataset = Dataset::new(observations)?;
    tracing::debug!(
        "Generated {} units, {} censored covariates",
        dataset.len(),
        dataset.n_censored_covariates()
    );
    Ok(SimulatedData { dataset, true_x })
}
