//! Standardized error distributions for location-scale AFT models.
//!
//! An AFT model writes `log T = η + σ W`, where `W` follows one of the
//! standard families below. Everything the fitting and imputation code needs
//! is expressed through the log-density `g(w)` and log-survival `h(w)` of `W`
//! together with their first two derivatives.
//!
//! All functions operate in log-space for numerical stability.

use rand::Rng;
use rand_distr::{Distribution, Exp1, StandardNormal};
use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;
use std::fmt;

// ln(2π) = ln(2) + ln(π) ≈ 1.8378770664093453
pub(crate) const LOG_2PI: f64 = 1.8378770664093453_f64;

/// Distributional family of the outcome model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OutcomeFamily {
    /// Weibull event times, minimum extreme value errors on the log scale
    #[default]
    Weibull,
    /// Log-normal event times, normal errors on the log scale
    LogNormal,
    /// Log-logistic event times, logistic errors on the log scale
    LogLogistic,
}

/// Value and first two derivatives of a log-density or log-survival term
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Terms {
    pub value: f64,
    pub d1: f64,
    pub d2: f64,
}

impl OutcomeFamily {
    /// `g(w)`, `g'(w)`, `g''(w)` of the standardized log-density
    #[inline]
    pub fn log_density_terms(&self, w: f64) -> Terms {
        match self {
            OutcomeFamily::Weibull => {
                let ew = w.exp();
                Terms {
                    value: w - ew,
                    d1: 1.0 - ew,
                    d2: -ew,
                }
            }
            OutcomeFamily::LogNormal => Terms {
                value: -0.5 * LOG_2PI - 0.5 * w * w,
                d1: -w,
                d2: -1.0,
            },
            OutcomeFamily::LogLogistic => {
                let p = logistic(w);
                Terms {
                    value: w - 2.0 * softplus(w),
                    d1: 1.0 - 2.0 * p,
                    d2: -2.0 * p * (1.0 - p),
                }
            }
        }
    }

    /// `h(w)`, `h'(w)`, `h''(w)` of the standardized log-survival
    #[inline]
    pub fn log_survival_terms(&self, w: f64) -> Terms {
        match self {
            OutcomeFamily::Weibull => {
                let ew = w.exp();
                Terms {
                    value: -ew,
                    d1: -ew,
                    d2: -ew,
                }
            }
            OutcomeFamily::LogNormal => {
                let value = log_normal_sf(w);
                // Inverse Mills ratio φ(w) / (1 - Φ(w))
                let mills = (-0.5 * LOG_2PI - 0.5 * w * w - value).exp();
                Terms {
                    value,
                    d1: -mills,
                    d2: -mills * (mills - w),
                }
            }
            OutcomeFamily::LogLogistic => {
                let p = logistic(w);
                Terms {
                    value: -softplus(w),
                    d1: -p,
                    d2: -p * (1.0 - p),
                }
            }
        }
    }

    /// Density of the event time `y` given linear predictor `eta` and scale `sigma`
    ///
    /// # Formula
    /// ```text
    /// f(y) = exp(g((ln y - η) / σ)) / (σ y)
    /// ```
    pub fn density(&self, y: f64, eta: f64, sigma: f64) -> f64 {
        let w = (y.ln() - eta) / sigma;
        (self.log_density_terms(w).value - sigma.ln() - y.ln()).exp()
    }

    /// Survival probability `P(T > y)` given `eta` and `sigma`
    pub fn survival(&self, y: f64, eta: f64, sigma: f64) -> f64 {
        let w = (y.ln() - eta) / sigma;
        self.log_survival_terms(w).value.exp()
    }

    /// Draw one standardized error `W`
    pub fn sample_error<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            OutcomeFamily::Weibull => {
                let e: f64 = Exp1.sample(rng);
                e.ln()
            }
            OutcomeFamily::LogNormal => StandardNormal.sample(rng),
            OutcomeFamily::LogLogistic => {
                let u: f64 = rng.random_range(f64::EPSILON..1.0);
                (u / (1.0 - u)).ln()
            }
        }
    }
}

impl fmt::Display for OutcomeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutcomeFamily::Weibull => "weibull",
            OutcomeFamily::LogNormal => "lognormal",
            OutcomeFamily::LogLogistic => "loglogistic",
        };
        write!(f, "{}", name)
    }
}

#[inline(always)]
fn logistic(w: f64) -> f64 {
    if w >= 0.0 {
        1.0 / (1.0 + (-w).exp())
    } else {
        let e = w.exp();
        e / (1.0 + e)
    }
}

/// ln(1 + e^w) without overflow
#[inline(always)]
fn softplus(w: f64) -> f64 {
    w.max(0.0) + (-w.abs()).exp().ln_1p()
}

/// Log of the standard normal survival function.
///
/// For extremely small survival values (w > 37) uses the asymptotic
/// approximation `log φ(w) - log w` to avoid underflow to zero.
#[inline(always)]
pub fn log_normal_sf(w: f64) -> f64 {
    let sf = 0.5 * erfc(w / std::f64::consts::SQRT_2);
    if sf <= 0.0 || w > 37.0 {
        -0.5 * LOG_2PI - 0.5 * w * w - w.ln()
    } else {
        sf.ln()
    }
}
