//! Multiple imputation of a randomly censored covariate.
//!
//! Each imputation draws a bootstrap sample, fits the auxiliary Cox model
//! and the outcome model on it, replaces every censored covariate with a draw
//! from its conditional distribution and refits. The replicates are combined
//! with Rubin's rules.

pub mod conditional;
pub mod engine;
pub mod options;
pub mod pooling;

pub use conditional::{ConditionalBuilder, ConditionalSurvival, ADJUSTMENT, COVARIATE};
pub use engine::{impute_unit, run_replicate, ReplicateEstimate};
pub use options::ImputationOptions;
pub use pooling::{pool, MultipleImputation, PooledCoefficient, PooledEstimate};
