pub mod data;
pub mod error;
pub mod fitting;
pub mod imputation;
pub mod simulator;

//extension traits
pub use crate::data::builder::DatasetBuilderExt;
pub use crate::data::*;
pub use crate::fitting::{AftFit, AftRegression, CoxFit, CoxRegression, OutcomeFamily};
pub use crate::imputation::{
    ImputationOptions, MultipleImputation, PooledCoefficient, PooledEstimate, ReplicateEstimate,
};
pub use crate::simulator::{compare_methods, ResultTable, SimulationSettings, StreamBank};
pub use error::{AftImputeError, ModelFitError};

pub mod prelude {
    pub mod data {
        pub use crate::data::{bootstrap, sample_variance, Dataset, DatasetBuilder, Observation};
    }
    pub mod fitting {
        pub use crate::fitting::{
            AftFit, AftRegression, BaselineHazard, CoxFit, CoxRegression, Design, OutcomeFamily,
            INTERCEPT,
        };
    }
    pub mod imputation {
        pub use crate::imputation::{
            impute_unit, pool, run_replicate, ConditionalBuilder, ConditionalSurvival,
            ImputationOptions, MultipleImputation, PooledEstimate, ReplicateEstimate,
        };
    }
    pub mod simulator {
        pub use crate::simulator::{
            all_estimators, compare_methods, estimate_all, generate, CompleteCase, Estimator,
            MeanSubstitution, MissingIndicator, ResultRow, ResultTable, SimulatedData,
            SimulationSettings, Slot, StreamBank,
        };
    }

    //extension traits
    pub use crate::data::builder::DatasetBuilderExt;
    pub use crate::data::*;
    pub use crate::error::AftImputeError;
    pub use crate::imputation::MultipleImputation;
    pub use crate::simulator::Estimator;
}
