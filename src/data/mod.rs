pub mod builder;
pub mod observation;
pub mod resample;

pub use builder::*;
pub use observation::*;
pub use resample::bootstrap;
