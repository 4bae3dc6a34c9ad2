//! Trial execution: one pytest subprocess per trial, its decoded output,
//! and the bounded retry wrapped around both.

mod decoder;
mod executor;
mod retry;

pub use decoder::{OutputDecoder, ValuePair};
pub use executor::{SeedConfiguration, TrialExecutor, TrialOutput, TrialSpec, TrialStatus};
pub use retry::attempt;
