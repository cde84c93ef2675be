//! Queue handler implementations.

pub mod alr;

pub use alr::{AlrJobHandler, ALR_JOB_CLASS};
