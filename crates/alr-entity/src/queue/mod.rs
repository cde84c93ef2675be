//! Queue message entities.

pub mod model;

pub use model::QueuedUnit;
