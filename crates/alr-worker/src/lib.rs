//! Queue worker for ALR export jobs.
//!
//! This crate provides:
//! - The ALR unit handler that drives a job to exactly one terminal status
//! - A cancellation watcher bound to each handler invocation
//! - The completion detector consulted after every unit
//! - The work-unit processor contract and a roster exporter
//! - A queue dispatcher and a polling worker runner

pub mod cancellation;
pub mod completion;
pub mod executor;
pub mod jobs;
pub mod processor;
pub mod queue;
pub mod runner;

pub use cancellation::{CancellationWatcher, WatcherGuard};
pub use completion::CompletionDetector;
pub use executor::{QueueDispatcher, QueueHandler};
pub use jobs::AlrJobHandler;
pub use processor::{AlrProcessor, RosterExporter};
pub use queue::JobQueue;
pub use runner::WorkerRunner;
