//! # alr-database
//!
//! The job store contract used by the worker, its PostgreSQL
//! implementation, the queue table accessor, and an in-process store for
//! tests and local runs.

pub mod connection;
pub mod memory;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::MemoryJobStore;
pub use store::{JobStore, UpdateOutcome};
