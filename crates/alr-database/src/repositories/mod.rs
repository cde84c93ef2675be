//! PostgreSQL repository implementations.

pub mod job;
pub mod queue;

pub use job::JobRepository;
pub use queue::QueueRepository;
