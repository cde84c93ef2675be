//! PostgreSQL integration tests.
//!
//! Ignored by default. Point `ALR_TEST_DATABASE_URL` at a disposable
//! database and run `cargo test --test integration -- --ignored`.

mod helpers;
mod job_repository_test;
mod queue_repository_test;
