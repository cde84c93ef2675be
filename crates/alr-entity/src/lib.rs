//! # alr-entity
//!
//! Domain entity models for the ALR export worker. Database rows derive
//! `sqlx::FromRow`; queue payloads keep the field names the upstream
//! dispatcher serializes.

pub mod job;
pub mod queue;
