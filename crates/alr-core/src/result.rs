//! Convenience result type alias for the ALR export worker.

use crate::error::AppError;

/// A specialized `Result` type for ALR export operations.
pub type AppResult<T> = Result<T, AppError>;
