//! Export job domain entities.

pub mod args;
pub mod key;
pub mod model;
pub mod status;

pub use args::JobAlrEnqueueArgs;
pub use key::{JobKey, NewJobKey};
pub use model::{Job, JobId};
pub use status::JobStatus;
