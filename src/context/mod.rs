//! Execution context model
//!
//! - [`TransformContext`]: one per job run, shared by every component
//! - [`TransactionContext`]: one per frame, borrowing the job context
//! - [`DatabaseContext`]: keeps the job's symbols in a relational table
//!   between runs

pub mod database;
pub mod listener;
pub mod transaction;
pub mod transform;

pub use database::DatabaseContext;
pub use listener::{ContextListener, LoggingListener};
pub use transaction::{TransactionContext, ValidationFailure};
pub use transform::{ContextStore, RunCounters, TransformContext};

/// Symbol names the context maintains itself
pub mod keys {
    pub const JOB_NAME: &str = "jobname";
    pub const RUN_ID: &str = "runid";
    pub const JOB_DIR: &str = "jobdir";
    pub const WORK_DIR: &str = "workdir";
    /// Number of times the persisted context has been opened
    pub const RUN_COUNT: &str = "RunCount";
    /// Start time of the last run that closed the persisted context
    pub const LAST_RUN_DATE: &str = "LastRunDate";
}
