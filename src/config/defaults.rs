/// Configuration default values
///
/// This module contains all the default values for job configuration,
/// making them easily changeable in one central location.
// Job defaults
pub const DEFAULT_JOB_NAME: &str = "dxflow-job";
pub const DEFAULT_LOG_LEVEL: &str = "info";

// Persisted context defaults
pub const DEFAULT_CONTEXT_TABLE: &str = "dx_context";
pub const CONTEXT_JOB_NAME_LENGTH: usize = 64;
pub const CONTEXT_KEY_LENGTH: usize = 128;
pub const CONTEXT_VALUE_LENGTH: usize = 4096;

// Connection defaults
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

// Component defaults
pub const DEFAULT_HALT_ON_FAIL: bool = false;
pub const DEFAULT_WRITER_APPEND: bool = false;
