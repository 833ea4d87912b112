//! Centralized error handling for the transform engine
//!
//! # Error Categories
//!
//! - **Configuration Errors**: missing or invalid component/job settings
//! - **Stage Errors**: reader, writer, filter, transformer and mapper failures
//! - **Task Errors**: pre-process and post-process task failures
//! - **Context Errors**: persisted context, connection and dialect failures
//! - **Engine Errors**: fatal job errors that abort a run
//!
//! # Usage
//!
//! ```rust
//! use dxflow::errors::{EngineError, EngineResult};
//!
//! fn example_function() -> EngineResult<String> {
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using EngineError
pub type EngineResult<T> = Result<T, EngineError>;

/// Convenience type alias for context Results
pub type ContextResult<T> = Result<T, ContextError>;

/// Convenience type alias for connection Results
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Convenience type alias for expression Results
pub type ExpressionResult<T> = Result<T, ExpressionError>;
