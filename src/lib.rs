//! dxflow: a frame-oriented extract/transform/load engine
//!
//! A job reads frames from one reader, passes each through filters,
//! validators, transformers and a mapper, and hands the result to its
//! writers. Job state lives in a symbol table that can be persisted to a
//! relational table between runs.

pub mod component;
pub mod config;
pub mod connection;
pub mod context;
pub mod dialect;
pub mod engine;
pub mod errors;
pub mod expression;
pub mod frame;
pub mod template;

pub use component::ComponentFactory;
pub use config::JobConfig;
pub use context::{DatabaseContext, TransformContext};
pub use engine::{RunOutcome, RunStatus, TransformEngine};
pub use errors::{EngineError, EngineResult};
pub use frame::{FieldType, FieldValue, Frame};
