//! Component contract shared by every pipeline stage
//!
//! Every stage implements [`Component`] for its lifecycle
//! (`configure`, `open`, repeated processing, `close`) plus one stage trait:
//!
//! | Trait | Stage |
//! |-------|-------|
//! | [`FrameReader`] | produces frames until end of stream |
//! | [`FrameFilter`] | accepts or rejects a frame when its condition matches |
//! | [`FrameValidator`] | checks a frame, reporting failures to listeners |
//! | [`FrameTransform`] | mutates the working frame |
//! | [`FrameMapper`] | builds the target frame from the working frame |
//! | [`FrameWriter`] | consumes the finished frame |
//! | [`TransformTask`] | runs once before or after the frame loop |
//!
//! The engine only ever holds these as trait objects.

use async_trait::async_trait;
use strum::{AsRefStr, Display};

use crate::config::ComponentConfig;
use crate::context::{TransactionContext, TransformContext};
use crate::errors::{ConfigError, ReadError, StageError, TaskError, WriteError};
use crate::frame::Frame;

pub mod factory;
pub mod filter;
pub mod mapper;
pub mod reader;
pub mod task;
pub mod transform;
pub mod validate;
pub mod writer;

pub use factory::ComponentFactory;

/// The kind of stage a component fills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ComponentKind {
    Reader,
    Filter,
    Validator,
    Transformer,
    Mapper,
    Writer,
    Task,
}

/// Lifecycle shared by every component
#[async_trait]
pub trait Component: Send + Sync {
    /// Type name used in logs and listener notifications
    fn name(&self) -> &str;

    /// Apply settings; fails when a mandatory attribute is missing or invalid
    fn configure(&mut self, _config: &ComponentConfig) -> Result<(), ConfigError> {
        Ok(())
    }

    async fn open(&mut self, _context: &mut TransformContext) -> Result<(), StageError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StageError> {
        Ok(())
    }
}

#[async_trait]
pub trait FrameReader: Component {
    /// Next frame, or `None` at end of stream
    async fn read(&mut self, context: &mut TransformContext) -> Result<Option<Frame>, ReadError>;
}

/// Outcome of evaluating a filter against a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    /// The condition did not match; later filters decide
    NoMatch,
    Accept,
    Reject,
}

#[async_trait]
pub trait FrameFilter: Component {
    async fn evaluate(&mut self, transaction: &TransactionContext<'_>) -> Result<FilterVerdict, StageError>;
}

#[async_trait]
pub trait FrameValidator: Component {
    /// `false` when the frame failed; the validator reports its own failure
    async fn validate(&mut self, transaction: &mut TransactionContext<'_>) -> Result<bool, StageError>;

    /// Whether a failure, including an error raised by `validate`, stops the job
    fn halts_on_fail(&self) -> bool {
        false
    }
}

#[async_trait]
pub trait FrameTransform: Component {
    async fn transform(&mut self, transaction: &mut TransactionContext<'_>) -> Result<(), StageError>;
}

#[async_trait]
pub trait FrameMapper: Component {
    /// Produce the target frame, normally through `set_target_frame`
    async fn map(&mut self, transaction: &mut TransactionContext<'_>) -> Result<(), StageError>;
}

#[async_trait]
pub trait FrameWriter: Component {
    async fn write(&mut self, frame: &Frame, context: &mut TransformContext) -> Result<(), WriteError>;
}

#[async_trait]
pub trait TransformTask: Component {
    async fn execute(&mut self, context: &mut TransformContext) -> Result<(), TaskError>;
}
