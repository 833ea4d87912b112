//! Per-frame transaction context

use super::TransformContext;
use crate::frame::Frame;

/// A validation failure recorded against the current frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub source: String,
    pub message: String,
}

/// Scope of one frame's pass through the pipeline
///
/// Borrows the job context mutably for its whole life, so it can never
/// outlive the run it belongs to.
pub struct TransactionContext<'a> {
    context: &'a mut TransformContext,
    source: Frame,
    target: Option<Frame>,
    failures: Vec<ValidationFailure>,
}

impl<'a> TransactionContext<'a> {
    pub fn new(context: &'a mut TransformContext, source: Frame) -> Self {
        Self {
            context,
            source,
            target: None,
            failures: Vec::new(),
        }
    }

    pub fn context(&self) -> &TransformContext {
        &*self.context
    }

    pub fn context_mut(&mut self) -> &mut TransformContext {
        &mut *self.context
    }

    /// The working frame as read and transformed
    pub fn source_frame(&self) -> &Frame {
        &self.source
    }

    pub fn source_frame_mut(&mut self) -> &mut Frame {
        &mut self.source
    }

    /// The mapped frame, once a mapper has produced one
    pub fn target_frame(&self) -> Option<&Frame> {
        self.target.as_ref()
    }

    pub fn target_frame_mut(&mut self) -> Option<&mut Frame> {
        self.target.as_mut()
    }

    pub fn set_target_frame(&mut self, frame: Frame) {
        self.target = Some(frame);
    }

    /// Record a failure without notifying listeners
    pub fn add_validation_failure<S: Into<String>, M: Into<String>>(&mut self, source: S, message: M) {
        self.failures.push(ValidationFailure {
            source: source.into(),
            message: message.into(),
        });
    }

    /// Record a failure and notify the job's listeners once
    pub fn fire_validation_failed(&mut self, source: &str, message: &str) {
        self.add_validation_failure(source, message);
        self.context.fire_validation_failed(source, message);
    }

    pub fn validation_failures(&self) -> &[ValidationFailure] {
        &self.failures
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Render a template against the job symbols overlaid with the working
    /// frame's fields
    pub fn resolve(&self, template: &str) -> String {
        let symbols = self.context.symbols().overlay(&self.source);
        self.context.renderer().render(template, &symbols)
    }

    /// Split into the frame bound for writers and the job context
    ///
    /// The target frame is used when one was mapped, the source frame
    /// otherwise.
    pub fn write_view(&mut self) -> (&Frame, &mut TransformContext) {
        let frame = self.target.as_ref().unwrap_or(&self.source);
        (frame, &mut *self.context)
    }

    /// Finish the pass, returning the frame bound for writers
    pub fn into_output(self) -> Frame {
        self.target.unwrap_or(self.source)
    }
}
