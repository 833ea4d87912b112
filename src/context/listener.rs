//! Job event listeners

use tracing::{debug, error, info, warn};

use super::TransformContext;
use crate::engine::RunOutcome;
use crate::frame::Frame;

/// Receives job and frame events as they happen
///
/// Listeners are called synchronously on the engine's task, in registration
/// order. Every method defaults to a no-op.
pub trait ContextListener: Send + Sync {
    fn on_job_start(&self, _context: &TransformContext) {}

    fn on_job_end(&self, _outcome: &RunOutcome) {}

    fn on_frame_read(&self, _frame: &Frame) {}

    fn on_frame_dropped(&self, _frame: &Frame) {}

    /// `source` names the validator that failed
    fn on_validation_failed(&self, _source: &str, _message: &str) {}

    fn on_frame_written(&self, _frame: &Frame) {}

    /// `stage` names the component kind that failed, e.g. `reader`
    fn on_error(&self, _stage: &str, _message: &str) {}
}

/// Listener that reports job events through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl ContextListener for LoggingListener {
    fn on_job_start(&self, context: &TransformContext) {
        info!("Job '{}' started (run {})", context.job_name(), context.run_id());
    }

    fn on_job_end(&self, outcome: &RunOutcome) {
        let counters = &outcome.counters;
        info!(
            "Job '{}' {}: read={} dropped={} written={} writes={} validation_failures={} errors={}",
            outcome.job,
            outcome.status,
            counters.frames_read,
            counters.frames_dropped,
            counters.frames_written,
            counters.writes,
            counters.validation_failures,
            counters.errors
        );
        if let Some(message) = &outcome.error_message {
            warn!("Job '{}' error: {}", outcome.job, message);
        }
    }

    fn on_frame_dropped(&self, frame: &Frame) {
        debug!("Dropped frame with {} fields", frame.len());
    }

    fn on_validation_failed(&self, source: &str, message: &str) {
        warn!("{}: {}", source, message);
    }

    fn on_error(&self, stage: &str, message: &str) {
        error!("{} error: {}", stage, message);
    }
}
