//! Transform Engine
//!
//! Drives one job through its lifecycle:
//!
//! ```text
//! Configured -> Opened -> Running -> (Completed | Aborted) -> Closed
//! ```
//!
//! Opening acquires the context and then every component in registration
//! order. Running executes the pre-process tasks, the frame loop and the
//! post-process tasks. [`TransformEngine::shutdown`] closes whatever was
//! opened, in reverse order, and is invoked by `run()` on every exit path.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use strum::{AsRefStr, Display};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::component::{
    ComponentFactory, ComponentKind, FilterVerdict, FrameFilter, FrameMapper, FrameReader,
    FrameTransform, FrameValidator, FrameWriter, TransformTask,
};
use crate::config::JobConfig;
use crate::context::{
    ContextListener, DatabaseContext, RunCounters, TransactionContext, TransformContext,
};
use crate::dialect::DialectRegistry;
use crate::errors::{ContextError, EngineError, EngineResult, StageError};
use crate::frame::Frame;

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum EngineState {
    Configured,
    Opened,
    Running,
    Completed,
    Aborted,
    Closed,
}

/// Final status of a run that was not stopped by a job error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum RunStatus {
    Completed,
    Aborted,
}

/// What happened to one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Written,
    Dropped,
    /// A stage raised; the frame was reported and abandoned
    Failed,
    /// The context error was set while the frame was in flight
    Aborted,
}

/// Summary handed to `on_job_end` and returned by `run()`
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub job: String,
    pub status: RunStatus,
    /// The context's sticky error, if one was set
    pub error_message: Option<String>,
    pub counters: RunCounters,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
enum TaskPhase {
    #[strum(serialize = "pre-process")]
    Pre,
    #[strum(serialize = "post-process")]
    Post,
}

/// Position of a registered component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    PreTask(usize),
    PostTask(usize),
    Reader,
    Filter(usize),
    Validator(usize),
    Transformer(usize),
    Mapper,
    Writer(usize),
}

impl Slot {
    fn kind(self) -> ComponentKind {
        match self {
            Slot::PreTask(_) | Slot::PostTask(_) => ComponentKind::Task,
            Slot::Reader => ComponentKind::Reader,
            Slot::Filter(_) => ComponentKind::Filter,
            Slot::Validator(_) => ComponentKind::Validator,
            Slot::Transformer(_) => ComponentKind::Transformer,
            Slot::Mapper => ComponentKind::Mapper,
            Slot::Writer(_) => ComponentKind::Writer,
        }
    }
}

/// Stages applied to every frame, in order
#[derive(Default)]
struct FrameStages {
    filters: Vec<Box<dyn FrameFilter>>,
    validators: Vec<Box<dyn FrameValidator>>,
    transformers: Vec<Box<dyn FrameTransform>>,
    mapper: Option<Box<dyn FrameMapper>>,
    writers: Vec<Box<dyn FrameWriter>>,
}

impl FrameStages {
    /// Filter, validate, transform, map and write one frame
    async fn process(&mut self, frame: Frame, context: &mut TransformContext) -> FrameOutcome {
        let mut transaction = TransactionContext::new(context, frame);

        for filter in self.filters.iter_mut() {
            let verdict = filter.evaluate(&transaction).await;
            match verdict {
                Ok(FilterVerdict::NoMatch) => continue,
                Ok(FilterVerdict::Accept) => break,
                Ok(FilterVerdict::Reject) => {
                    debug!("Frame rejected by {}", filter.name());
                    let dropped = transaction.into_output();
                    context.fire_frame_dropped(&dropped);
                    return FrameOutcome::Dropped;
                }
                Err(e) => {
                    report(transaction.context_mut(), ComponentKind::Filter, filter.name(), &e);
                    return FrameOutcome::Failed;
                }
            }
        }

        for validator in self.validators.iter_mut() {
            if let Err(e) = validator.validate(&mut transaction).await {
                let message = e.to_string();
                warn!("{} '{}' failed: {}", ComponentKind::Validator, validator.name(), message);
                transaction.fire_validation_failed(validator.name(), &message);
                if validator.halts_on_fail() {
                    transaction.context_mut().set_error(message);
                }
            }
        }
        if transaction.context().is_in_error() {
            return FrameOutcome::Aborted;
        }

        for transformer in self.transformers.iter_mut() {
            if let Err(e) = transformer.transform(&mut transaction).await {
                report(
                    transaction.context_mut(),
                    ComponentKind::Transformer,
                    transformer.name(),
                    &e,
                );
                return FrameOutcome::Failed;
            }
        }

        if let Some(mapper) = self.mapper.as_mut() {
            if let Err(e) = mapper.map(&mut transaction).await {
                report(transaction.context_mut(), ComponentKind::Mapper, mapper.name(), &e);
                return FrameOutcome::Failed;
            }
        }

        let (frame, context) = transaction.write_view();
        let mut delivered = false;
        for writer in self.writers.iter_mut() {
            let written = writer.write(frame, context).await;
            match written {
                Ok(()) => {
                    delivered = true;
                    context.fire_frame_written(frame);
                }
                Err(e) => {
                    warn!("{} '{}' failed: {}", ComponentKind::Writer, writer.name(), e);
                    context.fire_error(ComponentKind::Writer.as_ref(), &e.to_string());
                }
            }
        }
        if delivered {
            context.record_frame_written();
        }
        FrameOutcome::Written
    }
}

fn report(context: &mut TransformContext, kind: ComponentKind, name: &str, error: &StageError) {
    warn!("{} '{}' failed: {}", kind, name, error);
    context.fire_error(kind.as_ref(), &error.to_string());
}

/// Every registered component plus the global registration order
#[derive(Default)]
struct PipelineDefinition {
    pre_tasks: Vec<Box<dyn TransformTask>>,
    post_tasks: Vec<Box<dyn TransformTask>>,
    reader: Option<Box<dyn FrameReader>>,
    stages: FrameStages,
    order: Vec<Slot>,
}

impl PipelineDefinition {
    fn name(&self, slot: Slot) -> String {
        let name = match slot {
            Slot::PreTask(i) => self.pre_tasks.get(i).map(|c| c.name()),
            Slot::PostTask(i) => self.post_tasks.get(i).map(|c| c.name()),
            Slot::Reader => self.reader.as_ref().map(|c| c.name()),
            Slot::Filter(i) => self.stages.filters.get(i).map(|c| c.name()),
            Slot::Validator(i) => self.stages.validators.get(i).map(|c| c.name()),
            Slot::Transformer(i) => self.stages.transformers.get(i).map(|c| c.name()),
            Slot::Mapper => self.stages.mapper.as_ref().map(|c| c.name()),
            Slot::Writer(i) => self.stages.writers.get(i).map(|c| c.name()),
        };
        name.unwrap_or("<unset>").to_string()
    }

    async fn open(&mut self, slot: Slot, context: &mut TransformContext) -> Result<(), StageError> {
        match slot {
            Slot::PreTask(i) => match self.pre_tasks.get_mut(i) {
                Some(c) => c.open(context).await,
                None => Ok(()),
            },
            Slot::PostTask(i) => match self.post_tasks.get_mut(i) {
                Some(c) => c.open(context).await,
                None => Ok(()),
            },
            Slot::Reader => match self.reader.as_mut() {
                Some(c) => c.open(context).await,
                None => Ok(()),
            },
            Slot::Filter(i) => match self.stages.filters.get_mut(i) {
                Some(c) => c.open(context).await,
                None => Ok(()),
            },
            Slot::Validator(i) => match self.stages.validators.get_mut(i) {
                Some(c) => c.open(context).await,
                None => Ok(()),
            },
            Slot::Transformer(i) => match self.stages.transformers.get_mut(i) {
                Some(c) => c.open(context).await,
                None => Ok(()),
            },
            Slot::Mapper => match self.stages.mapper.as_mut() {
                Some(c) => c.open(context).await,
                None => Ok(()),
            },
            Slot::Writer(i) => match self.stages.writers.get_mut(i) {
                Some(c) => c.open(context).await,
                None => Ok(()),
            },
        }
    }

    async fn close(&mut self, slot: Slot) -> Result<(), StageError> {
        match slot {
            Slot::PreTask(i) => match self.pre_tasks.get_mut(i) {
                Some(c) => c.close().await,
                None => Ok(()),
            },
            Slot::PostTask(i) => match self.post_tasks.get_mut(i) {
                Some(c) => c.close().await,
                None => Ok(()),
            },
            Slot::Reader => match self.reader.as_mut() {
                Some(c) => c.close().await,
                None => Ok(()),
            },
            Slot::Filter(i) => match self.stages.filters.get_mut(i) {
                Some(c) => c.close().await,
                None => Ok(()),
            },
            Slot::Validator(i) => match self.stages.validators.get_mut(i) {
                Some(c) => c.close().await,
                None => Ok(()),
            },
            Slot::Transformer(i) => match self.stages.transformers.get_mut(i) {
                Some(c) => c.close().await,
                None => Ok(()),
            },
            Slot::Mapper => match self.stages.mapper.as_mut() {
                Some(c) => c.close().await,
                None => Ok(()),
            },
            Slot::Writer(i) => match self.stages.writers.get_mut(i) {
                Some(c) => c.close().await,
                None => Ok(()),
            },
        }
    }
}

/// Sticky error recorded when a run is cancelled
pub const CANCELLED_MESSAGE: &str = "Job cancelled";

/// Runs one job: a context plus ordered pipeline components
pub struct TransformEngine {
    context: TransformContext,
    pipeline: PipelineDefinition,
    state: EngineState,
    opened: Vec<Slot>,
    context_opened: bool,
    cancel: CancellationToken,
}

impl TransformEngine {
    pub fn new(context: TransformContext) -> Self {
        Self {
            context,
            pipeline: PipelineDefinition::default(),
            state: EngineState::Configured,
            opened: Vec::new(),
            context_opened: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Build an engine from a job definition
    ///
    /// Components are created through `factory`. A `[context]` section makes
    /// the context persistent; its dialects come from the standard registry.
    pub fn from_config(config: &JobConfig, factory: &ComponentFactory) -> EngineResult<Self> {
        let job_name = config.job.name.clone();
        let mut context = TransformContext::new(job_name.clone());
        if let Some(dir) = &config.job.job_dir {
            context = context.with_job_dir(dir.clone());
        }
        if let Some(dir) = &config.job.work_dir {
            context = context.with_work_dir(dir.clone());
        }
        for (key, value) in config.initial_symbols() {
            context.set_symbol(key, value);
        }

        if let Some(section) = &config.context {
            let dialects = Arc::new(DialectRegistry::standard().map_err(ContextError::from)?);
            context = context.with_renderer(dialects.renderer().clone());
            let store = DatabaseContext::from_config(job_name, section, dialects)?;
            context = context.with_store(Box::new(store));
        }

        let mut engine = Self::new(context);
        for spec in &config.pre_process {
            engine.add_pre_process_task(factory.create_task(spec)?);
        }
        if let Some(spec) = &config.reader {
            engine.set_reader(factory.create_reader(spec)?);
        }
        for spec in &config.filters {
            engine.add_filter(factory.create_filter(spec)?);
        }
        for spec in &config.validators {
            engine.add_validator(factory.create_validator(spec)?);
        }
        for spec in &config.transformers {
            engine.add_transformer(factory.create_transformer(spec)?);
        }
        if let Some(spec) = &config.mapper {
            engine.set_mapper(factory.create_mapper(spec)?);
        }
        for spec in &config.writers {
            engine.add_writer(factory.create_writer(spec)?);
        }
        for spec in &config.post_process {
            engine.add_post_process_task(factory.create_task(spec)?);
        }

        info!(
            "Built job '{}' with {} components",
            config.job.name,
            engine.pipeline.order.len()
        );
        Ok(engine)
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn context(&self) -> &TransformContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut TransformContext {
        &mut self.context
    }

    pub fn add_listener(&mut self, listener: Arc<dyn ContextListener>) {
        self.context.add_listener(listener);
    }

    /// Token that stops a run in progress
    ///
    /// Cancelling puts the context in error, so the frame loop ends as
    /// `Aborted`. Post-process tasks and teardown still run inside `run()`.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Append a task run before the frame loop; returns its execution index
    pub fn add_pre_process_task(&mut self, task: Box<dyn TransformTask>) -> usize {
        let index = self.pipeline.pre_tasks.len();
        self.pipeline.pre_tasks.push(task);
        self.pipeline.order.push(Slot::PreTask(index));
        index
    }

    /// Append a task run after the frame loop; returns its execution index
    pub fn add_post_process_task(&mut self, task: Box<dyn TransformTask>) -> usize {
        let index = self.pipeline.post_tasks.len();
        self.pipeline.post_tasks.push(task);
        self.pipeline.order.push(Slot::PostTask(index));
        index
    }

    pub fn set_reader(&mut self, reader: Box<dyn FrameReader>) {
        if let Some(previous) = self.pipeline.reader.replace(reader) {
            warn!("Replacing reader '{}'", previous.name());
        } else {
            self.pipeline.order.push(Slot::Reader);
        }
    }

    pub fn add_filter(&mut self, filter: Box<dyn FrameFilter>) -> usize {
        let index = self.pipeline.stages.filters.len();
        self.pipeline.stages.filters.push(filter);
        self.pipeline.order.push(Slot::Filter(index));
        index
    }

    pub fn add_validator(&mut self, validator: Box<dyn FrameValidator>) -> usize {
        let index = self.pipeline.stages.validators.len();
        self.pipeline.stages.validators.push(validator);
        self.pipeline.order.push(Slot::Validator(index));
        index
    }

    pub fn add_transformer(&mut self, transformer: Box<dyn FrameTransform>) -> usize {
        let index = self.pipeline.stages.transformers.len();
        self.pipeline.stages.transformers.push(transformer);
        self.pipeline.order.push(Slot::Transformer(index));
        index
    }

    pub fn set_mapper(&mut self, mapper: Box<dyn FrameMapper>) {
        if let Some(previous) = self.pipeline.stages.mapper.replace(mapper) {
            warn!("Replacing mapper '{}'", previous.name());
        } else {
            self.pipeline.order.push(Slot::Mapper);
        }
    }

    pub fn add_writer(&mut self, writer: Box<dyn FrameWriter>) -> usize {
        let index = self.pipeline.stages.writers.len();
        self.pipeline.stages.writers.push(writer);
        self.pipeline.order.push(Slot::Writer(index));
        index
    }

    /// Execute the whole job
    ///
    /// A job error (open failure or failing task) is returned after
    /// teardown; otherwise the outcome reports `Completed` or `Aborted`.
    /// Only a freshly configured engine can run.
    pub async fn run(&mut self) -> EngineResult<RunOutcome> {
        if self.state != EngineState::Configured {
            return Err(EngineError::invalid_state(EngineState::Configured, self.state));
        }

        let result = self.execute().await;
        if let Err(e) = &result {
            error!("Job '{}' failed: {}", self.context.job_name(), e);
            self.context.fire_error("job", &e.to_string());
        }
        self.shutdown().await;

        let status = result?;
        let outcome = self.outcome(status);
        self.context.fire_job_end(&outcome);
        Ok(outcome)
    }

    async fn execute(&mut self) -> EngineResult<RunStatus> {
        self.open().await?;
        self.state = EngineState::Opened;
        self.context.fire_job_start();

        self.state = EngineState::Running;
        self.run_tasks(TaskPhase::Pre).await?;
        let mut status = self.frame_loop().await;
        self.state = match status {
            RunStatus::Completed => EngineState::Completed,
            RunStatus::Aborted => EngineState::Aborted,
        };

        self.run_tasks(TaskPhase::Post).await?;
        if self.context.is_in_error() {
            status = RunStatus::Aborted;
        }
        Ok(status)
    }

    async fn open(&mut self) -> EngineResult<()> {
        self.context.open().await?;
        self.context_opened = true;

        for slot in self.pipeline.order.clone() {
            if let Err(source) = self.pipeline.open(slot, &mut self.context).await {
                return Err(EngineError::Open {
                    kind: slot.kind().to_string(),
                    component: self.pipeline.name(slot),
                    source,
                });
            }
            self.opened.push(slot);
        }
        debug!("Opened {} components", self.opened.len());
        Ok(())
    }

    async fn run_tasks(&mut self, phase: TaskPhase) -> EngineResult<()> {
        let tasks = match phase {
            TaskPhase::Pre => &mut self.pipeline.pre_tasks,
            TaskPhase::Post => &mut self.pipeline.post_tasks,
        };
        for task in tasks.iter_mut() {
            debug!("Running {} task '{}'", phase, task.name());
            if let Err(source) = task.execute(&mut self.context).await {
                return Err(EngineError::Task {
                    phase: phase.to_string(),
                    task: task.name().to_string(),
                    source,
                });
            }
        }
        Ok(())
    }

    async fn frame_loop(&mut self) -> RunStatus {
        let PipelineDefinition { reader, stages, .. } = &mut self.pipeline;
        let context = &mut self.context;
        let cancel = &self.cancel;

        let Some(reader) = reader.as_mut() else {
            debug!("No reader configured, skipping frame loop");
            if cancel.is_cancelled() {
                context.set_error(CANCELLED_MESSAGE);
            }
            return if context.is_in_error() {
                RunStatus::Aborted
            } else {
                RunStatus::Completed
            };
        };

        loop {
            if cancel.is_cancelled() {
                context.set_error(CANCELLED_MESSAGE);
            }
            if context.is_in_error() {
                return RunStatus::Aborted;
            }

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = reader.read(context) => Some(next),
            };
            let Some(next) = next else {
                warn!("Job '{}' cancelled while reading", context.job_name());
                context.set_error(CANCELLED_MESSAGE);
                return RunStatus::Aborted;
            };
            let frame = match next {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    warn!("{} '{}' failed: {}", ComponentKind::Reader, reader.name(), e);
                    context.fire_error(ComponentKind::Reader.as_ref(), &e.to_string());
                    continue;
                }
            };
            context.fire_frame_read(&frame);

            if stages.process(frame, context).await == FrameOutcome::Aborted {
                warn!(
                    "Job '{}' aborted: {}",
                    context.job_name(),
                    context.error_message().unwrap_or_default()
                );
                return RunStatus::Aborted;
            }
        }

        if context.is_in_error() {
            RunStatus::Aborted
        } else {
            RunStatus::Completed
        }
    }

    /// Tear down everything that was opened; later calls do nothing
    ///
    /// Components close in reverse of open order and the context closes
    /// last. Close failures are logged so every component still gets its
    /// close attempt.
    pub async fn shutdown(&mut self) {
        if self.state == EngineState::Closed {
            return;
        }

        while let Some(slot) = self.opened.pop() {
            if let Err(e) = self.pipeline.close(slot).await {
                error!(
                    "Failed to close {} '{}': {}",
                    slot.kind(),
                    self.pipeline.name(slot),
                    e
                );
            }
        }

        if self.context_opened {
            self.context_opened = false;
            if let Err(e) = self.context.close().await {
                error!("Failed to close context for job '{}': {}", self.context.job_name(), e);
            }
        }

        self.state = EngineState::Closed;
        debug!("Job '{}' closed", self.context.job_name());
    }

    fn outcome(&self, status: RunStatus) -> RunOutcome {
        RunOutcome {
            run_id: self.context.run_id(),
            job: self.context.job_name().to_string(),
            status,
            error_message: self.context.error_message().map(str::to_string),
            counters: *self.context.counters(),
            started_at: self.context.started_at(),
            ended_at: self.context.ended_at(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::filter::{FilterCondition, Reject};
    use crate::component::reader::MemoryReader;
    use crate::component::task::SetSymbol;
    use crate::component::validate::{NotNull, ValidatorSettings};
    use crate::component::Component;
    use crate::errors::{ReadError, TaskError, WriteError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Writer that records every frame id and lifecycle call
    struct Recorder {
        log: Log,
    }

    #[async_trait]
    impl Component for Recorder {
        fn name(&self) -> &str {
            "Recorder"
        }

        async fn open(&mut self, _context: &mut TransformContext) -> Result<(), StageError> {
            self.log.lock().unwrap().push("open".into());
            Ok(())
        }

        async fn close(&mut self) -> Result<(), StageError> {
            self.log.lock().unwrap().push("close".into());
            Ok(())
        }
    }

    #[async_trait]
    impl FrameWriter for Recorder {
        async fn write(&mut self, frame: &Frame, _context: &mut TransformContext) -> Result<(), WriteError> {
            self.log.lock().unwrap().push(frame.get("id").map(|v| v.to_text()).unwrap_or_default());
            Ok(())
        }
    }

    struct FailingTask;

    #[async_trait]
    impl Component for FailingTask {
        fn name(&self) -> &str {
            "FailingTask"
        }
    }

    #[async_trait]
    impl TransformTask for FailingTask {
        async fn execute(&mut self, _context: &mut TransformContext) -> Result<(), TaskError> {
            Err(TaskError::new("boom"))
        }
    }

    struct FlakyReader {
        calls: usize,
    }

    #[async_trait]
    impl Component for FlakyReader {
        fn name(&self) -> &str {
            "FlakyReader"
        }
    }

    #[async_trait]
    impl FrameReader for FlakyReader {
        async fn read(&mut self, _context: &mut TransformContext) -> Result<Option<Frame>, ReadError> {
            self.calls += 1;
            match self.calls {
                1 => Err(ReadError::new("bad line")),
                2 => Ok(Some(Frame::new().with("id", 7))),
                _ => Ok(None),
            }
        }
    }

    /// Reader that cancels the run on its second read and then never returns
    struct StallingReader {
        calls: usize,
        cancel: CancellationToken,
    }

    #[async_trait]
    impl Component for StallingReader {
        fn name(&self) -> &str {
            "StallingReader"
        }
    }

    #[async_trait]
    impl FrameReader for StallingReader {
        async fn read(&mut self, _context: &mut TransformContext) -> Result<Option<Frame>, ReadError> {
            self.calls += 1;
            if self.calls == 1 {
                return Ok(Some(Frame::new().with("id", 1)));
            }
            self.cancel.cancel();
            std::future::pending().await
        }
    }

    fn frames(ids: &[i32]) -> Box<MemoryReader> {
        Box::new(MemoryReader::new(ids.iter().map(|id| Frame::new().with("id", *id))))
    }

    #[tokio::test]
    async fn test_frames_flow_to_writer_and_engine_closes() {
        let log = Log::default();
        let mut engine = TransformEngine::new(TransformContext::new("job"));
        engine.set_reader(frames(&[1, 2]));
        engine.add_writer(Box::new(Recorder { log: log.clone() }));

        let outcome = engine.run().await.unwrap();

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.counters.frames_read, 2);
        assert_eq!(outcome.counters.frames_written, 2);
        assert_eq!(engine.state(), EngineState::Closed);
        assert_eq!(*log.lock().unwrap(), vec!["open", "1", "2", "close"]);
    }

    #[tokio::test]
    async fn test_frames_are_counted_once_across_writers() {
        let log = Log::default();
        let mut engine = TransformEngine::new(TransformContext::new("job"));
        engine.set_reader(frames(&[1, 2]));
        engine.add_writer(Box::new(Recorder { log: log.clone() }));
        engine.add_writer(Box::new(Recorder { log: log.clone() }));

        let outcome = engine.run().await.unwrap();

        assert_eq!(outcome.counters.frames_written, 2);
        assert_eq!(outcome.counters.writes, 4);
    }

    #[tokio::test]
    async fn test_cancelling_a_stalled_read_still_tears_down() {
        let log = Log::default();
        let mut engine = TransformEngine::new(TransformContext::new("job"));
        let cancel = engine.cancellation_token();
        engine.set_reader(Box::new(StallingReader { calls: 0, cancel }));
        engine.add_writer(Box::new(Recorder { log: log.clone() }));
        engine.add_post_process_task(Box::new(SetSymbol::new("status", "stopped")));

        let outcome = engine.run().await.unwrap();

        assert_eq!(outcome.status, RunStatus::Aborted);
        assert_eq!(outcome.error_message.as_deref(), Some(CANCELLED_MESSAGE));
        assert_eq!(*log.lock().unwrap(), vec!["open", "1", "close"]);
        assert_eq!(
            engine.context().symbol("status").map(|v| v.to_text()),
            Some("stopped".to_string())
        );
        assert_eq!(engine.state(), EngineState::Closed);
    }

    #[tokio::test]
    async fn test_cancelled_before_run_reads_nothing() {
        let log = Log::default();
        let mut engine = TransformEngine::new(TransformContext::new("job"));
        engine.set_reader(frames(&[1, 2]));
        engine.add_writer(Box::new(Recorder { log: log.clone() }));
        engine.cancellation_token().cancel();

        let outcome = engine.run().await.unwrap();

        assert_eq!(outcome.status, RunStatus::Aborted);
        assert_eq!(outcome.counters.frames_read, 0);
        assert_eq!(*log.lock().unwrap(), vec!["open", "close"]);
    }

    #[tokio::test]
    async fn test_reject_filter_drops_frames() {
        let log = Log::default();
        let mut engine = TransformEngine::new(TransformContext::new("job"));
        engine.set_reader(frames(&[1, 2, 3]));
        engine.add_filter(Box::new(Reject::new(FilterCondition::matching("id", regex::Regex::new("^2$").unwrap()))));
        engine.add_writer(Box::new(Recorder { log: log.clone() }));

        let outcome = engine.run().await.unwrap();

        assert_eq!(outcome.counters.frames_dropped, 1);
        assert_eq!(*log.lock().unwrap(), vec!["open", "1", "3", "close"]);
    }

    #[tokio::test]
    async fn test_halting_validator_aborts_before_write() {
        let log = Log::default();
        let mut engine = TransformEngine::new(TransformContext::new("job"));
        engine.set_reader(Box::new(MemoryReader::new([
            Frame::new().with("id", 1),
            Frame::new().with("other", 2),
            Frame::new().with("id", 3),
        ])));
        engine.add_validator(Box::new(NotNull::new(ValidatorSettings::for_field("id").halting(true))));
        engine.add_writer(Box::new(Recorder { log: log.clone() }));

        let outcome = engine.run().await.unwrap();

        assert_eq!(outcome.status, RunStatus::Aborted);
        assert!(outcome.error_message.is_some());
        assert_eq!(*log.lock().unwrap(), vec!["open", "1", "close"]);
    }

    #[tokio::test]
    async fn test_read_errors_are_reported_and_skipped() {
        let log = Log::default();
        let mut engine = TransformEngine::new(TransformContext::new("job"));
        engine.set_reader(Box::new(FlakyReader { calls: 0 }));
        engine.add_writer(Box::new(Recorder { log: log.clone() }));

        let outcome = engine.run().await.unwrap();

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.counters.errors, 1);
        assert_eq!(*log.lock().unwrap(), vec!["open", "7", "close"]);
    }

    #[tokio::test]
    async fn test_failing_pre_task_is_a_job_error_and_still_closes() {
        let log = Log::default();
        let mut engine = TransformEngine::new(TransformContext::new("job"));
        engine.add_writer(Box::new(Recorder { log: log.clone() }));
        engine.add_pre_process_task(Box::new(FailingTask));

        let result = engine.run().await;

        assert!(matches!(result, Err(EngineError::Task { ref phase, .. }) if phase == "pre-process"));
        assert_eq!(*log.lock().unwrap(), vec!["open", "close"]);
        assert_eq!(engine.state(), EngineState::Closed);
    }

    #[tokio::test]
    async fn test_second_run_is_rejected() {
        let mut engine = TransformEngine::new(TransformContext::new("job"));
        engine.run().await.unwrap();

        assert!(matches!(engine.run().await, Err(EngineError::InvalidState { .. })));
    }

    #[test]
    fn test_add_operations_return_positions() {
        let mut engine = TransformEngine::new(TransformContext::new("job"));
        assert_eq!(engine.add_pre_process_task(Box::new(FailingTask)), 0);
        assert_eq!(engine.add_pre_process_task(Box::new(FailingTask)), 1);
        assert_eq!(engine.add_post_process_task(Box::new(FailingTask)), 0);
    }
}
