//! Job-wide execution context

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::keys;
use super::listener::ContextListener;
use crate::engine::RunOutcome;
use crate::errors::ContextResult;
use crate::frame::{FieldValue, Frame};
use crate::template::{PlaceholderRenderer, SymbolTable, TemplateRenderer};

/// Durable backing for a context's symbol table
///
/// `open` loads persisted symbols before the run starts; `close` writes the
/// persistent subset back when the run ends.
#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn open(&mut self, symbols: &mut SymbolTable, started_at: DateTime<Utc>)
        -> ContextResult<()>;

    async fn close(&mut self, symbols: &mut SymbolTable, started_at: DateTime<Utc>)
        -> ContextResult<()>;
}

/// Per-run counters reported in the run outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    pub frames_read: u64,
    pub frames_dropped: u64,
    /// Frames accepted by at least one writer
    pub frames_written: u64,
    /// Successful writer calls, one per writer per frame
    pub writes: u64,
    pub validation_failures: u64,
    pub errors: u64,
}

/// State shared by every component for the duration of one job run
///
/// Holds the symbol table, untyped job attributes, the job and work
/// directories, the sticky error, listeners and run counters. Backed by a
/// [`ContextStore`] when the symbol table is persisted between runs.
pub struct TransformContext {
    job_name: String,
    run_id: Uuid,
    symbols: SymbolTable,
    attributes: HashMap<String, Box<dyn Any + Send + Sync>>,
    job_dir: Option<PathBuf>,
    work_dir: Option<PathBuf>,
    error: Option<String>,
    listeners: Vec<Arc<dyn ContextListener>>,
    counters: RunCounters,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    renderer: Arc<dyn TemplateRenderer>,
    store: Option<Box<dyn ContextStore>>,
    open: bool,
}

impl std::fmt::Debug for TransformContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformContext")
            .field("job_name", &self.job_name)
            .field("run_id", &self.run_id)
            .field("symbols", &self.symbols)
            .field("error", &self.error)
            .field("counters", &self.counters)
            .field("persisted", &self.store.is_some())
            .field("open", &self.open)
            .finish()
    }
}

impl TransformContext {
    /// In-memory context for the named job
    pub fn new<N: Into<String>>(job_name: N) -> Self {
        Self {
            job_name: job_name.into(),
            run_id: Uuid::new_v4(),
            symbols: SymbolTable::new(),
            attributes: HashMap::new(),
            job_dir: None,
            work_dir: None,
            error: None,
            listeners: Vec::new(),
            counters: RunCounters::default(),
            started_at: None,
            ended_at: None,
            renderer: Arc::new(PlaceholderRenderer),
            store: None,
            open: false,
        }
    }

    pub fn with_job_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.job_dir = Some(dir.into());
        self
    }

    pub fn with_work_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Persist the symbol table through the given store
    pub fn with_store(mut self, store: Box<dyn ContextStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn job_dir(&self) -> Option<&Path> {
        self.job_dir.as_deref()
    }

    pub fn work_dir(&self) -> Option<&Path> {
        self.work_dir.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_persisted(&self) -> bool {
        self.store.is_some()
    }

    /// Acquire the context's resources
    ///
    /// Creates the job and work directories, publishes the engine symbols
    /// (`jobname`, `runid`, `jobdir`, `workdir`) and loads the backing store.
    /// Calling `open` on an open context does nothing.
    pub async fn open(&mut self) -> ContextResult<()> {
        if self.open {
            return Ok(());
        }

        let started_at = Utc::now();
        self.started_at = Some(started_at);
        self.ended_at = None;

        for dir in [&self.job_dir, &self.work_dir].into_iter().flatten() {
            if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
                tokio::fs::create_dir_all(dir).await?;
                debug!("Created directory {}", dir.display());
            }
        }

        self.symbols
            .insert_transient(keys::JOB_NAME, self.job_name.clone());
        self.symbols
            .insert_transient(keys::RUN_ID, self.run_id.to_string());
        if let Some(dir) = &self.job_dir {
            self.symbols
                .insert_transient(keys::JOB_DIR, dir.display().to_string());
        }
        if let Some(dir) = &self.work_dir {
            self.symbols
                .insert_transient(keys::WORK_DIR, dir.display().to_string());
        }

        if let Some(store) = self.store.as_mut() {
            store.open(&mut self.symbols, started_at).await?;
        }

        self.open = true;
        debug!("Opened context for job '{}'", self.job_name);
        Ok(())
    }

    /// Flush and release the context's resources; effective once per open
    pub async fn close(&mut self) -> ContextResult<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;

        let started_at = self.started_at.unwrap_or_else(Utc::now);
        self.ended_at = Some(Utc::now());

        if let Some(store) = self.store.as_mut() {
            store.close(&mut self.symbols, started_at).await?;
        }

        debug!("Closed context for job '{}'", self.job_name);
        Ok(())
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    pub fn symbol(&self, key: &str) -> Option<&FieldValue> {
        self.symbols.get(key)
    }

    pub fn set_symbol<K: Into<String>, V: Into<FieldValue>>(&mut self, key: K, value: V) {
        self.symbols.set(key, value);
    }

    /// Record the job error; only the first call for a run takes effect
    pub fn set_error<M: Into<String>>(&mut self, message: M) {
        let message = message.into();
        match &self.error {
            None => {
                info!("Job '{}' in error: {}", self.job_name, message);
                self.error = Some(message);
            }
            Some(existing) => {
                warn!(
                    "Ignoring error '{}' for job '{}'; already in error: {}",
                    message, self.job_name, existing
                );
            }
        }
    }

    pub fn is_in_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Typed access to a job-scoped attribute
    pub fn attribute<T: Any>(&self, key: &str) -> Option<&T> {
        self.attributes.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn attribute_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.attributes
            .get_mut(key)
            .and_then(|v| v.downcast_mut::<T>())
    }

    pub fn set_attribute<K: Into<String>, T: Any + Send + Sync>(&mut self, key: K, value: T) {
        self.attributes.insert(key.into(), Box::new(value));
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<Box<dyn Any + Send + Sync>> {
        self.attributes.remove(key)
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Render a template against the symbol table
    pub fn resolve(&self, template: &str) -> String {
        self.renderer.render(template, &self.symbols)
    }

    pub fn renderer(&self) -> &Arc<dyn TemplateRenderer> {
        &self.renderer
    }

    pub fn add_listener(&mut self, listener: Arc<dyn ContextListener>) {
        self.listeners.push(listener);
    }

    pub fn listeners(&self) -> &[Arc<dyn ContextListener>] {
        &self.listeners
    }

    pub fn counters(&self) -> &RunCounters {
        &self.counters
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn fire_job_start(&self) {
        for listener in &self.listeners {
            listener.on_job_start(self);
        }
    }

    pub fn fire_job_end(&self, outcome: &RunOutcome) {
        for listener in &self.listeners {
            listener.on_job_end(outcome);
        }
    }

    pub fn fire_frame_read(&mut self, frame: &Frame) {
        self.counters.frames_read += 1;
        for listener in &self.listeners {
            listener.on_frame_read(frame);
        }
    }

    pub fn fire_frame_dropped(&mut self, frame: &Frame) {
        self.counters.frames_dropped += 1;
        for listener in &self.listeners {
            listener.on_frame_dropped(frame);
        }
    }

    /// Notify listeners that `source` rejected the current frame
    pub fn fire_validation_failed(&mut self, source: &str, message: &str) {
        self.counters.validation_failures += 1;
        for listener in &self.listeners {
            listener.on_validation_failed(source, message);
        }
    }

    /// Notify listeners that one writer accepted `frame`
    pub fn fire_frame_written(&mut self, frame: &Frame) {
        self.counters.writes += 1;
        for listener in &self.listeners {
            listener.on_frame_written(frame);
        }
    }

    /// Count a frame that reached at least one writer
    pub fn record_frame_written(&mut self) {
        self.counters.frames_written += 1;
    }

    pub fn fire_error(&mut self, stage: &str, message: &str) {
        self.counters.errors += 1;
        for listener in &self.listeners {
            listener.on_error(stage, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Failures(Mutex<Vec<(String, String)>>);

    impl ContextListener for Failures {
        fn on_validation_failed(&self, source: &str, message: &str) {
            self.0
                .lock()
                .unwrap()
                .push((source.to_string(), message.to_string()));
        }
    }

    #[test]
    fn test_first_error_wins() {
        let mut context = TransformContext::new("job");
        assert!(!context.is_in_error());

        context.set_error("first");
        context.set_error("second");

        assert!(context.is_in_error());
        assert_eq!(context.error_message(), Some("first"));
    }

    #[test]
    fn test_attributes_are_typed_on_read() {
        let mut context = TransformContext::new("job");
        context.set_attribute("batch", 42usize);

        assert_eq!(context.attribute::<usize>("batch"), Some(&42));
        assert_eq!(context.attribute::<String>("batch"), None);
        *context.attribute_mut::<usize>("batch").unwrap() += 1;
        assert_eq!(context.attribute::<usize>("batch"), Some(&43));
    }

    #[test]
    fn test_validation_failures_reach_every_listener() {
        let first = Arc::new(Failures::default());
        let second = Arc::new(Failures::default());
        let mut context = TransformContext::new("job");
        context.add_listener(first.clone());
        context.add_listener(second.clone());

        context.fire_validation_failed("NotNull", "name is null");

        assert_eq!(first.0.lock().unwrap().len(), 1);
        assert_eq!(second.0.lock().unwrap()[0].1, "name is null");
        assert_eq!(context.counters().validation_failures, 1);
    }

    #[tokio::test]
    async fn test_open_creates_directories_and_engine_symbols() {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("work").join("nightly");
        let mut context = TransformContext::new("nightly-import").with_work_dir(&work);
        context.set_symbol("region", "eu");

        context.open().await.unwrap();

        assert!(work.is_dir());
        assert_eq!(context.resolve("[#$jobname#]/[#$region#]"), "nightly-import/eu");
        assert!(context.symbols().is_transient(keys::WORK_DIR));
        assert!(context.started_at().is_some());

        context.close().await.unwrap();
        context.close().await.unwrap();
        assert!(context.ended_at().is_some());
        assert!(!context.is_open());
    }
}
