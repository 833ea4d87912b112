//! Component Factory
//!
//! Creates configured components from job configuration entries by type
//! name. The built-in components are registered by default; applications
//! register their own constructors under new names.

use std::collections::HashMap;
use tracing::debug;

use super::filter::{Accept, Reject};
use super::mapper::DefaultMapper;
use super::reader::{JsonLinesReader, MemoryReader};
use super::task::SetSymbol;
use super::transform::{Remove, Set};
use super::validate::{NotEmpty, NotNull, Pattern};
use super::writer::JsonLinesWriter;
use super::{
    Component, ComponentKind, FrameFilter, FrameMapper, FrameReader, FrameTransform,
    FrameValidator, FrameWriter, TransformTask,
};
use crate::config::ComponentSpec;
use crate::errors::ConfigError;

type Constructor<T> = Box<dyn Fn() -> Box<T> + Send + Sync>;

/// Name to constructor registry for every component kind
///
/// Type names are matched case-insensitively.
pub struct ComponentFactory {
    readers: HashMap<String, Constructor<dyn FrameReader>>,
    filters: HashMap<String, Constructor<dyn FrameFilter>>,
    validators: HashMap<String, Constructor<dyn FrameValidator>>,
    transformers: HashMap<String, Constructor<dyn FrameTransform>>,
    mappers: HashMap<String, Constructor<dyn FrameMapper>>,
    writers: HashMap<String, Constructor<dyn FrameWriter>>,
    tasks: HashMap<String, Constructor<dyn TransformTask>>,
}

impl Default for ComponentFactory {
    fn default() -> Self {
        let mut factory = Self::empty();
        factory.register_reader("JsonLinesReader", || Box::new(JsonLinesReader::default()));
        factory.register_reader("MemoryReader", || Box::new(MemoryReader::default()));
        factory.register_filter("Accept", || Box::new(Accept::default()));
        factory.register_filter("Reject", || Box::new(Reject::default()));
        factory.register_validator("NotNull", || Box::new(NotNull::default()));
        factory.register_validator("NotEmpty", || Box::new(NotEmpty::default()));
        factory.register_validator("Pattern", || Box::new(Pattern::default()));
        factory.register_transformer("Set", || Box::new(Set::default()));
        factory.register_transformer("Remove", || Box::new(Remove::default()));
        factory.register_mapper("DefaultMapper", || Box::new(DefaultMapper::default()));
        factory.register_writer("JsonLinesWriter", || Box::new(JsonLinesWriter::default()));
        factory.register_task("SetSymbol", || Box::new(SetSymbol::default()));
        factory
    }
}

fn key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

fn build<T>(
    registry: &HashMap<String, Constructor<T>>,
    kind: ComponentKind,
    spec: &ComponentSpec,
) -> Result<Box<T>, ConfigError>
where
    T: Component + ?Sized,
{
    let constructor = registry
        .get(&key(&spec.kind))
        .ok_or_else(|| ConfigError::UnknownComponent {
            kind: kind.to_string(),
            name: spec.kind.clone(),
        })?;
    let mut component = constructor();
    component.configure(&spec.to_config())?;
    debug!("Configured {} '{}'", kind, component.name());
    Ok(component)
}

impl ComponentFactory {
    /// Factory that knows no components
    pub fn empty() -> Self {
        Self {
            readers: HashMap::new(),
            filters: HashMap::new(),
            validators: HashMap::new(),
            transformers: HashMap::new(),
            mappers: HashMap::new(),
            writers: HashMap::new(),
            tasks: HashMap::new(),
        }
    }

    pub fn register_reader<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn() -> Box<dyn FrameReader> + Send + Sync + 'static,
    {
        self.readers.insert(key(name), Box::new(constructor));
    }

    pub fn register_filter<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn() -> Box<dyn FrameFilter> + Send + Sync + 'static,
    {
        self.filters.insert(key(name), Box::new(constructor));
    }

    pub fn register_validator<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn() -> Box<dyn FrameValidator> + Send + Sync + 'static,
    {
        self.validators.insert(key(name), Box::new(constructor));
    }

    pub fn register_transformer<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn() -> Box<dyn FrameTransform> + Send + Sync + 'static,
    {
        self.transformers.insert(key(name), Box::new(constructor));
    }

    pub fn register_mapper<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn() -> Box<dyn FrameMapper> + Send + Sync + 'static,
    {
        self.mappers.insert(key(name), Box::new(constructor));
    }

    pub fn register_writer<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn() -> Box<dyn FrameWriter> + Send + Sync + 'static,
    {
        self.writers.insert(key(name), Box::new(constructor));
    }

    pub fn register_task<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn() -> Box<dyn TransformTask> + Send + Sync + 'static,
    {
        self.tasks.insert(key(name), Box::new(constructor));
    }

    pub fn create_reader(&self, spec: &ComponentSpec) -> Result<Box<dyn FrameReader>, ConfigError> {
        build(&self.readers, ComponentKind::Reader, spec)
    }

    pub fn create_filter(&self, spec: &ComponentSpec) -> Result<Box<dyn FrameFilter>, ConfigError> {
        build(&self.filters, ComponentKind::Filter, spec)
    }

    pub fn create_validator(&self, spec: &ComponentSpec) -> Result<Box<dyn FrameValidator>, ConfigError> {
        build(&self.validators, ComponentKind::Validator, spec)
    }

    pub fn create_transformer(&self, spec: &ComponentSpec) -> Result<Box<dyn FrameTransform>, ConfigError> {
        build(&self.transformers, ComponentKind::Transformer, spec)
    }

    pub fn create_mapper(&self, spec: &ComponentSpec) -> Result<Box<dyn FrameMapper>, ConfigError> {
        build(&self.mappers, ComponentKind::Mapper, spec)
    }

    pub fn create_writer(&self, spec: &ComponentSpec) -> Result<Box<dyn FrameWriter>, ConfigError> {
        build(&self.writers, ComponentKind::Writer, spec)
    }

    pub fn create_task(&self, spec: &ComponentSpec) -> Result<Box<dyn TransformTask>, ConfigError> {
        build(&self.tasks, ComponentKind::Task, spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(kind: &str, settings: serde_json::Value) -> ComponentSpec {
        let mut spec = ComponentSpec::new(kind);
        if let serde_json::Value::Object(map) = settings {
            spec.settings = map;
        }
        spec
    }

    #[test]
    fn test_builtins_are_created_case_insensitively() {
        let factory = ComponentFactory::default();
        let validator = factory
            .create_validator(&spec("notnull", json!({"field": "id"})))
            .unwrap();
        assert_eq!(validator.name(), "NotNull");
    }

    #[test]
    fn test_unknown_type_is_reported_with_kind() {
        let factory = ComponentFactory::default();
        let result = factory.create_writer(&spec("ParquetWriter", json!({})));
        assert!(matches!(
            result,
            Err(ConfigError::UnknownComponent { kind, name }) if kind == "writer" && name == "ParquetWriter"
        ));
    }

    #[test]
    fn test_configuration_errors_surface() {
        let factory = ComponentFactory::default();
        let result = factory.create_transformer(&spec("Set", json!({"value": "x"})));
        assert!(matches!(result, Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_custom_registration() {
        let mut factory = ComponentFactory::empty();
        assert!(factory.create_task(&spec("SetSymbol", json!({"symbol": "a"}))).is_err());

        factory.register_task("SetSymbol", || Box::new(SetSymbol::default()));
        assert!(factory.create_task(&spec("SetSymbol", json!({"symbol": "a"}))).is_ok());
    }
}
