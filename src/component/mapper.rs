//! Default field mapper

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::trace;

use super::{Component, FrameMapper};
use crate::config::ComponentConfig;
use crate::context::TransactionContext;
use crate::errors::{ConfigError, StageError};
use crate::frame::Frame;

/// Source field to target field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub source: String,
    pub target: String,
}

impl FieldMapping {
    pub fn new<S: Into<String>, T: Into<String>>(source: S, target: T) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Builds the target frame from the listed field mappings, in order
///
/// With no mappings the whole working frame is copied. Source fields absent
/// from a frame are skipped.
#[derive(Debug, Default)]
pub struct DefaultMapper {
    fields: Vec<FieldMapping>,
}

impl DefaultMapper {
    pub fn new(fields: Vec<FieldMapping>) -> Self {
        Self { fields }
    }

    fn parse_mapping(config: &ComponentConfig, entry: &JsonValue) -> Result<FieldMapping, ConfigError> {
        match entry {
            JsonValue::String(name) => Ok(FieldMapping::new(name.clone(), name.clone())),
            JsonValue::Object(map) => {
                let source = map
                    .get("source")
                    .and_then(JsonValue::as_str)
                    .ok_or_else(|| ConfigError::missing(config.name(), "fields.source"))?;
                let target = map
                    .get("target")
                    .and_then(JsonValue::as_str)
                    .unwrap_or(source);
                Ok(FieldMapping::new(source, target))
            }
            other => Err(ConfigError::invalid(
                config.name(),
                "fields",
                format!("unsupported mapping entry {other}"),
            )),
        }
    }
}

#[async_trait]
impl Component for DefaultMapper {
    fn name(&self) -> &str {
        "DefaultMapper"
    }

    fn configure(&mut self, config: &ComponentConfig) -> Result<(), ConfigError> {
        self.fields = match config.get_array("fields") {
            Some(entries) => entries
                .iter()
                .map(|entry| Self::parse_mapping(config, entry))
                .collect::<Result<_, _>>()?,
            None => Vec::new(),
        };
        Ok(())
    }
}

#[async_trait]
impl FrameMapper for DefaultMapper {
    async fn map(&mut self, transaction: &mut TransactionContext<'_>) -> Result<(), StageError> {
        let source = transaction.source_frame();
        let target = if self.fields.is_empty() {
            source.clone()
        } else {
            let mut target = Frame::new();
            for mapping in &self.fields {
                match source.get(&mapping.source) {
                    Some(value) => {
                        target.set(mapping.target.clone(), value.clone());
                    }
                    None => trace!("No '{}' field to map", mapping.source),
                }
            }
            target
        };
        transaction.set_target_frame(target);
        Ok(())
    }
}
