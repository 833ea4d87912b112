//! Built-in frame transformers

use async_trait::async_trait;
use tracing::trace;

use super::{Component, FrameTransform};
use crate::config::ComponentConfig;
use crate::context::TransactionContext;
use crate::errors::{ConfigError, StageError};
use crate::frame::FieldValue;

/// Sets `field` to `value`, rendered against the job symbols and the
/// working frame's fields
#[derive(Debug, Default)]
pub struct Set {
    field: String,
    value: String,
}

impl Set {
    pub fn new<F: Into<String>, V: Into<String>>(field: F, value: V) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

#[async_trait]
impl Component for Set {
    fn name(&self) -> &str {
        "Set"
    }

    fn configure(&mut self, config: &ComponentConfig) -> Result<(), ConfigError> {
        self.field = config.require_str("field")?;
        self.value = config.get_str("value").unwrap_or_default();
        Ok(())
    }
}

#[async_trait]
impl FrameTransform for Set {
    async fn transform(&mut self, transaction: &mut TransactionContext<'_>) -> Result<(), StageError> {
        if self.field.is_empty() {
            return Err(StageError::new("Set transformer has no field configured"));
        }
        let value = transaction.resolve(&self.value);
        trace!("Set {} = '{}'", self.field, value);
        transaction
            .source_frame_mut()
            .set(self.field.clone(), FieldValue::Str(value));
        Ok(())
    }
}

/// Removes `field` from the working frame
#[derive(Debug, Default)]
pub struct Remove {
    field: String,
}

impl Remove {
    pub fn new<F: Into<String>>(field: F) -> Self {
        Self {
            field: field.into(),
        }
    }
}

#[async_trait]
impl Component for Remove {
    fn name(&self) -> &str {
        "Remove"
    }

    fn configure(&mut self, config: &ComponentConfig) -> Result<(), ConfigError> {
        self.field = config.require_str("field")?;
        Ok(())
    }
}

#[async_trait]
impl FrameTransform for Remove {
    async fn transform(&mut self, transaction: &mut TransactionContext<'_>) -> Result<(), StageError> {
        transaction.source_frame_mut().remove(&self.field);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TransformContext;
    use crate::frame::Frame;

    #[tokio::test]
    async fn test_set_renders_symbols_and_fields() {
        let mut context = TransformContext::new("job");
        context.set_symbol("region", "eu");
        let mut transaction = TransactionContext::new(
            &mut context,
            Frame::new().with("id", 7).with("label", "old"),
        );

        Set::new("label", "[#$region#]-[#$id#]")
            .transform(&mut transaction)
            .await
            .unwrap();

        let frame = transaction.source_frame();
        assert_eq!(frame.get("label"), Some(&FieldValue::from("eu-7")));
        assert_eq!(frame.names().collect::<Vec<_>>(), vec!["id", "label"]);
    }

    #[tokio::test]
    async fn test_remove_field() {
        let mut context = TransformContext::new("job");
        let mut transaction = TransactionContext::new(&mut context, Frame::new().with("a", 1).with("b", 2));

        Remove::new("a").transform(&mut transaction).await.unwrap();

        assert!(!transaction.source_frame().contains("a"));
    }

    #[test]
    fn test_set_requires_field() {
        let result = Set::default().configure(&ComponentConfig::new("Set").with("value", "x"));
        assert!(matches!(result, Err(ConfigError::Missing { .. })));
    }
}
