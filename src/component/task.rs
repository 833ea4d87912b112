//! Built-in pre/post-process tasks

use async_trait::async_trait;
use tracing::{debug, error};

use super::{Component, TransformTask};
use crate::config::ComponentConfig;
use crate::context::TransformContext;
use crate::errors::{ConfigError, TaskError};
use crate::expression;
use crate::frame::FieldValue;

/// Sets `symbol` to `value` rendered against the symbol table
///
/// When `value` is blank, `evaluate` is rendered the same way and evaluated
/// as an expression, storing a `DBL` or `BOL`. With neither setting, or
/// with an expression that does not evaluate, the task logs an error and
/// leaves the symbol table untouched; it does not fail the job.
#[derive(Debug, Default)]
pub struct SetSymbol {
    symbol: String,
    value: Option<String>,
    expression: Option<String>,
}

impl SetSymbol {
    pub fn new<S: Into<String>, V: Into<String>>(symbol: S, value: V) -> Self {
        Self {
            symbol: symbol.into(),
            value: Some(value.into()),
            expression: None,
        }
    }

    pub fn evaluating<S: Into<String>, E: Into<String>>(symbol: S, expression: E) -> Self {
        Self {
            symbol: symbol.into(),
            value: None,
            expression: Some(expression.into()),
        }
    }
}

#[async_trait]
impl Component for SetSymbol {
    fn name(&self) -> &str {
        "SetSymbol"
    }

    fn configure(&mut self, config: &ComponentConfig) -> Result<(), ConfigError> {
        self.symbol = config.require_str("symbol")?;
        self.value = config.get_str("value").filter(|v| !v.trim().is_empty());
        self.expression = config.get_str("evaluate").filter(|v| !v.trim().is_empty());
        Ok(())
    }
}

#[async_trait]
impl TransformTask for SetSymbol {
    async fn execute(&mut self, context: &mut TransformContext) -> Result<(), TaskError> {
        if let Some(template) = &self.value {
            let value = context.resolve(template);
            debug!("{} set '{}' to '{}'", self.name(), self.symbol, value);
            context.set_symbol(self.symbol.clone(), FieldValue::Str(value));
            return Ok(());
        }

        let Some(template) = &self.expression else {
            error!("{} has no value or expression configured, '{}' not set", self.name(), self.symbol);
            return Ok(());
        };
        let expression = context.resolve(template);
        match expression::evaluate(&expression) {
            Ok(result) => {
                debug!("{} set '{}' to {} from '{}'", self.name(), self.symbol, result, expression);
                context.set_symbol(self.symbol.clone(), FieldValue::from(result));
            }
            Err(e) => error!("{} could not evaluate '{}': {}", self.name(), expression, e),
        }
        Ok(())
    }
}
