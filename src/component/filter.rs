//! Built-in accept and reject filters
//!
//! A filter's condition is an optional `field` plus an optional `pattern`
//! regular expression:
//!
//! - no `field`: matches every frame (catch-all)
//! - `field` only: matches when the field is present and not null
//! - `field` and `pattern`: matches when the field's text matches

use async_trait::async_trait;
use regex::Regex;

use super::{Component, FilterVerdict, FrameFilter};
use crate::config::ComponentConfig;
use crate::context::TransactionContext;
use crate::errors::{ConfigError, StageError};
use crate::frame::Frame;

/// Frame condition evaluated by [`Accept`] and [`Reject`]
#[derive(Debug, Clone, Default)]
pub struct FilterCondition {
    field: Option<String>,
    pattern: Option<Regex>,
}

impl FilterCondition {
    /// Condition matching every frame
    pub fn always() -> Self {
        Self::default()
    }

    pub fn field<F: Into<String>>(field: F) -> Self {
        Self {
            field: Some(field.into()),
            pattern: None,
        }
    }

    pub fn matching<F: Into<String>>(field: F, pattern: Regex) -> Self {
        Self {
            field: Some(field.into()),
            pattern: Some(pattern),
        }
    }

    fn from_config(config: &ComponentConfig) -> Result<Self, ConfigError> {
        let field = config.get_str("field").filter(|f| !f.trim().is_empty());
        let pattern = match config.get_str("pattern") {
            Some(pattern) => {
                if field.is_none() {
                    return Err(ConfigError::missing(config.name(), "field"));
                }
                let regex = Regex::new(&pattern)
                    .map_err(|e| ConfigError::invalid(config.name(), "pattern", e.to_string()))?;
                Some(regex)
            }
            None => None,
        };
        Ok(Self { field, pattern })
    }

    pub fn matches(&self, frame: &Frame) -> bool {
        let Some(field) = &self.field else {
            return true;
        };
        match (frame.get(field), &self.pattern) {
            (None, _) => false,
            (Some(value), _) if value.is_null() => false,
            (Some(_), None) => true,
            (Some(value), Some(pattern)) => pattern.is_match(&value.to_text()),
        }
    }
}

/// Accepts frames matching its condition, ending filter evaluation
#[derive(Debug, Default)]
pub struct Accept {
    condition: FilterCondition,
}

impl Accept {
    pub fn new(condition: FilterCondition) -> Self {
        Self { condition }
    }
}

#[async_trait]
impl Component for Accept {
    fn name(&self) -> &str {
        "Accept"
    }

    fn configure(&mut self, config: &ComponentConfig) -> Result<(), ConfigError> {
        self.condition = FilterCondition::from_config(config)?;
        Ok(())
    }
}

#[async_trait]
impl FrameFilter for Accept {
    async fn evaluate(&mut self, transaction: &TransactionContext<'_>) -> Result<FilterVerdict, StageError> {
        Ok(if self.condition.matches(transaction.source_frame()) {
            FilterVerdict::Accept
        } else {
            FilterVerdict::NoMatch
        })
    }
}

/// Drops frames matching its condition
#[derive(Debug, Default)]
pub struct Reject {
    condition: FilterCondition,
}

impl Reject {
    pub fn new(condition: FilterCondition) -> Self {
        Self { condition }
    }
}

#[async_trait]
impl Component for Reject {
    fn name(&self) -> &str {
        "Reject"
    }

    fn configure(&mut self, config: &ComponentConfig) -> Result<(), ConfigError> {
        self.condition = FilterCondition::from_config(config)?;
        Ok(())
    }
}

#[async_trait]
impl FrameFilter for Reject {
    async fn evaluate(&mut self, transaction: &TransactionContext<'_>) -> Result<FilterVerdict, StageError> {
        Ok(if self.condition.matches(transaction.source_frame()) {
            FilterVerdict::Reject
        } else {
            FilterVerdict::NoMatch
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FieldValue;
    use rstest::rstest;

    fn frame() -> Frame {
        Frame::new()
            .with("country", "DE")
            .with("note", FieldValue::Null)
    }

    #[rstest]
    #[case(FilterCondition::always(), true)]
    #[case(FilterCondition::field("country"), true)]
    #[case(FilterCondition::field("note"), false)]
    #[case(FilterCondition::field("missing"), false)]
    #[case(FilterCondition::matching("country", Regex::new("^D").unwrap()), true)]
    #[case(FilterCondition::matching("country", Regex::new("^F").unwrap()), false)]
    fn test_condition_matching(#[case] condition: FilterCondition, #[case] expected: bool) {
        assert_eq!(condition.matches(&frame()), expected);
    }

    #[test]
    fn test_pattern_without_field_is_rejected() {
        let result = Reject::default().configure(&ComponentConfig::new("Reject").with("pattern", ".*"));
        assert!(matches!(result, Err(ConfigError::Missing { attribute, .. }) if attribute == "field"));
    }

    #[tokio::test]
    async fn test_verdicts() {
        let mut context = crate::context::TransformContext::new("job");
        let transaction = TransactionContext::new(&mut context, frame());

        let mut reject = Reject::new(FilterCondition::field("country"));
        let mut accept = Accept::new(FilterCondition::field("missing"));

        assert_eq!(reject.evaluate(&transaction).await.unwrap(), FilterVerdict::Reject);
        assert_eq!(accept.evaluate(&transaction).await.unwrap(), FilterVerdict::NoMatch);
    }
}
