//! Built-in validators
//!
//! All validators accept `field` (required), `desc` and `halt`. A failing
//! validator reports its description, or a generated message, to the job's
//! listeners; with `halt` enabled it also puts the job in error so the run
//! stops after the current frame's validation.

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};

use super::{Component, FrameValidator};
use crate::config::defaults::DEFAULT_HALT_ON_FAIL;
use crate::config::ComponentConfig;
use crate::context::TransactionContext;
use crate::errors::{ConfigError, StageError};
use crate::frame::FieldValue;

/// Settings shared by every validator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorSettings {
    pub field: String,
    pub description: Option<String>,
    pub halt: bool,
}

impl ValidatorSettings {
    pub fn for_field<F: Into<String>>(field: F) -> Self {
        Self {
            field: field.into(),
            description: None,
            halt: DEFAULT_HALT_ON_FAIL,
        }
    }

    pub fn with_description<D: Into<String>>(mut self, description: D) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn halting(mut self, halt: bool) -> Self {
        self.halt = halt;
        self
    }

    /// Read `field`, `desc` and `halt`
    ///
    /// An unreadable `halt` value is logged and treated as `false`.
    pub fn from_config(config: &ComponentConfig) -> Result<Self, ConfigError> {
        let field = config.require_str("field")?;
        let description = config
            .get_str("desc")
            .or_else(|| config.get_str("description"))
            .filter(|d| !d.trim().is_empty());

        let halt = match config.get_bool("halt", DEFAULT_HALT_ON_FAIL) {
            Ok(halt) => halt,
            Err(e) => {
                info!("{}; validation failures will not halt the job", e);
                false
            }
        };
        if !config.contains("halt") {
            debug!("No halt setting for {} on '{}'", config.name(), field);
        }

        Ok(Self {
            field,
            description,
            halt,
        })
    }

    /// Message reported when validation fails
    pub fn failure_message(&self, validator: &str) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("{} validation of {} failed", validator, self.field))
    }

    /// Report a failure for `validator` and halt the job when configured to
    pub fn fail(&self, validator: &str, transaction: &mut TransactionContext<'_>) {
        let message = self.failure_message(validator);
        transaction.fire_validation_failed(validator, &message);
        if self.halt {
            transaction.context_mut().set_error(message);
        }
    }

    fn value<'t>(&self, transaction: &'t TransactionContext<'_>) -> Option<&'t FieldValue> {
        transaction.source_frame().get(&self.field)
    }
}

/// Fails when the field is absent or null
#[derive(Debug, Default)]
pub struct NotNull {
    settings: ValidatorSettings,
}

impl NotNull {
    pub fn new(settings: ValidatorSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Component for NotNull {
    fn name(&self) -> &str {
        "NotNull"
    }

    fn configure(&mut self, config: &ComponentConfig) -> Result<(), ConfigError> {
        self.settings = ValidatorSettings::from_config(config)?;
        Ok(())
    }
}

#[async_trait]
impl FrameValidator for NotNull {
    fn halts_on_fail(&self) -> bool {
        self.settings.halt
    }

    async fn validate(&mut self, transaction: &mut TransactionContext<'_>) -> Result<bool, StageError> {
        let valid = self.settings.value(transaction).is_some_and(|v| !v.is_null());
        if !valid {
            self.settings.fail(self.name(), transaction);
        }
        Ok(valid)
    }
}

/// Fails when the field is absent, null, or blank text
#[derive(Debug, Default)]
pub struct NotEmpty {
    settings: ValidatorSettings,
}

impl NotEmpty {
    pub fn new(settings: ValidatorSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Component for NotEmpty {
    fn name(&self) -> &str {
        "NotEmpty"
    }

    fn configure(&mut self, config: &ComponentConfig) -> Result<(), ConfigError> {
        self.settings = ValidatorSettings::from_config(config)?;
        Ok(())
    }
}

#[async_trait]
impl FrameValidator for NotEmpty {
    fn halts_on_fail(&self) -> bool {
        self.settings.halt
    }

    async fn validate(&mut self, transaction: &mut TransactionContext<'_>) -> Result<bool, StageError> {
        let valid = self
            .settings
            .value(transaction)
            .is_some_and(|v| !v.to_text().trim().is_empty());
        if !valid {
            self.settings.fail(self.name(), transaction);
        }
        Ok(valid)
    }
}

/// Fails unless the field's text matches `pattern`
#[derive(Debug, Default)]
pub struct Pattern {
    settings: ValidatorSettings,
    pattern: Option<Regex>,
}

impl Pattern {
    pub fn new(settings: ValidatorSettings, pattern: Regex) -> Self {
        Self {
            settings,
            pattern: Some(pattern),
        }
    }
}

#[async_trait]
impl Component for Pattern {
    fn name(&self) -> &str {
        "Pattern"
    }

    fn configure(&mut self, config: &ComponentConfig) -> Result<(), ConfigError> {
        self.settings = ValidatorSettings::from_config(config)?;
        let pattern = config.require_str("pattern")?;
        let regex = Regex::new(&pattern)
            .map_err(|e| ConfigError::invalid(config.name(), "pattern", e.to_string()))?;
        self.pattern = Some(regex);
        Ok(())
    }
}

#[async_trait]
impl FrameValidator for Pattern {
    fn halts_on_fail(&self) -> bool {
        self.settings.halt
    }

    async fn validate(&mut self, transaction: &mut TransactionContext<'_>) -> Result<bool, StageError> {
        let Some(pattern) = &self.pattern else {
            return Err(StageError::new("Pattern validator has no pattern configured"));
        };
        let valid = self
            .settings
            .value(transaction)
            .filter(|v| !v.is_null())
            .is_some_and(|v| pattern.is_match(&v.to_text()));
        if !valid {
            self.settings.fail(self.name(), transaction);
        }
        Ok(valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TransformContext;
    use crate::frame::Frame;

    #[test]
    fn test_settings_require_field() {
        let result = ValidatorSettings::from_config(&ComponentConfig::new("NotNull"));
        assert!(matches!(result, Err(ConfigError::Missing { attribute, .. }) if attribute == "field"));
    }

    #[test]
    fn test_malformed_halt_is_false() {
        let config = ComponentConfig::new("NotNull").with("field", "id").with("halt", "maybe");
        assert!(!ValidatorSettings::from_config(&config).unwrap().halt);
    }

    #[test]
    fn test_default_message_names_validator_and_field() {
        let settings = ValidatorSettings::for_field("zip");
        assert_eq!(settings.failure_message("Pattern"), "Pattern validation of zip failed");
        let described = settings.with_description("zip must have five digits");
        assert_eq!(described.failure_message("Pattern"), "zip must have five digits");
    }

    #[tokio::test]
    async fn test_not_null_reports_without_halting() {
        let mut context = TransformContext::new("job");
        let mut validator = NotNull::new(ValidatorSettings::for_field("id"));

        let mut transaction = TransactionContext::new(&mut context, Frame::new().with("id", FieldValue::Null));
        assert!(!validator.validate(&mut transaction).await.unwrap());
        assert_eq!(transaction.validation_failures()[0].message, "NotNull validation of id failed");
        drop(transaction);

        assert!(!context.is_in_error());
        assert_eq!(context.counters().validation_failures, 1);
    }

    #[tokio::test]
    async fn test_halting_validator_sets_job_error() {
        let mut context = TransformContext::new("job");
        let mut validator = NotEmpty::new(
            ValidatorSettings::for_field("name")
                .with_description("name is required")
                .halting(true),
        );

        let mut transaction = TransactionContext::new(&mut context, Frame::new().with("name", "  "));
        assert!(!validator.validate(&mut transaction).await.unwrap());
        drop(transaction);

        assert_eq!(context.error_message(), Some("name is required"));
    }

    #[tokio::test]
    async fn test_pattern_validator() {
        let mut validator = Pattern::default();
        validator
            .configure(
                &ComponentConfig::new("Pattern")
                    .with("field", "zip")
                    .with("pattern", "^[0-9]{5}$"),
            )
            .unwrap();
        let mut context = TransformContext::new("job");

        let mut ok = TransactionContext::new(&mut context, Frame::new().with("zip", "12345"));
        assert!(validator.validate(&mut ok).await.unwrap());
        drop(ok);

        let mut bad = TransactionContext::new(&mut context, Frame::new().with("zip", "1234a"));
        assert!(!validator.validate(&mut bad).await.unwrap());
    }

    #[test]
    fn test_invalid_pattern_is_a_config_error() {
        let result = Pattern::default().configure(
            &ComponentConfig::new("Pattern").with("field", "zip").with("pattern", "(["),
        );
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }
}
