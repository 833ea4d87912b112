//! Error type definitions for the transform engine
//!
//! This module defines all error types used throughout the engine. Stage-local
//! errors (`ReadError`, `WriteError`, `StageError`) are caught at the frame
//! loop boundary and turned into listener notifications; `EngineError` is the
//! fatal job error that unwinds to `TransformEngine::run`.

use thiserror::Error;

/// Boxed error used to carry an optional underlying cause
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync>;

/// Fatal job error
///
/// Raised when opening fails, when a pre/post-process task fails, or when the
/// engine is driven out of order. `run()` still tears the engine down before
/// returning one of these.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The context could not be opened or closed
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    /// Configuration was missing or invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A component failed to open
    #[error("Failed to open {kind} '{component}': {source}")]
    Open {
        kind: String,
        component: String,
        #[source]
        source: StageError,
    },

    /// A pre-process or post-process task failed
    #[error("{phase} task '{task}' failed: {source}")]
    Task {
        phase: String,
        task: String,
        #[source]
        source: TaskError,
    },

    /// The engine was asked to do something its current state does not allow
    #[error("Invalid engine state: expected {expected}, found {actual}")]
    InvalidState { expected: String, actual: String },
}

/// Missing or invalid configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A mandatory attribute is absent
    #[error("Missing required '{attribute}' attribute for {component}")]
    Missing { component: String, attribute: String },

    /// An attribute is present but unusable
    #[error("Invalid '{attribute}' attribute for {component}: {message}")]
    Invalid {
        component: String,
        attribute: String,
        message: String,
    },

    /// No component is registered under the requested type name
    #[error("Unknown {kind} type: {name}")]
    UnknownComponent { kind: String, name: String },

    /// The configuration file could not be read
    #[error("Failed to read configuration file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Failure raised by a filter, transformer, mapper, or by any component's
/// open/close
#[derive(Error, Debug)]
#[error("{message}")]
pub struct StageError {
    pub message: String,
    #[source]
    pub source: Option<BoxedCause>,
}

/// Failure reading the next frame from a reader
#[derive(Error, Debug)]
#[error("Read failed: {message}")]
pub struct ReadError {
    pub message: String,
    #[source]
    pub source: Option<BoxedCause>,
}

/// Failure writing a frame to a writer
#[derive(Error, Debug)]
#[error("Write failed: {message}")]
pub struct WriteError {
    pub message: String,
    #[source]
    pub source: Option<BoxedCause>,
}

/// Failure executing a pre/post-process task
#[derive(Error, Debug)]
#[error("{message}")]
pub struct TaskError {
    pub message: String,
    #[source]
    pub source: Option<BoxedCause>,
}

/// Context open/close errors
#[derive(Error, Debug)]
pub enum ContextError {
    /// Relational connection failures
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// The dialect registry could not produce a required statement
    #[error("Dialect error: {0}")]
    Dialect(#[from] DialectError),

    /// Context misconfiguration discovered at open
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Job or work directory could not be created
    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    /// Persisted rows could not be interpreted
    #[error("Corrupt context row for job '{job}': {message}")]
    CorruptRow { job: String, message: String },
}

/// Relational connection errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Database errors from SeaORM
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// The URL does not name a supported backend
    #[error("Unsupported database URL format: {0}")]
    UnsupportedUrl(String),

    /// A statement was issued before `open()` or after `close()`
    #[error("Connection is not open")]
    NotOpen,

    /// `commit()` or `rollback()` without a matching `begin()`
    #[error("No transaction in progress")]
    NoTransaction,

    /// File system preparation for an embedded database failed
    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),
}

/// Dialect registry errors
#[derive(Error, Debug)]
pub enum DialectError {
    /// A type map was registered without the mandatory DEFAULT entry
    #[error("Type map for '{product}' has no DEFAULT entry")]
    MissingDefault { product: String },

    /// No dialect is registered for the product
    #[error("Unsupported database product: {0}")]
    UnsupportedProduct(String),

    /// The product has no usable template for the command
    #[error("Database product '{product}' does not support command '{command}'")]
    UnsupportedCommand { product: String, command: String },
}

/// Expression evaluation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Unexpected character '{character}' at position {position}")]
    UnexpectedCharacter { character: char, position: usize },

    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Unexpected token '{token}' at position {position}")]
    UnexpectedToken { token: String, position: usize },

    /// An operator was applied to the wrong kind of operand
    #[error("Operator '{operator}' expects {expected} operands")]
    TypeMismatch {
        operator: &'static str,
        expected: &'static str,
    },

    #[error("Division by zero")]
    DivisionByZero,
}

macro_rules! message_error {
    ($name:ident) => {
        impl $name {
            /// Create an error with a message and no underlying cause
            pub fn new<S: Into<String>>(message: S) -> Self {
                Self {
                    message: message.into(),
                    source: None,
                }
            }

            /// Create an error wrapping an underlying cause
            pub fn with_source<S, E>(message: S, source: E) -> Self
            where
                S: Into<String>,
                E: Into<BoxedCause>,
            {
                Self {
                    message: message.into(),
                    source: Some(source.into()),
                }
            }
        }
    };
}

message_error!(StageError);
message_error!(ReadError);
message_error!(WriteError);
message_error!(TaskError);

impl From<std::io::Error> for StageError {
    fn from(error: std::io::Error) -> Self {
        StageError::with_source(error.to_string(), error)
    }
}

impl From<std::io::Error> for ReadError {
    fn from(error: std::io::Error) -> Self {
        ReadError::with_source(error.to_string(), error)
    }
}

impl From<std::io::Error> for WriteError {
    fn from(error: std::io::Error) -> Self {
        WriteError::with_source(error.to_string(), error)
    }
}

impl From<ConfigError> for StageError {
    fn from(error: ConfigError) -> Self {
        StageError::with_source(error.to_string(), error)
    }
}

/// Convenience methods for creating common error types
impl ConfigError {
    /// Create a missing attribute error
    pub fn missing<C: Into<String>, A: Into<String>>(component: C, attribute: A) -> Self {
        Self::Missing {
            component: component.into(),
            attribute: attribute.into(),
        }
    }

    /// Create an invalid attribute error
    pub fn invalid<C, A, M>(component: C, attribute: A, message: M) -> Self
    where
        C: Into<String>,
        A: Into<String>,
        M: Into<String>,
    {
        Self::Invalid {
            component: component.into(),
            attribute: attribute.into(),
            message: message.into(),
        }
    }
}

impl EngineError {
    /// Create an invalid state error
    pub fn invalid_state<E: ToString, A: ToString>(expected: E, actual: A) -> Self {
        Self::InvalidState {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_errors_keep_their_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "input.jsonl");
        let error = ReadError::from(io);

        assert_eq!(error.to_string(), "Read failed: input.jsonl");
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_config_error_names_component_and_attribute() {
        let error = ConfigError::missing("NotNull", "field");
        assert_eq!(
            error.to_string(),
            "Missing required 'field' attribute for NotNull"
        );
    }
}
