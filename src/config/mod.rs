use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::errors::ConfigError;
use crate::frame::FieldValue;

pub mod defaults;
use defaults::*;

/// A complete job definition loaded from TOML
///
/// ```toml
/// [job]
/// name = "nightly-import"
/// work_dir = "./work"
///
/// [context]
/// url = "sqlite://./data/context.db"
///
/// [reader]
/// type = "JsonLinesReader"
/// source = "[#$jobdir#]/input.jsonl"
///
/// [[validate]]
/// type = "NotEmpty"
/// field = "name"
///
/// [[writer]]
/// type = "JsonLinesWriter"
/// target = "[#$workdir#]/output.jsonl"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub job: JobSection,
    #[serde(default)]
    pub context: Option<ContextConfig>,
    #[serde(default)]
    pub reader: Option<ComponentSpec>,
    #[serde(default, rename = "filter")]
    pub filters: Vec<ComponentSpec>,
    #[serde(default, rename = "validate")]
    pub validators: Vec<ComponentSpec>,
    #[serde(default, rename = "transform")]
    pub transformers: Vec<ComponentSpec>,
    #[serde(default)]
    pub mapper: Option<ComponentSpec>,
    #[serde(default, rename = "writer")]
    pub writers: Vec<ComponentSpec>,
    #[serde(default)]
    pub pre_process: Vec<ComponentSpec>,
    #[serde(default)]
    pub post_process: Vec<ComponentSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSection {
    #[serde(default = "default_job_name")]
    pub name: String,
    pub job_dir: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    /// Initial symbol table values
    #[serde(default)]
    pub symbols: BTreeMap<String, JsonValue>,
}

/// Persisted context settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    pub url: String,
    /// Dialect product override; detected from the URL when absent
    pub product: Option<String>,
    #[serde(default = "default_context_table")]
    pub table: String,
    pub schema: Option<String>,
    /// Values applied on every open, replacing whatever was persisted
    #[serde(default)]
    pub fields: BTreeMap<String, JsonValue>,
}

/// One `type = "..."` component entry with its free-form settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub settings: JsonMap<String, JsonValue>,
}

fn default_job_name() -> String {
    DEFAULT_JOB_NAME.to_string()
}

fn default_context_table() -> String {
    DEFAULT_CONTEXT_TABLE.to_string()
}

impl Default for JobSection {
    fn default() -> Self {
        Self {
            name: default_job_name(),
            job_dir: None,
            work_dir: None,
            symbols: BTreeMap::new(),
        }
    }
}

impl JobConfig {
    /// Load a job definition; unlike service configs a missing file is an error
    pub fn load_from_file<P: AsRef<Path>>(config_file: P) -> Result<Self, ConfigError> {
        let path = config_file.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&contents)?;
        info!("Loaded job '{}' from {}", config.job.name, path.display());
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Initial symbols converted to field values
    pub fn initial_symbols(&self) -> impl Iterator<Item = (&str, FieldValue)> {
        self.job
            .symbols
            .iter()
            .map(|(k, v)| (k.as_str(), FieldValue::from_json(v)))
    }
}

impl ContextConfig {
    pub fn reset_fields(&self) -> impl Iterator<Item = (&str, FieldValue)> {
        self.fields
            .iter()
            .map(|(k, v)| (k.as_str(), FieldValue::from_json(v)))
    }
}

impl ComponentSpec {
    pub fn new<K: Into<String>>(kind: K) -> Self {
        Self {
            kind: kind.into(),
            settings: JsonMap::new(),
        }
    }

    pub fn to_config(&self) -> ComponentConfig {
        ComponentConfig {
            name: self.kind.clone(),
            settings: self.settings.clone(),
        }
    }
}

/// Settings handed to a component's `configure`
///
/// Keys are matched exactly first and then case-insensitively, so `Halt`
/// and `halt` are the same attribute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentConfig {
    name: String,
    settings: JsonMap<String, JsonValue>,
}

impl ComponentConfig {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            settings: JsonMap::new(),
        }
    }

    /// Builder-style setter
    pub fn with<K: Into<String>, V: Into<JsonValue>>(mut self, key: K, value: V) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Type name of the component this configuration is for
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.settings.get(key).or_else(|| {
            self.settings
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// String form of a scalar setting; `None` when absent or null
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            JsonValue::Null => None,
            JsonValue::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Mandatory non-blank string setting
    pub fn require_str(&self, key: &str) -> Result<String, ConfigError> {
        self.get_str(key)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::missing(&self.name, key))
    }

    /// Boolean setting accepting TOML booleans and `true/false/yes/no/1/0` text
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None | Some(JsonValue::Null) => Ok(default),
            Some(value) => FieldValue::from_json(value).as_bool().ok_or_else(|| {
                ConfigError::invalid(&self.name, key, format!("'{value}' is not a boolean"))
            }),
        }
    }

    pub fn get_array(&self, key: &str) -> Option<&Vec<JsonValue>> {
        self.get(key).and_then(JsonValue::as_array)
    }

    pub fn settings(&self) -> &JsonMap<String, JsonValue> {
        &self.settings
    }
}
