//! Symbol tables and `[#$name#]` template rendering
//!
//! Every component that accepts templated configuration (paths, values, SQL
//! statements) renders it through a [`TemplateRenderer`] against the job's
//! [`SymbolTable`].

use crate::frame::{FieldValue, Frame};
use regex::{Captures, Regex};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// Job-wide string key to scalar value map used for substitution
///
/// Keys inserted with [`SymbolTable::insert_transient`] are engine-provided
/// values (job name, directories, run id) and are excluded from
/// [`SymbolTable::persistent`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    values: BTreeMap<String, FieldValue>,
    transient: BTreeSet<String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key)
    }

    /// Text form of a symbol, `None` when absent
    pub fn get_text(&self, key: &str) -> Option<String> {
        self.values.get(key).map(FieldValue::to_text)
    }

    /// Set a persistent symbol
    pub fn set<K: Into<String>, V: Into<FieldValue>>(
        &mut self,
        key: K,
        value: V,
    ) -> Option<FieldValue> {
        let key = key.into();
        self.transient.remove(&key);
        self.values.insert(key, value.into())
    }

    /// Set a symbol that lives only for the current run
    pub fn insert_transient<K: Into<String>, V: Into<FieldValue>>(&mut self, key: K, value: V) {
        let key = key.into();
        self.transient.insert(key.clone());
        self.values.insert(key, value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.transient.remove(key);
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn is_transient(&self, key: &str) -> bool {
        self.transient.contains(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Symbols that survive the run
    pub fn persistent(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values
            .iter()
            .filter(|(k, _)| !self.transient.contains(k.as_str()))
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Copy of this table with the frame's fields layered on top
    pub fn overlay(&self, frame: &Frame) -> SymbolTable {
        let mut merged = self.clone();
        for (name, value) in frame.iter() {
            merged.insert_transient(name, value.clone());
        }
        merged
    }
}

/// Renders a template string against a symbol table
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str, symbols: &SymbolTable) -> String;
}

/// Default renderer replacing `[#$name#]` placeholders
///
/// Unknown names render as empty text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderRenderer;

impl PlaceholderRenderer {
    fn pattern() -> Option<&'static Regex> {
        static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
        PATTERN
            .get_or_init(|| Regex::new(r"\[#\$([^#\[\]]+?)#\]").ok())
            .as_ref()
    }
}

impl TemplateRenderer for PlaceholderRenderer {
    fn render(&self, template: &str, symbols: &SymbolTable) -> String {
        let Some(pattern) = Self::pattern() else {
            return template.to_string();
        };
        pattern
            .replace_all(template, |caps: &Captures| {
                symbols.get_text(caps[1].trim()).unwrap_or_default()
            })
            .into_owned()
    }
}
