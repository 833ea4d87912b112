//! Cross-database SQL templates
//!
//! A [`DialectRegistry`] maps a database product to two tables: abstract
//! column type tag to native type, and command name to statement template.
//! Statements are produced by rendering templates against a [`SymbolTable`],
//! so supporting a new product only means registering another [`Dialect`].
//!
//! Registries are built once through [`DialectRegistryBuilder`] and shared
//! behind an `Arc`; they are never mutated afterwards.

pub mod builtin;

use crate::errors::DialectError;
use crate::frame::{parse_date, FieldType, FieldValue};
use crate::template::{PlaceholderRenderer, SymbolTable, TemplateRenderer};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

/// Type map key used when a column's abstract type has no entry
pub const DEFAULT_TYPE: &str = "DEFAULT";

/// Product identifiers of the shipped dialects
pub mod products {
    pub const H2: &str = "H2";
    pub const MYSQL: &str = "MySQL";
    pub const ORACLE: &str = "Oracle";
    pub const SQLITE: &str = "SQLite";
    pub const POSTGRESQL: &str = "PostgreSQL";
}

/// Command names understood by the shipped dialects
pub mod commands {
    pub const CREATE: &str = "create";
    pub const GRANT: &str = "grant";
    pub const INSERT: &str = "insert";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
    pub const TRUNCATE: &str = "truncate";
    pub const ALTER_COLUMN: &str = "column_change";
    pub const UPSERT: &str = "upsert";
    pub const SELECT: &str = "select";
    pub const COUNT: &str = "count";
    pub const INDEX: &str = "index";
}

/// Symbol names referenced by the statement templates
pub mod symbols {
    pub const TABLE_NAME: &str = "tableName";
    pub const SCHEMA_NAME: &str = "schemaName";
    pub const INDEX_NAME: &str = "indexName";
    pub const FIELD_DEFINITIONS: &str = "fielddefinitions";
    pub const FIELD_NAMES: &str = "fieldnames";
    pub const FIELD_VALUES: &str = "fieldvalues";
    pub const FIELD_MAP: &str = "fieldmap";
    pub const KEY_FIELDS: &str = "keyfields";
    pub const KEY_CONDITION: &str = "keycondition";
    pub const COLUMN_NAME: &str = "columnName";
    pub const COLUMN_TYPE: &str = "columnType";
}

/// Wire type codes reported by database drivers for result columns
pub mod native_types {
    pub const BIT: i32 = -7;
    pub const TINYINT: i32 = -6;
    pub const BIGINT: i32 = -5;
    pub const CHAR: i32 = 1;
    pub const NUMERIC: i32 = 2;
    pub const DECIMAL: i32 = 3;
    pub const INTEGER: i32 = 4;
    pub const SMALLINT: i32 = 5;
    pub const FLOAT: i32 = 6;
    pub const REAL: i32 = 7;
    pub const DOUBLE: i32 = 8;
    pub const VARCHAR: i32 = 12;
    pub const DATE: i32 = 91;
    pub const TIME: i32 = 92;
    pub const TIMESTAMP: i32 = 93;
    pub const OTHER: i32 = 1111;
}

/// A column to be created: name, abstract type tag and maximum length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub type_tag: String,
    pub length: usize,
}

impl ColumnSpec {
    pub fn new<N: Into<String>>(name: N, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            type_tag: field_type.to_string(),
            length: 0,
        }
    }

    /// Column with a free-form type tag, which may be unknown to a dialect
    pub fn tagged<N: Into<String>, T: Into<String>>(name: N, type_tag: T) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
            length: 0,
        }
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }
}

/// Type and syntax tables for one database product
#[derive(Debug, Clone)]
pub struct Dialect {
    product: String,
    types: HashMap<String, String>,
    syntax: HashMap<String, String>,
}

impl Dialect {
    /// Create a dialect; the type map must contain a `DEFAULT` entry
    pub fn new<P, T, S, K1, V1, K2, V2>(product: P, types: T, syntax: S) -> Result<Self, DialectError>
    where
        P: Into<String>,
        T: IntoIterator<Item = (K1, V1)>,
        S: IntoIterator<Item = (K2, V2)>,
        K1: AsRef<str>,
        V1: Into<String>,
        K2: AsRef<str>,
        V2: Into<String>,
    {
        let product = product.into();
        let types: HashMap<String, String> = types
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_ascii_uppercase(), v.into()))
            .collect();

        if !types.contains_key(DEFAULT_TYPE) {
            return Err(DialectError::MissingDefault { product });
        }

        let syntax = syntax
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v.into()))
            .collect();

        Ok(Self {
            product,
            types,
            syntax,
        })
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    /// Native type for an abstract tag, `None` when the tag is not mapped
    pub fn native_type(&self, type_tag: &str) -> Option<&str> {
        self.types
            .get(&type_tag.trim().to_ascii_uppercase())
            .map(String::as_str)
            .filter(|t| !t.trim().is_empty())
    }

    pub fn default_type(&self) -> &str {
        self.types
            .get(DEFAULT_TYPE)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Raw statement template, `None` when absent or blank
    pub fn template(&self, command: &str) -> Option<&str> {
        self.syntax
            .get(&command.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|t| !t.trim().is_empty())
    }
}

/// Immutable product to dialect registry
pub struct DialectRegistry {
    dialects: HashMap<String, Dialect>,
    renderer: Arc<dyn TemplateRenderer>,
}

impl std::fmt::Debug for DialectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut products: Vec<&str> = self.products().collect();
        products.sort_unstable();
        f.debug_struct("DialectRegistry")
            .field("products", &products)
            .finish()
    }
}

impl DialectRegistry {
    pub fn builder() -> DialectRegistryBuilder {
        DialectRegistryBuilder::default()
    }

    /// Registry holding every shipped dialect and the placeholder renderer
    pub fn standard() -> Result<Self, DialectError> {
        Ok(Self::builder().with_builtin_dialects()?.build())
    }

    pub fn products(&self) -> impl Iterator<Item = &str> {
        self.dialects.values().map(Dialect::product)
    }

    /// Case-insensitive product lookup
    pub fn dialect(&self, product: &str) -> Option<&Dialect> {
        self.dialects.get(&product.to_ascii_lowercase())
    }

    pub fn supports(&self, product: &str) -> bool {
        self.dialect(product).is_some()
    }

    pub fn renderer(&self) -> &Arc<dyn TemplateRenderer> {
        &self.renderer
    }

    /// Build the `create` statement for a table holding the given columns
    ///
    /// Each column becomes `name TYPE`, where `TYPE` is the product's native
    /// type for the column's tag (or the product's `DEFAULT`) with any `#`
    /// replaced by the column length. The joined definitions are stored in
    /// `symbols` under `fielddefinitions` before the template is rendered.
    ///
    /// Returns `None` when the product is not registered or has no `create`
    /// template.
    pub fn render_create_table(
        &self,
        product: &str,
        columns: &[ColumnSpec],
        symbols: &mut SymbolTable,
    ) -> Option<String> {
        let Some(dialect) = self.dialect(product) else {
            error!("Could not find type definition for '{}' database", product);
            return None;
        };

        let definitions = columns
            .iter()
            .map(|column| {
                let native = match dialect.native_type(&column.type_tag) {
                    Some(native) => native,
                    None => {
                        debug!(
                            "No {} type for '{}' (column '{}'), using default '{}'",
                            dialect.product(),
                            column.type_tag,
                            column.name,
                            dialect.default_type()
                        );
                        dialect.default_type()
                    }
                };
                let native = native.replace('#', &column.length.to_string());
                format!("{} {}", column.name, native)
            })
            .collect::<Vec<_>>()
            .join(", ");

        symbols.set(symbols::FIELD_DEFINITIONS, definitions);
        self.render_command(product, commands::CREATE, Some(&*symbols))
    }

    /// Statement for a command, rendered when a symbol table is given and raw
    /// otherwise
    pub fn render_command(
        &self,
        product: &str,
        command: &str,
        symbols: Option<&SymbolTable>,
    ) -> Option<String> {
        let template = self.dialect(product)?.template(command)?;
        Some(match symbols {
            Some(symbols) => self.renderer.render(template, symbols),
            None => template.to_string(),
        })
    }

    /// Like [`render_command`](Self::render_command) but reports why no
    /// statement could be produced
    pub fn require_command(
        &self,
        product: &str,
        command: &str,
        symbols: &SymbolTable,
    ) -> Result<String, DialectError> {
        if !self.supports(product) {
            return Err(DialectError::UnsupportedProduct(product.to_string()));
        }
        self.render_command(product, command, Some(symbols))
            .ok_or_else(|| DialectError::UnsupportedCommand {
                product: product.to_string(),
                command: command.to_string(),
            })
    }
}

/// Builder for [`DialectRegistry`]
pub struct DialectRegistryBuilder {
    dialects: HashMap<String, Dialect>,
    renderer: Arc<dyn TemplateRenderer>,
}

impl Default for DialectRegistryBuilder {
    fn default() -> Self {
        Self {
            dialects: HashMap::new(),
            renderer: Arc::new(PlaceholderRenderer),
        }
    }
}

impl DialectRegistryBuilder {
    /// Register a dialect, replacing any previous one for the same product
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialects
            .insert(dialect.product().to_ascii_lowercase(), dialect);
        self
    }

    pub fn with_builtin_dialects(self) -> Result<Self, DialectError> {
        let mut builder = self;
        for dialect in builtin::dialects()? {
            builder = builder.dialect(dialect);
        }
        Ok(builder)
    }

    pub fn renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn build(self) -> DialectRegistry {
        DialectRegistry {
            dialects: self.dialects,
            renderer: self.renderer,
        }
    }
}

/// Convert a driver value into a frame value using the column's wire type code
///
/// Nulls stay null. Unknown codes, and values that cannot be converted to
/// the code's type, fall back to their text form.
pub fn map_native_value(value: &FieldValue, native_type: i32) -> FieldValue {
    use native_types::*;

    if value.is_null() {
        return FieldValue::Null;
    }

    let mapped = match native_type {
        NUMERIC | DECIMAL | FLOAT | DOUBLE => value.as_f64().map(FieldValue::Double),
        REAL => value.as_f64().map(|n| FieldValue::Float(n as f32)),
        INTEGER => value
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(FieldValue::S32),
        SMALLINT => value
            .as_i64()
            .and_then(|n| i16::try_from(n).ok())
            .map(FieldValue::S16),
        TINYINT => value
            .as_i64()
            .and_then(|n| i8::try_from(n).ok())
            .map(FieldValue::S8),
        BIGINT => value.as_i64().map(FieldValue::S64),
        BIT => value.as_bool().map(FieldValue::Bool),
        DATE | TIME | TIMESTAMP => value
            .as_date()
            .or_else(|| parse_date(&value.to_text()))
            .map(FieldValue::Date),
        _ => None,
    };

    mapped.unwrap_or_else(|| FieldValue::Str(value.to_text()))
}
