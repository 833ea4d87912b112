//! Symbol table persisted in a relational table
//!
//! Each persistent symbol is one row keyed by `(job_name, attribute_key)`
//! with its text form and a [`FieldType`] code. Rows are loaded when the
//! context opens and upserted when it closes, so a job resumes with the same
//! symbols on any host that can reach the database.
//!
//! There is no locking: two runs of the same job each load a snapshot and
//! whichever closes last overwrites the other's values.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::keys;
use super::transform::ContextStore;
use crate::config::defaults::{
    CONTEXT_JOB_NAME_LENGTH, CONTEXT_KEY_LENGTH, CONTEXT_VALUE_LENGTH, DEFAULT_CONTEXT_TABLE,
};
use crate::config::ContextConfig;
use crate::connection::{RelationalConnection, SeaOrmConnection};
use crate::dialect::{commands, symbols as sym, ColumnSpec, DialectRegistry};
use crate::errors::{ConfigError, ContextError, ContextResult, DialectError};
use crate::frame::{FieldType, FieldValue, Frame};
use crate::template::SymbolTable;

const JOB_NAME_COLUMN: &str = "job_name";
const KEY_COLUMN: &str = "attribute_key";
const VALUE_COLUMN: &str = "attribute_value";
const TYPE_COLUMN: &str = "value_type";

/// [`ContextStore`] backed by a relational table
pub struct DatabaseContext {
    job_name: String,
    connection: Box<dyn RelationalConnection>,
    dialects: Arc<DialectRegistry>,
    table: String,
    schema: Option<String>,
    reset_fields: Vec<(String, FieldValue)>,
}

impl DatabaseContext {
    pub fn new<N: Into<String>>(
        job_name: N,
        connection: Box<dyn RelationalConnection>,
        dialects: Arc<DialectRegistry>,
    ) -> Self {
        Self {
            job_name: job_name.into(),
            connection,
            dialects,
            table: DEFAULT_CONTEXT_TABLE.to_string(),
            schema: None,
            reset_fields: Vec::new(),
        }
    }

    /// Build from the `[context]` section, connecting through SeaORM
    pub fn from_config<N: Into<String>>(
        job_name: N,
        config: &ContextConfig,
        dialects: Arc<DialectRegistry>,
    ) -> ContextResult<Self> {
        let mut connection = SeaOrmConnection::new(config.url.clone())?;
        if let Some(product) = &config.product {
            connection = connection.with_product(product.clone());
        }

        let mut context = Self::new(job_name, Box::new(connection), dialects)
            .with_table(config.table.clone())
            .with_reset_fields(config.reset_fields().map(|(k, v)| (k.to_string(), v)));
        if let Some(schema) = &config.schema {
            context = context.with_schema(schema.clone());
        }
        Ok(context)
    }

    pub fn with_table<T: Into<String>>(mut self, table: T) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_schema<S: Into<String>>(mut self, schema: S) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Value applied on every open, after persisted values are loaded
    pub fn with_reset_field<K: Into<String>, V: Into<FieldValue>>(mut self, key: K, value: V) -> Self {
        self.reset_fields.push((key.into(), value.into()));
        self
    }

    pub fn with_reset_fields<I: IntoIterator<Item = (String, FieldValue)>>(mut self, fields: I) -> Self {
        self.reset_fields.extend(fields);
        self
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn columns() -> [ColumnSpec; 4] {
        [
            ColumnSpec::new(JOB_NAME_COLUMN, FieldType::String).with_length(CONTEXT_JOB_NAME_LENGTH),
            ColumnSpec::new(KEY_COLUMN, FieldType::String).with_length(CONTEXT_KEY_LENGTH),
            ColumnSpec::new(VALUE_COLUMN, FieldType::String).with_length(CONTEXT_VALUE_LENGTH),
            ColumnSpec::new(TYPE_COLUMN, FieldType::S32),
        ]
    }

    /// Symbols shared by every statement this context issues
    fn statement_symbols(&self) -> SymbolTable {
        let mut symbols = SymbolTable::new();
        symbols.set(sym::TABLE_NAME, self.table.clone());
        if let Some(schema) = &self.schema {
            symbols.set(sym::SCHEMA_NAME, schema.clone());
        }
        symbols.set(sym::INDEX_NAME, format!("{}_job_key_idx", self.table));
        symbols.set(sym::KEY_FIELDS, format!("{JOB_NAME_COLUMN}, {KEY_COLUMN}"));
        symbols.set(
            sym::KEY_CONDITION,
            format!("{JOB_NAME_COLUMN} = {}", quote(&self.job_name)),
        );
        symbols
    }

    fn check_product(&self) -> ContextResult<String> {
        let product = self.connection.product().to_string();
        let create = self
            .dialects
            .render_command(&product, commands::CREATE, None)
            .ok_or_else(|| DialectError::UnsupportedProduct(product.clone()))?;

        let placeholder = format!("[#${}#]", sym::SCHEMA_NAME);
        if create.contains(&placeholder) && self.schema.is_none() {
            return Err(ConfigError::invalid(
                "DatabaseContext",
                "schema",
                format!("{product} requires a schema name"),
            )
            .into());
        }
        Ok(product)
    }

    /// Create the context table and its unique index unless it already exists
    async fn ensure_table(&self, product: &str) -> ContextResult<()> {
        let mut symbols = self.statement_symbols();
        let count = self
            .dialects
            .require_command(product, commands::COUNT, &symbols)?;

        match self.connection.execute(&count).await {
            Ok(_) => {
                debug!("Context table '{}' exists", self.table);
                return Ok(());
            }
            Err(e) => debug!("Context table '{}' not readable ({}), creating it", self.table, e),
        }

        let create = self
            .dialects
            .render_create_table(product, &Self::columns(), &mut symbols)
            .ok_or_else(|| DialectError::UnsupportedCommand {
                product: product.to_string(),
                command: commands::CREATE.to_string(),
            })?;
        self.connection.execute(&create).await?;

        let index = self
            .dialects
            .require_command(product, commands::INDEX, &symbols)?;
        self.connection.execute(&index).await?;

        info!("Created context table '{}'", self.table);
        Ok(())
    }

    async fn load(&self, product: &str, symbols: &mut SymbolTable) -> ContextResult<usize> {
        let select = self
            .dialects
            .require_command(product, commands::SELECT, &self.statement_symbols())?;
        let rows = self.connection.query(&select).await?;

        for row in &rows {
            let (key, value) = self.parse_row(row)?;
            symbols.set(key, value);
        }
        Ok(rows.len())
    }

    fn parse_row(&self, row: &Frame) -> ContextResult<(String, FieldValue)> {
        let key = column(row, KEY_COLUMN)
            .map(FieldValue::to_text)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ContextError::CorruptRow {
                job: self.job_name.clone(),
                message: format!("missing {KEY_COLUMN}"),
            })?;
        let text = column(row, VALUE_COLUMN)
            .map(FieldValue::to_text)
            .unwrap_or_default();
        let code = column(row, TYPE_COLUMN).and_then(FieldValue::as_i64);

        let field_type = match code.and_then(|c| i32::try_from(c).ok()).and_then(FieldType::from_code) {
            Some(field_type) => field_type,
            None => {
                warn!("Unknown type code {:?} for context value '{}', reading as text", code, key);
                FieldType::String
            }
        };

        let value = match FieldValue::from_text(field_type, &text) {
            Some(value) => value,
            None => {
                warn!("Could not read context value '{}' as {}, reading as text", key, field_type);
                FieldValue::Str(text)
            }
        };
        Ok((key, value))
    }

    /// Upsert every persistent symbol in one transaction
    ///
    /// Any failure rolls the whole snapshot back, so the table keeps the
    /// values of the last successful close.
    async fn save(&mut self, product: &str, symbols: &SymbolTable) -> ContextResult<usize> {
        self.connection.begin().await?;
        match self.upsert_all(product, symbols).await {
            Ok(saved) => {
                self.connection.commit().await?;
                Ok(saved)
            }
            Err(e) => {
                warn!("Saving context for job '{}' failed, rolling back: {}", self.job_name, e);
                if let Err(rollback) = self.connection.rollback().await {
                    error!("Failed to roll back context for job '{}': {}", self.job_name, rollback);
                }
                Err(e)
            }
        }
    }

    async fn upsert_all(&self, product: &str, symbols: &SymbolTable) -> ContextResult<usize> {
        let base = self.statement_symbols();
        let mut saved = 0;

        for (key, value) in symbols.persistent() {
            let job = quote(&self.job_name);
            let attribute = quote(key);
            let text = quote(&value.to_text());
            let code = value.field_type().code();

            let mut statement = base.clone();
            statement.set(
                sym::FIELD_NAMES,
                format!("{JOB_NAME_COLUMN}, {KEY_COLUMN}, {VALUE_COLUMN}, {TYPE_COLUMN}"),
            );
            statement.set(sym::FIELD_VALUES, format!("{job}, {attribute}, {text}, {code}"));
            statement.set(
                sym::FIELD_MAP,
                format!("{VALUE_COLUMN} = {text}, {TYPE_COLUMN} = {code}"),
            );
            statement.set(
                sym::KEY_CONDITION,
                format!("{JOB_NAME_COLUMN} = {job} AND {KEY_COLUMN} = {attribute}"),
            );

            let upsert = self
                .dialects
                .require_command(product, commands::UPSERT, &statement)?;
            self.connection.execute(&upsert).await?;
            saved += 1;
        }
        Ok(saved)
    }

    async fn load_state(&mut self, symbols: &mut SymbolTable) -> ContextResult<()> {
        let product = self.check_product()?;
        self.connection.open().await?;
        self.ensure_table(&product).await?;

        let loaded = self.load(&product, symbols).await?;
        debug!("Loaded {} context values for job '{}'", loaded, self.job_name);

        for (key, value) in &self.reset_fields {
            symbols.set(key.clone(), value.clone());
        }

        let runs = symbols
            .get(keys::RUN_COUNT)
            .and_then(FieldValue::as_i64)
            .unwrap_or(0);
        symbols.set(keys::RUN_COUNT, FieldValue::S64(runs + 1));
        Ok(())
    }
}

#[async_trait]
impl ContextStore for DatabaseContext {
    async fn open(
        &mut self,
        symbols: &mut SymbolTable,
        _started_at: DateTime<Utc>,
    ) -> ContextResult<()> {
        let result = self.load_state(symbols).await;
        if result.is_err() {
            if let Err(e) = self.connection.close().await {
                error!("Failed to release context connection: {}", e);
            }
        }
        result
    }

    async fn close(
        &mut self,
        symbols: &mut SymbolTable,
        started_at: DateTime<Utc>,
    ) -> ContextResult<()> {
        symbols.set(keys::LAST_RUN_DATE, FieldValue::Date(started_at));

        let product = self.connection.product().to_string();
        let saved = self.save(&product, symbols).await;
        let released = self.connection.close().await;

        let saved = saved?;
        released?;
        debug!("Saved {} context values for job '{}'", saved, self.job_name);
        Ok(())
    }
}

/// Case-insensitive column lookup; drivers differ in identifier case
fn column<'a>(row: &'a Frame, name: &str) -> Option<&'a FieldValue> {
    row.get(name).or_else(|| {
        row.iter()
            .find(|(column, _)| column.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

/// SQL string literal with embedded quotes doubled
fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::products;
    use crate::errors::{ConnectionError, ConnectionResult};
    use std::sync::Mutex;

    /// Connection that records statements and serves canned rows
    struct ScriptedConnection {
        product: String,
        table_exists: bool,
        rows: Vec<Frame>,
        fail_on: Option<&'static str>,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl RelationalConnection for ScriptedConnection {
        fn product(&self) -> &str {
            &self.product
        }

        async fn open(&mut self) -> ConnectionResult<()> {
            self.log.lock().unwrap().push("OPEN".to_string());
            Ok(())
        }

        async fn execute(&self, sql: &str) -> ConnectionResult<u64> {
            self.log.lock().unwrap().push(sql.to_string());
            if sql.contains("COUNT(*)") && !self.table_exists {
                return Err(ConnectionError::NotOpen);
            }
            if self.fail_on.is_some_and(|marker| sql.contains(marker)) {
                return Err(ConnectionError::NotOpen);
            }
            Ok(1)
        }

        async fn query(&self, sql: &str) -> ConnectionResult<Vec<Frame>> {
            self.log.lock().unwrap().push(sql.to_string());
            Ok(self.rows.clone())
        }

        async fn begin(&mut self) -> ConnectionResult<()> {
            self.log.lock().unwrap().push("BEGIN".to_string());
            Ok(())
        }

        async fn commit(&mut self) -> ConnectionResult<()> {
            self.log.lock().unwrap().push("COMMIT".to_string());
            Ok(())
        }

        async fn rollback(&mut self) -> ConnectionResult<()> {
            self.log.lock().unwrap().push("ROLLBACK".to_string());
            Ok(())
        }

        async fn close(&mut self) -> ConnectionResult<()> {
            self.log.lock().unwrap().push("CLOSE".to_string());
            Ok(())
        }
    }

    fn scripted(product: &str, table_exists: bool, rows: Vec<Frame>) -> (DatabaseContext, Arc<Mutex<Vec<String>>>) {
        scripted_failing(product, table_exists, rows, None)
    }

    fn scripted_failing(
        product: &str,
        table_exists: bool,
        rows: Vec<Frame>,
        fail_on: Option<&'static str>,
    ) -> (DatabaseContext, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let connection = ScriptedConnection {
            product: product.to_string(),
            table_exists,
            rows,
            fail_on,
            log: log.clone(),
        };
        let registry = Arc::new(DialectRegistry::standard().unwrap());
        (DatabaseContext::new("nightly-import", Box::new(connection), registry), log)
    }

    #[tokio::test]
    async fn test_missing_table_is_created_with_unique_index() {
        let (mut context, log) = scripted(products::H2, false, Vec::new());
        let mut symbols = SymbolTable::new();

        context.open(&mut symbols, Utc::now()).await.unwrap();

        let log = log.lock().unwrap();
        assert!(log.contains(&"CREATE TABLE dx_context( job_name VARCHAR(64), attribute_key VARCHAR(128), attribute_value VARCHAR(4096), value_type INTEGER )".to_string()));
        assert!(log.contains(&"CREATE UNIQUE INDEX dx_context_job_key_idx ON dx_context ( job_name, attribute_key )".to_string()));
        assert!(log.contains(&"SELECT * FROM dx_context WHERE job_name = 'nightly-import'".to_string()));
        assert_eq!(symbols.get(keys::RUN_COUNT), Some(&FieldValue::S64(1)));
    }

    #[tokio::test]
    async fn test_rows_are_parsed_by_type_code() {
        let rows = vec![
            Frame::new()
                .with("JOB_NAME", "nightly-import")
                .with("ATTRIBUTE_KEY", "batch")
                .with("ATTRIBUTE_VALUE", "12")
                .with("VALUE_TYPE", "8"),
            Frame::new()
                .with("attribute_key", "RunCount")
                .with("attribute_value", "4")
                .with("value_type", 10),
            Frame::new()
                .with("attribute_key", "broken")
                .with("attribute_value", "twelve")
                .with("value_type", 8),
        ];
        let (context, _log) = scripted(products::H2, true, rows);
        let mut context = context.with_reset_field("mode", "full");
        let mut symbols = SymbolTable::new();

        context.open(&mut symbols, Utc::now()).await.unwrap();

        assert_eq!(symbols.get("batch"), Some(&FieldValue::S32(12)));
        assert_eq!(symbols.get("broken"), Some(&FieldValue::from("twelve")));
        assert_eq!(symbols.get("mode"), Some(&FieldValue::from("full")));
        assert_eq!(symbols.get(keys::RUN_COUNT), Some(&FieldValue::S64(5)));
    }

    #[tokio::test]
    async fn test_qualified_product_requires_schema() {
        let (mut context, log) = scripted(products::MYSQL, true, Vec::new());
        let mut symbols = SymbolTable::new();

        let result = context.open(&mut symbols, Utc::now()).await;

        assert!(matches!(result, Err(ContextError::Config(ConfigError::Invalid { .. }))));
        assert!(!log.lock().unwrap().contains(&"OPEN".to_string()));
    }

    #[tokio::test]
    async fn test_close_upserts_persistent_symbols_with_escaping() {
        let (mut context, log) = scripted(products::SQLITE, true, Vec::new());
        let mut symbols = SymbolTable::new();
        context.open(&mut symbols, Utc::now()).await.unwrap();
        symbols.set("owner", "O'Brien");
        symbols.insert_transient(keys::JOB_NAME, "nightly-import");

        context.close(&mut symbols, Utc::now()).await.unwrap();

        let log = log.lock().unwrap();
        let upserts: Vec<_> = log.iter().filter(|s| s.starts_with("INSERT")).collect();
        assert_eq!(upserts.len(), 3, "owner, RunCount and LastRunDate: {upserts:?}");
        assert!(upserts.iter().any(|s| s.contains("'O''Brien'")));
        assert!(!upserts.iter().any(|s| s.contains(&format!("'{}'", keys::JOB_NAME))));
        assert_eq!(log.last().map(String::as_str), Some("CLOSE"));
        let begin = log.iter().position(|s| s == "BEGIN").unwrap();
        let commit = log.iter().position(|s| s == "COMMIT").unwrap();
        assert_eq!(log[begin..commit].iter().filter(|s| s.starts_with("INSERT")).count(), 3);
    }

    #[tokio::test]
    async fn test_failed_upsert_rolls_back_and_reports() {
        let (mut context, log) = scripted_failing(products::SQLITE, true, Vec::new(), Some("'owner'"));
        let mut symbols = SymbolTable::new();
        context.open(&mut symbols, Utc::now()).await.unwrap();
        symbols.set("owner", "b");

        let result = context.close(&mut symbols, Utc::now()).await;

        assert!(matches!(result, Err(ContextError::Connection(_))));
        let log = log.lock().unwrap();
        assert!(log.contains(&"ROLLBACK".to_string()));
        assert!(!log.contains(&"COMMIT".to_string()));
        assert_eq!(log.last().map(String::as_str), Some("CLOSE"));
    }

    #[test]
    fn test_quote_doubles_single_quotes() {
        assert_eq!(quote("it's"), "'it''s'");
    }
}
