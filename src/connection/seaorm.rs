//! SeaORM-based relational connection
//!
//! Supports:
//! - SQLite (file databases are auto-created)
//! - PostgreSQL
//! - MySQL

use async_trait::async_trait;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database as SeaOrmDatabase, DatabaseBackend,
    DatabaseConnection, DatabaseTransaction, FromQueryResult, Statement, TransactionTrait,
};
use serde_json::Value as JsonValue;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, trace};

use super::RelationalConnection;
use crate::config::defaults::{
    DEFAULT_ACQUIRE_TIMEOUT_SECS, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_IDLE_TIMEOUT_SECS,
};
use crate::dialect::products;
use crate::errors::{ConnectionError, ConnectionResult};
use crate::frame::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    SQLite,
    PostgreSQL,
    MySQL,
}

impl DatabaseType {
    /// Detect the database type from the URL
    pub fn detect(url: &str) -> ConnectionResult<Self> {
        if url.starts_with("sqlite:") {
            Ok(DatabaseType::SQLite)
        } else if url.starts_with("postgres:") || url.starts_with("postgresql:") {
            Ok(DatabaseType::PostgreSQL)
        } else if url.starts_with("mysql:") {
            Ok(DatabaseType::MySQL)
        } else {
            Err(ConnectionError::UnsupportedUrl(url.to_string()))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseType::SQLite => products::SQLITE,
            DatabaseType::PostgreSQL => products::POSTGRESQL,
            DatabaseType::MySQL => products::MYSQL,
        }
    }

    pub fn backend(&self) -> DatabaseBackend {
        match self {
            DatabaseType::SQLite => DatabaseBackend::Sqlite,
            DatabaseType::PostgreSQL => DatabaseBackend::Postgres,
            DatabaseType::MySQL => DatabaseBackend::MySql,
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Single-connection SeaORM handle opened lazily by `open()`
///
/// While a transaction is in progress every statement runs on it.
pub struct SeaOrmConnection {
    url: String,
    database_type: DatabaseType,
    product: String,
    connection: Option<DatabaseConnection>,
    transaction: Option<DatabaseTransaction>,
}

impl SeaOrmConnection {
    pub fn new<U: Into<String>>(url: U) -> ConnectionResult<Self> {
        let url = url.into();
        let database_type = DatabaseType::detect(&url)?;
        Ok(Self {
            url,
            database_type,
            product: database_type.as_str().to_string(),
            connection: None,
            transaction: None,
        })
    }

    /// Use a different dialect product than the one implied by the URL
    pub fn with_product<P: Into<String>>(mut self, product: P) -> Self {
        self.product = product.into();
        self
    }

    pub fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    fn connection(&self) -> ConnectionResult<&DatabaseConnection> {
        self.connection.as_ref().ok_or(ConnectionError::NotOpen)
    }

    fn statement(&self, sql: &str) -> Statement {
        Statement::from_string(self.database_type.backend(), sql.to_string())
    }

    /// Ensure SQLite URL includes auto-creation mode if needed
    fn ensure_sqlite_auto_creation(url: &str) -> ConnectionResult<String> {
        if url.contains("mode=") || url.contains(":memory:") {
            debug!("SQLite URL needs no modification: {}", url);
            return Ok(url.to_string());
        }

        let file_path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .ok_or_else(|| ConnectionError::UnsupportedUrl(url.to_string()))?;

        let path = std::path::Path::new(file_path);
        if path.exists() {
            debug!("SQLite database file already exists: {}", file_path);
            return Ok(url.to_string());
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
                info!("Created directory for SQLite database: {}", parent.display());
            }
        }

        let auto_create_url = if url.contains('?') {
            format!("{}&mode=rwc", url)
        } else {
            format!("{}?mode=rwc", url)
        };

        debug!("Modified SQLite URL to enable auto-creation: {} -> {}", url, auto_create_url);
        Ok(auto_create_url)
    }
}

#[async_trait]
impl RelationalConnection for SeaOrmConnection {
    fn product(&self) -> &str {
        &self.product
    }

    async fn open(&mut self) -> ConnectionResult<()> {
        if self.connection.is_some() {
            return Ok(());
        }

        info!("Connecting to {} database", self.database_type);

        let connection_url = match self.database_type {
            DatabaseType::SQLite => Self::ensure_sqlite_auto_creation(&self.url)?,
            _ => self.url.clone(),
        };

        let mut connect_options = ConnectOptions::new(connection_url);
        connect_options
            .max_connections(1)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .acquire_timeout(Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS))
            .idle_timeout(Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS))
            .sqlx_logging(false);

        let connection = match SeaOrmDatabase::connect(connect_options).await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Database connection failed: {:?}", e);
                let mut source = e.source();
                let mut level = 0;
                while let Some(err) = source {
                    error!("  Level {}: {}", level, err);
                    source = err.source();
                    level += 1;
                }
                return Err(e.into());
            }
        };

        debug!("Database connection established successfully");
        self.connection = Some(connection);
        Ok(())
    }

    async fn execute(&self, sql: &str) -> ConnectionResult<u64> {
        trace!("execute: {}", sql);
        let statement = self.statement(sql);
        let result = match &self.transaction {
            Some(transaction) => transaction.execute(statement).await?,
            None => self.connection()?.execute(statement).await?,
        };
        Ok(result.rows_affected())
    }

    async fn query(&self, sql: &str) -> ConnectionResult<Vec<Frame>> {
        trace!("query: {}", sql);
        let select = JsonValue::find_by_statement(self.statement(sql));
        let rows = match &self.transaction {
            Some(transaction) => select.all(transaction).await?,
            None => select.all(self.connection()?).await?,
        };
        Ok(rows.iter().filter_map(Frame::from_json).collect())
    }

    async fn begin(&mut self) -> ConnectionResult<()> {
        if self.transaction.is_some() {
            return Ok(());
        }
        let transaction = self.connection()?.begin().await?;
        trace!("begin transaction");
        self.transaction = Some(transaction);
        Ok(())
    }

    async fn commit(&mut self) -> ConnectionResult<()> {
        let transaction = self.transaction.take().ok_or(ConnectionError::NoTransaction)?;
        transaction.commit().await?;
        trace!("commit transaction");
        Ok(())
    }

    async fn rollback(&mut self) -> ConnectionResult<()> {
        let transaction = self.transaction.take().ok_or(ConnectionError::NoTransaction)?;
        transaction.rollback().await?;
        debug!("Rolled back {} transaction", self.database_type);
        Ok(())
    }

    async fn close(&mut self) -> ConnectionResult<()> {
        if let Some(transaction) = self.transaction.take() {
            transaction.rollback().await?;
            debug!("Rolled back unfinished {} transaction", self.database_type);
        }
        if let Some(connection) = self.connection.take() {
            connection.close().await?;
            debug!("Closed {} connection", self.database_type);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FieldValue;

    #[test]
    fn test_detect_database_type() {
        assert_eq!(DatabaseType::detect("sqlite://./x.db").unwrap(), DatabaseType::SQLite);
        assert_eq!(DatabaseType::detect("postgresql://h/db").unwrap(), DatabaseType::PostgreSQL);
        assert_eq!(DatabaseType::detect("mysql://h/db").unwrap(), DatabaseType::MySQL);
        assert!(matches!(
            DatabaseType::detect("oracle://h/db"),
            Err(ConnectionError::UnsupportedUrl(_))
        ));
    }

    #[test]
    fn test_product_override() {
        let connection = SeaOrmConnection::new("sqlite::memory:").unwrap().with_product("H2");
        assert_eq!(connection.product(), "H2");
    }

    #[test]
    fn test_sqlite_url_gains_create_mode_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested").join("ctx.db");
        let url = format!("sqlite://{}", file.display());

        let modified = SeaOrmConnection::ensure_sqlite_auto_creation(&url).unwrap();

        assert_eq!(modified, format!("{url}?mode=rwc"));
        assert!(file.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn test_statements_require_open_connection() {
        let connection = SeaOrmConnection::new("sqlite::memory:").unwrap();
        assert!(matches!(connection.execute("SELECT 1").await, Err(ConnectionError::NotOpen)));
    }

    #[tokio::test]
    async fn test_execute_and_query_in_memory() {
        let mut connection = SeaOrmConnection::new("sqlite::memory:").unwrap();
        connection.open().await.unwrap();

        connection
            .execute("CREATE TABLE t (id INTEGER, name VARCHAR(10))")
            .await
            .unwrap();
        let inserted = connection
            .execute("INSERT INTO t (id, name) VALUES (1, 'a'), (2, 'b')")
            .await
            .unwrap();
        let rows = connection.query("SELECT id, name FROM t ORDER BY id").await.unwrap();

        assert_eq!(inserted, 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("name"), Some(&FieldValue::from("b")));

        connection.close().await.unwrap();
        assert!(!connection.is_open());
    }

    #[tokio::test]
    async fn test_rollback_discards_statements_since_begin() {
        let mut connection = SeaOrmConnection::new("sqlite::memory:").unwrap();
        connection.open().await.unwrap();
        connection.execute("CREATE TABLE t (id INTEGER)").await.unwrap();
        connection.execute("INSERT INTO t (id) VALUES (1)").await.unwrap();

        connection.begin().await.unwrap();
        assert!(connection.in_transaction());
        connection.execute("INSERT INTO t (id) VALUES (2)").await.unwrap();
        assert_eq!(connection.query("SELECT id FROM t").await.unwrap().len(), 2);
        connection.rollback().await.unwrap();

        assert!(!connection.in_transaction());
        assert_eq!(connection.query("SELECT id FROM t").await.unwrap().len(), 1);
        assert!(matches!(connection.commit().await, Err(ConnectionError::NoTransaction)));
        connection.close().await.unwrap();
    }
}
