//! Relational connections used by the persisted context
//!
//! The engine only sees [`RelationalConnection`]; [`SeaOrmConnection`] is the
//! shipped implementation for SQLite, PostgreSQL and MySQL.

use async_trait::async_trait;

use crate::errors::ConnectionResult;
use crate::frame::Frame;

pub mod seaorm;

pub use seaorm::{DatabaseType, SeaOrmConnection};

/// A single connection able to run raw SQL text
#[async_trait]
pub trait RelationalConnection: Send + Sync {
    /// Dialect product identifier, e.g. `SQLite` or `MySQL`
    fn product(&self) -> &str;

    async fn open(&mut self) -> ConnectionResult<()>;

    /// Run a statement, returning the number of affected rows
    async fn execute(&self, sql: &str) -> ConnectionResult<u64>;

    /// Run a query, returning each row as a frame keyed by column name
    async fn query(&self, sql: &str) -> ConnectionResult<Vec<Frame>>;

    /// Start a transaction; statements run inside it until commit or rollback
    async fn begin(&mut self) -> ConnectionResult<()>;

    async fn commit(&mut self) -> ConnectionResult<()>;

    async fn rollback(&mut self) -> ConnectionResult<()>;

    async fn close(&mut self) -> ConnectionResult<()>;
}
