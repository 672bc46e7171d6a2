//! Driver-facing connection traits.
//!
//! This module defines the seam between dbkit and a concrete database driver:
//!
//! - [`Executor`] - the minimal capability (prepare/execute/query/query-one)
//!   shared by plain connections and open transactions
//! - [`Connector`] - a connection that can begin transactions
//! - [`TransactionHandle`] - an open transaction that can be finalized
//! - [`TxOptions`] / [`IsolationLevel`] - transaction configuration
//!
//! Every operation takes a `Cx` so a caller-imposed cancellation or deadline
//! unblocks it with `Outcome::Cancelled` or a timeout error instead of hanging.

use std::future::Future;

use asupersync::{Cx, Outcome};
use futures::future::BoxFuture;

use crate::error::{Error, Result};
use crate::row::Row;
use crate::value::Value;

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    /// Transactions can see uncommitted changes from others.
    ReadUncommitted,

    /// Transactions only see committed changes from others.
    ReadCommitted,

    /// Transactions see a consistent snapshot of the database.
    RepeatableRead,

    /// Transactions appear to execute sequentially.
    Serializable,
}

impl IsolationLevel {
    /// Get the SQL syntax for this isolation level.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Options for beginning a transaction.
///
/// `isolation: None` leaves the choice to the driver's default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxOptions {
    pub isolation: Option<IsolationLevel>,
    pub read_only: bool,
}

/// Driver-default isolation, read-write.
pub const DEFAULT_TX_OPTIONS: TxOptions = TxOptions {
    isolation: None,
    read_only: false,
};

impl TxOptions {
    pub fn new() -> Self {
        DEFAULT_TX_OPTIONS
    }

    /// Set the isolation level.
    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = Some(level);
        self
    }

    /// Set read-only mode.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Render the `BEGIN` statement for drivers that start transactions in SQL.
    pub fn begin_sql(&self) -> String {
        let mut sql = String::from("BEGIN");
        if let Some(level) = self.isolation {
            sql.push_str(" ISOLATION LEVEL ");
            sql.push_str(level.as_sql());
        }
        if self.read_only {
            sql.push_str(" READ ONLY");
        }
        sql
    }
}

/// A prepared statement for repeated execution.
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    id: u64,
    sql: String,
    param_count: usize,
    columns: Option<Vec<String>>,
}

impl PreparedStatement {
    /// Create a new prepared statement.
    ///
    /// This is typically called by the driver, not by users directly.
    #[must_use]
    pub fn new(id: u64, sql: String, param_count: usize) -> Self {
        Self {
            id,
            sql,
            param_count,
            columns: None,
        }
    }

    /// Create a prepared statement with column information.
    #[must_use]
    pub fn with_columns(id: u64, sql: String, param_count: usize, columns: Vec<String>) -> Self {
        Self {
            id,
            sql,
            param_count,
            columns: Some(columns),
        }
    }

    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub const fn param_count(&self) -> usize {
        self.param_count
    }

    #[must_use]
    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    /// Check if the provided parameters match the expected count.
    #[must_use]
    pub fn validate_params(&self, params: &[Value]) -> bool {
        params.len() == self.param_count
    }
}

/// Outcome descriptor of a mutating statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    rows_affected: u64,
    last_insert_id: Option<i64>,
}

impl ExecResult {
    pub fn new(rows_affected: u64, last_insert_id: Option<i64>) -> Self {
        Self {
            rows_affected,
            last_insert_id,
        }
    }

    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// The identifier generated by the statement.
    ///
    /// Fails when the driver did not report one (e.g. an `UPDATE`, or a
    /// backend without insert-id support).
    pub fn last_insert_id(&self) -> Result<i64> {
        self.last_insert_id.ok_or_else(|| {
            Error::Custom("driver did not report a last insert id for this statement".to_string())
        })
    }
}

/// The minimal operation set data-access code needs.
///
/// Implemented by plain connections and by open transactions alike, so the
/// same code runs standalone or inside a transaction. The trait is
/// object-safe: data-access code usually holds a `&dyn Executor`.
pub trait Executor: Send + Sync {
    /// Prepare a statement for repeated execution.
    fn prepare<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
    ) -> BoxFuture<'a, Outcome<PreparedStatement, Error>>;

    /// Execute a statement (INSERT, UPDATE, DELETE).
    fn execute<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<ExecResult, Error>>;

    /// Execute a query and return all rows.
    fn query<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<Vec<Row>, Error>>;

    /// Execute a query expected to yield at most one row.
    fn query_one<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<Option<Row>, Error>>;
}

/// An open transaction.
///
/// Finalizing consumes the handle, so a transaction cannot be finalized
/// twice or used after commit/rollback.
pub trait TransactionHandle: Executor {
    /// Commit the transaction, making all changes permanent.
    fn commit(self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Rollback the transaction, discarding all changes.
    fn rollback(self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;
}

/// A connection that can begin transactions.
pub trait Connector: Executor {
    /// The transaction type returned by this connection.
    type Tx<'conn>: TransactionHandle
    where
        Self: 'conn;

    /// Begin a transaction with the given isolation and read-only options.
    fn begin_with(
        &self,
        cx: &Cx,
        options: TxOptions,
    ) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send;
}
