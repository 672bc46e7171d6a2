//! dbkit - nullable SQL values and scoped transactions.
//!
//! dbkit sits between application code and a database driver and provides:
//!
//! - `Nullable<T>` scalars that round-trip through both the driver value
//!   protocol (`Value::Null`) and JSON (`null`)
//! - Transaction scoping that commits on success, rolls back on error or
//!   panic, and finalizes exactly once
//! - Transaction-agnostic data access through an explicit `Scope`
//! - Generic `query` / `query_row` / `exec` helpers
//!
//! # Quick Start
//!
//! ```ignore
//! use dbkit::prelude::*;
//!
//! #[derive(Debug, Default)]
//! struct Account {
//!     id: i64,
//!     email: Nullable<String>,
//! }
//!
//! async fn rename(cx: &Cx, provider: &TransactionProvider<PgConnection>) -> Outcome<i64, Error> {
//!     let scope = Scope::new(cx, provider.connector()).with_data_source("accounts");
//!     provider
//!         .run_in_transaction(&scope, |s| {
//!             Box::pin(async move {
//!                 let sql = "SELECT id, email FROM accounts LIMIT 1";
//!                 let account = match query_row(s, sql, &[], |a: &mut Account| {
//!                     dests![a.id, a.email]
//!                 })
//!                 .await
//!                 {
//!                     Outcome::Ok(account) => account,
//!                     Outcome::Err(e) => return Outcome::Err(e),
//!                     Outcome::Cancelled(r) => return Outcome::Cancelled(r),
//!                     Outcome::Panicked(p) => return Outcome::Panicked(p),
//!                 };
//!                 let params = [Value::BigInt(account.id)];
//!                 exec(s, "UPDATE accounts SET email = NULL WHERE id = $1", &params).await
//!             })
//!         })
//!         .await
//! }
//! ```
//!
//! # Features
//!
//! - **Structured concurrency**: Built on asupersync for cancel-correct operations
//! - **Strict text decoding**: JSON overflow, fractions and wrong literal kinds
//!   are decode errors
//! - **Explicit coercion table**: Driver values widen and parse into scalars
//!   through one table with a single failure branch

// Re-export all public types from sub-crates
pub use dbkit_core::{
    // Driver seam
    ColumnInfo,
    Connector,
    // asupersync re-exports
    Cx,
    DEFAULT_TX_OPTIONS,
    Destinations,
    // Errors
    Error,
    ExecResult,
    Executor,
    IsolationLevel,
    NotFoundError,
    // Nullable values
    Nullable,
    Outcome,
    PreparedStatement,
    Result,
    Row,
    Scalar,
    Scan,
    Timestamp,
    TransactionError,
    TransactionErrorKind,
    TransactionHandle,
    TxOptions,
    TypeError,
    Value,
    dests,
};

pub use dbkit_core::{connection, error, nullable, row, scalar, scan, value};

pub use dbkit_tx::{
    Scope, TransactionProvider, TxContext, exec, query, query_row, resolve_executor,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        Cx, Destinations, Error, Executor, IsolationLevel, Nullable, Outcome, Result, Row, Scan,
        Scope, Timestamp, TransactionProvider, TxContext, TxOptions, Value, dests, exec, query,
        query_row,
    };
}
