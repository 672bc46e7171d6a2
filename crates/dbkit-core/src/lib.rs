//! Core types and traits for dbkit.
//!
//! This crate provides the foundations the transaction layer builds on:
//!
//! - `Nullable<T>` for SQL NULL-aware scalars, with independent driver and
//!   JSON encodings
//! - `Value` and `Row`, the native driver value protocol
//! - `Scan` destinations for decoding result columns
//! - `Executor`, `Connector` and `TransactionHandle`, the seam to a driver
//! - `Outcome` re-export from asupersync for cancel-correct operations
//! - `Cx` context for structured concurrency

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod connection;
pub mod error;
pub mod nullable;
pub mod row;
pub mod scalar;
pub mod scan;
pub mod value;

pub use connection::{
    Connector, DEFAULT_TX_OPTIONS, ExecResult, Executor, IsolationLevel, PreparedStatement,
    TransactionHandle, TxOptions,
};
pub use error::{
    ConfigError, ConnectionError, ConnectionErrorKind, Error, NotFoundError, QueryError,
    QueryErrorKind, Result, TransactionError, TransactionErrorKind, TypeError,
};
pub use nullable::Nullable;
pub use row::{ColumnInfo, Row};
pub use scalar::{Scalar, Timestamp};
pub use scan::{Destinations, Scan};
pub use value::Value;
