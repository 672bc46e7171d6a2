//! Scoped transactions and generic row helpers for dbkit.
//!
//! Data-access code takes a [`Scope`] and resolves its executor through it.
//! [`TransactionProvider::run_in_transaction`] hands the unit of work a scope
//! bound to a fresh transaction, so the same code runs standalone or inside
//! a transaction without branching.

pub mod query;
pub mod scope;
pub mod tx;

pub use query::{exec, query, query_row};
pub use scope::{Scope, resolve_executor};
pub use tx::{TransactionProvider, TxContext};
