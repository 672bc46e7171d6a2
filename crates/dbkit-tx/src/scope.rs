//! Per-request data-access scope.
//!
//! A [`Scope`] is the explicit handle data-access code receives instead of
//! looking "the current transaction" up in an ambient context. It carries the
//! cancellation context, the plain connection to fall back to, the open
//! transaction (if any) and the data-source identifier used in not-found
//! errors.

use std::fmt;

use dbkit_core::{Cx, Executor};

/// Explicit per-request handle threaded through data-access calls.
///
/// Scopes are cheap to copy. A scope bound to a transaction is produced by
/// [`TxContext::scope`](crate::TxContext::scope); code that receives it runs
/// its statements inside that transaction without knowing so.
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    cx: &'a Cx,
    connection: &'a dyn Executor,
    transaction: Option<&'a dyn Executor>,
    data_source: Option<&'a str>,
}

impl<'a> Scope<'a> {
    /// Create a scope that runs statements on `connection`.
    pub fn new(cx: &'a Cx, connection: &'a dyn Executor) -> Self {
        Self {
            cx,
            connection,
            transaction: None,
            data_source: None,
        }
    }

    /// Attach the data-source identifier reported by not-found errors.
    #[must_use]
    pub fn with_data_source(mut self, name: &'a str) -> Self {
        self.data_source = Some(name);
        self
    }

    /// Bind an open transaction; statements resolve to it from now on.
    #[must_use]
    pub fn with_transaction(mut self, transaction: &'a dyn Executor) -> Self {
        self.transaction = Some(transaction);
        self
    }

    pub fn cx(&self) -> &'a Cx {
        self.cx
    }

    pub fn data_source(&self) -> Option<&'a str> {
        self.data_source
    }

    /// The plain connection, ignoring any bound transaction.
    pub fn connection(&self) -> &'a dyn Executor {
        self.connection
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// The executor statements in this scope should run on.
    pub fn executor(&self) -> &'a dyn Executor {
        resolve_executor(self, self.connection)
    }
}

impl fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("in_transaction", &self.in_transaction())
            .field("data_source", &self.data_source)
            .finish_non_exhaustive()
    }
}

/// Pick the executor for a statement issued in `scope`.
///
/// Returns the transaction bound to the scope, or `fallback` when the scope
/// is not inside a transaction.
pub fn resolve_executor<'a>(scope: &Scope<'a>, fallback: &'a dyn Executor) -> &'a dyn Executor {
    scope.transaction.unwrap_or(fallback)
}
