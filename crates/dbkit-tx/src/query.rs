//! Generic row helpers.
//!
//! Each helper resolves its executor through the [`Scope`], so the same
//! data-access function runs standalone or inside a transaction. Rows are
//! mapped with a caller-supplied binder that returns one scan destination per
//! column:
//!
//! ```ignore
//! let users = query(&scope, "SELECT id, email FROM users", &[], |u: &mut User| {
//!     dests![u.id, u.email]
//! })
//! .await;
//! ```

use dbkit_core::{ConfigError, Destinations, Error, NotFoundError, Outcome, Value};

use crate::scope::Scope;

/// Run a query and map every row into a `T`.
///
/// A scan failure aborts the whole call; rows mapped so far are discarded.
pub async fn query<T, F>(
    scope: &Scope<'_>,
    sql: &str,
    params: &[Value],
    mut binder: F,
) -> Outcome<Vec<T>, Error>
where
    T: Default,
    F: FnMut(&mut T) -> Destinations<'_>,
{
    let rows = match scope.executor().query(scope.cx(), sql, params).await {
        Outcome::Ok(rows) => rows,
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    };
    tracing::trace!(
        sql = %sql,
        rows = rows.len(),
        in_transaction = scope.in_transaction(),
        "Mapping query rows"
    );

    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut item = T::default();
        let mut dests = binder(&mut item);
        if let Err(e) = row.scan_into(&mut dests) {
            return Outcome::Err(e);
        }
        drop(dests);
        out.push(item);
    }
    Outcome::Ok(out)
}

/// Run a query expected to return one row and map it into a `T`.
///
/// Zero rows yields [`Error::NotFound`] carrying the scope's data source.
/// The scope must name one; a lookup without it fails with
/// [`Error::Config`].
pub async fn query_row<T, F>(
    scope: &Scope<'_>,
    sql: &str,
    params: &[Value],
    binder: F,
) -> Outcome<T, Error>
where
    T: Default,
    F: FnOnce(&mut T) -> Destinations<'_>,
{
    let row = match scope.executor().query_one(scope.cx(), sql, params).await {
        Outcome::Ok(row) => row,
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    };

    let Some(row) = row else {
        return match scope.data_source() {
            Some(name) => Outcome::Err(Error::NotFound(NotFoundError::new(name))),
            None => {
                tracing::error!(
                    sql = %sql,
                    "Single-row lookup found no rows in a scope without a data source"
                );
                Outcome::Err(Error::Config(ConfigError {
                    message: "single-row lookup requires a data source on the scope".to_string(),
                    source: None,
                }))
            }
        };
    };
    tracing::trace!(sql = %sql, in_transaction = scope.in_transaction(), "Mapping single row");

    let mut item = T::default();
    let mut dests = binder(&mut item);
    if let Err(e) = row.scan_into(&mut dests) {
        return Outcome::Err(e);
    }
    drop(dests);
    Outcome::Ok(item)
}

/// Execute a mutating statement and return the generated identifier.
pub async fn exec(scope: &Scope<'_>, sql: &str, params: &[Value]) -> Outcome<i64, Error> {
    tracing::trace!(sql = %sql, in_transaction = scope.in_transaction(), "Executing statement");
    match scope.executor().execute(scope.cx(), sql, params).await {
        Outcome::Ok(result) => match result.last_insert_id() {
            Ok(id) => Outcome::Ok(id),
            Err(e) => Outcome::Err(e),
        },
        Outcome::Err(e) => Outcome::Err(e),
        Outcome::Cancelled(r) => Outcome::Cancelled(r),
        Outcome::Panicked(p) => Outcome::Panicked(p),
    }
}
