//! Transaction contexts and the provider that scopes them.
//!
//! [`TransactionProvider::run_in_transaction`] is the primary entry point:
//! it begins a transaction, hands the unit of work a [`Scope`] bound to it,
//! and finalizes exactly once on every exit path, including a panic inside
//! the unit of work.
//!
//! ```text
//! Unopened --acquire--> Open --commit----> Committed
//!                            \--rollback--> RolledBack
//! ```

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;

use dbkit_core::{
    Connector, Cx, Error, ExecResult, Executor, Outcome, PreparedStatement, Row,
    TransactionError, TransactionErrorKind, TransactionHandle, TxOptions, Value,
};
use futures::FutureExt;
use futures::future::{self, BoxFuture};

use crate::scope::Scope;

/// An open transaction bound to the scope it was acquired from.
///
/// `TxContext` is itself an [`Executor`]: statements issued through it (or
/// through a [`Scope`] obtained from [`TxContext::scope`]) run inside the
/// transaction. [`commit`](Self::commit) and [`rollback`](Self::rollback)
/// consume the context, so it cannot be finalized twice or used afterwards.
///
/// Dropping an unfinalized context logs a warning; the driver is left to
/// roll the transaction back.
pub struct TxContext<'a, T: TransactionHandle> {
    cx: &'a Cx,
    connection: &'a dyn Executor,
    data_source: Option<&'a str>,
    options: TxOptions,
    tx: Option<T>,
}

impl<'a, T: TransactionHandle> TxContext<'a, T> {
    pub fn cx(&self) -> &'a Cx {
        self.cx
    }

    /// The options the transaction was begun with.
    pub fn options(&self) -> TxOptions {
        self.options
    }

    pub fn data_source(&self) -> Option<&'a str> {
        self.data_source
    }

    /// A scope whose statements resolve to this transaction.
    pub fn scope(&self) -> Scope<'_> {
        let scope = Scope::new(self.cx, self.connection).with_transaction(self);
        match self.data_source {
            Some(name) => scope.with_data_source(name),
            None => scope,
        }
    }

    /// Commit the transaction.
    pub async fn commit(mut self) -> Outcome<(), Error> {
        let Some(tx) = self.tx.take() else {
            return Outcome::Err(already_finalized());
        };
        tracing::debug!(
            data_source = self.data_source.unwrap_or_default(),
            "Committing transaction"
        );
        tx.commit(self.cx).await
    }

    /// Roll the transaction back.
    pub async fn rollback(mut self) -> Outcome<(), Error> {
        let Some(tx) = self.tx.take() else {
            return Outcome::Err(already_finalized());
        };
        tracing::debug!(
            data_source = self.data_source.unwrap_or_default(),
            "Rolling back transaction"
        );
        tx.rollback(self.cx).await
    }
}

impl<T: TransactionHandle> Executor for TxContext<'_, T> {
    fn prepare<'b>(
        &'b self,
        cx: &'b Cx,
        sql: &'b str,
    ) -> BoxFuture<'b, Outcome<PreparedStatement, Error>> {
        match &self.tx {
            Some(tx) => tx.prepare(cx, sql),
            None => finalized(),
        }
    }

    fn execute<'b>(
        &'b self,
        cx: &'b Cx,
        sql: &'b str,
        params: &'b [Value],
    ) -> BoxFuture<'b, Outcome<ExecResult, Error>> {
        match &self.tx {
            Some(tx) => tx.execute(cx, sql, params),
            None => finalized(),
        }
    }

    fn query<'b>(
        &'b self,
        cx: &'b Cx,
        sql: &'b str,
        params: &'b [Value],
    ) -> BoxFuture<'b, Outcome<Vec<Row>, Error>> {
        match &self.tx {
            Some(tx) => tx.query(cx, sql, params),
            None => finalized(),
        }
    }

    fn query_one<'b>(
        &'b self,
        cx: &'b Cx,
        sql: &'b str,
        params: &'b [Value],
    ) -> BoxFuture<'b, Outcome<Option<Row>, Error>> {
        match &self.tx {
            Some(tx) => tx.query_one(cx, sql, params),
            None => finalized(),
        }
    }
}

impl<T: TransactionHandle> Drop for TxContext<'_, T> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::warn!(
                data_source = self.data_source.unwrap_or_default(),
                "Transaction context dropped without commit or rollback"
            );
        }
    }
}

impl<T: TransactionHandle> fmt::Debug for TxContext<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxContext")
            .field("data_source", &self.data_source)
            .field("options", &self.options)
            .field("finalized", &self.tx.is_none())
            .finish_non_exhaustive()
    }
}

fn already_finalized() -> Error {
    Error::Transaction(TransactionError {
        kind: TransactionErrorKind::AlreadyFinalized,
        message: "transaction already committed or rolled back".to_string(),
    })
}

fn finalized<'b, T: Send + 'b>() -> BoxFuture<'b, Outcome<T, Error>> {
    Box::pin(future::ready(Outcome::Err(already_finalized())))
}

/// Begins transactions on a connection and scopes units of work inside them.
#[derive(Debug)]
pub struct TransactionProvider<C> {
    conn: C,
    options: TxOptions,
}

impl<C: Connector> TransactionProvider<C> {
    /// Create a provider using the driver's default isolation, read-write.
    pub fn new(conn: C) -> Self {
        Self {
            conn,
            options: TxOptions::default(),
        }
    }

    /// Change the options used by [`acquire`](Self::acquire) and
    /// [`run_in_transaction`](Self::run_in_transaction).
    #[must_use]
    pub fn with_default_options(mut self, options: TxOptions) -> Self {
        self.options = options;
        self
    }

    pub fn connector(&self) -> &C {
        &self.conn
    }

    pub fn default_options(&self) -> TxOptions {
        self.options
    }

    /// Begin a transaction with the default options.
    pub async fn acquire<'a>(
        &'a self,
        scope: &Scope<'a>,
    ) -> Outcome<TxContext<'a, C::Tx<'a>>, Error> {
        self.acquire_with(scope, self.options).await
    }

    /// Begin a transaction with explicit options.
    ///
    /// A driver failure to begin is returned unchanged.
    pub async fn acquire_with<'a>(
        &'a self,
        scope: &Scope<'a>,
        options: TxOptions,
    ) -> Outcome<TxContext<'a, C::Tx<'a>>, Error> {
        let cx = scope.cx();
        tracing::debug!(
            isolation = options.isolation.map(|level| level.as_sql()),
            read_only = options.read_only,
            data_source = scope.data_source().unwrap_or_default(),
            "Beginning transaction"
        );
        match self.conn.begin_with(cx, options).await {
            Outcome::Ok(tx) => Outcome::Ok(TxContext {
                cx,
                connection: scope.connection(),
                data_source: scope.data_source(),
                options,
                tx: Some(tx),
            }),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Run `f` inside a transaction begun with the default options.
    pub async fn run_in_transaction<R, F>(&self, scope: &Scope<'_>, f: F) -> Outcome<R, Error>
    where
        F: for<'t> FnOnce(&'t Scope<'t>) -> BoxFuture<'t, Outcome<R, Error>>,
    {
        self.run_in_transaction_with(scope, self.options, f).await
    }

    /// Run `f` inside a transaction and finalize it exactly once.
    ///
    /// - If `scope` is already bound to a transaction, `f` joins it and
    ///   nothing is finalized here; the outer owner decides.
    /// - If the transaction cannot be begun, `f` is never invoked.
    /// - `Outcome::Ok` commits. Any other outcome rolls back and is returned.
    /// - A panic in `f` rolls back and is returned as a
    ///   [`TransactionErrorKind::UnitOfWorkPanicked`] error.
    /// - A commit or rollback failure replaces whatever `f` produced.
    pub async fn run_in_transaction_with<R, F>(
        &self,
        scope: &Scope<'_>,
        options: TxOptions,
        f: F,
    ) -> Outcome<R, Error>
    where
        F: for<'t> FnOnce(&'t Scope<'t>) -> BoxFuture<'t, Outcome<R, Error>>,
    {
        if scope.in_transaction() {
            tracing::trace!("Joining enclosing transaction");
            return f(scope).await;
        }

        let cx = scope.cx();
        let tx = match self.acquire_with(scope, options).await {
            Outcome::Ok(tx) => tx,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let result = {
            let inner = tx.scope();
            AssertUnwindSafe(async { f(&inner).await })
                .catch_unwind()
                .await
        };

        match result {
            Ok(Outcome::Ok(value)) => {
                let finalized = tx.commit().await;
                finalize_failure(cx, finalized).unwrap_or(Outcome::Ok(value))
            }
            Ok(outcome) => {
                let finalized = tx.rollback().await;
                finalize_failure(cx, finalized).unwrap_or(outcome)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(panic = %message, "Unit of work panicked, rolling back");
                let finalized = tx.rollback().await;
                finalize_failure(cx, finalized).unwrap_or_else(|| {
                    Outcome::Err(Error::Transaction(TransactionError {
                        kind: TransactionErrorKind::UnitOfWorkPanicked,
                        message: format!("unit of work panicked: {message}"),
                    }))
                })
            }
        }
    }
}

/// The outcome to return instead of the unit of work's when finalizing failed.
fn finalize_failure<R>(cx: &Cx, finalized: Outcome<(), Error>) -> Option<Outcome<R, Error>> {
    match finalized {
        Outcome::Ok(()) => None,
        Outcome::Err(e) => {
            if cx.cancel_reason().is_some() && e.is_timeout() {
                tracing::warn!(error = %e, "query response time exceeded the configured timeout");
            }
            Some(Outcome::Err(e))
        }
        Outcome::Cancelled(r) => Some(Outcome::Cancelled(r)),
        Outcome::Panicked(p) => Some(Outcome::Panicked(p)),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asupersync::runtime::RuntimeBuilder;
    use asupersync::{CancelKind, CancelReason};
    use dbkit_core::{IsolationLevel, QueryError, QueryErrorKind};
    use std::future::Future;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct MockState {
        begun: Vec<TxOptions>,
        commits: usize,
        rollbacks: usize,
        executed: Vec<String>,
        fail_begin: bool,
        fail_commit: bool,
        fail_rollback: Option<Error>,
    }

    struct MockConnection {
        state: Arc<Mutex<MockState>>,
    }

    struct MockTransaction {
        state: Arc<Mutex<MockState>>,
    }

    fn record(state: &Arc<Mutex<MockState>>, sql: &str) {
        state.lock().expect("lock poisoned").executed.push(sql.to_string());
    }

    fn driver_error(message: &str) -> Error {
        Error::Query(QueryError {
            kind: QueryErrorKind::Database,
            sql: None,
            sqlstate: None,
            message: message.to_string(),
            source: None,
        })
    }

    macro_rules! recording_executor {
        ($ty:ty, $prefix:literal) => {
            impl Executor for $ty {
                fn prepare<'a>(
                    &'a self,
                    _cx: &'a Cx,
                    sql: &'a str,
                ) -> BoxFuture<'a, Outcome<PreparedStatement, Error>> {
                    Box::pin(async move {
                        Outcome::Ok(PreparedStatement::new(1, sql.to_string(), 0))
                    })
                }

                fn execute<'a>(
                    &'a self,
                    _cx: &'a Cx,
                    sql: &'a str,
                    _params: &'a [Value],
                ) -> BoxFuture<'a, Outcome<ExecResult, Error>> {
                    record(&self.state, &format!("{}{}", $prefix, sql));
                    Box::pin(async { Outcome::Ok(ExecResult::new(1, Some(1))) })
                }

                fn query<'a>(
                    &'a self,
                    _cx: &'a Cx,
                    sql: &'a str,
                    _params: &'a [Value],
                ) -> BoxFuture<'a, Outcome<Vec<Row>, Error>> {
                    record(&self.state, &format!("{}{}", $prefix, sql));
                    Box::pin(async { Outcome::Ok(Vec::new()) })
                }

                fn query_one<'a>(
                    &'a self,
                    _cx: &'a Cx,
                    sql: &'a str,
                    _params: &'a [Value],
                ) -> BoxFuture<'a, Outcome<Option<Row>, Error>> {
                    record(&self.state, &format!("{}{}", $prefix, sql));
                    Box::pin(async { Outcome::Ok(None) })
                }
            }
        };
    }

    recording_executor!(MockConnection, "conn: ");
    recording_executor!(MockTransaction, "tx: ");

    impl TransactionHandle for MockTransaction {
        fn commit(self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
            async move {
                let mut state = self.state.lock().expect("lock poisoned");
                if state.fail_commit {
                    return Outcome::Err(driver_error("commit failed"));
                }
                state.commits += 1;
                Outcome::Ok(())
            }
        }

        fn rollback(self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
            async move {
                let mut state = self.state.lock().expect("lock poisoned");
                if let Some(e) = state.fail_rollback.take() {
                    return Outcome::Err(e);
                }
                state.rollbacks += 1;
                Outcome::Ok(())
            }
        }
    }

    impl Connector for MockConnection {
        type Tx<'conn>
            = MockTransaction
        where
            Self: 'conn;

        fn begin_with(
            &self,
            _cx: &Cx,
            options: TxOptions,
        ) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send {
            let state = Arc::clone(&self.state);
            async move {
                let mut guard = state.lock().expect("lock poisoned");
                if guard.fail_begin {
                    return Outcome::Err(driver_error("begin failed"));
                }
                guard.begun.push(options);
                drop(guard);
                Outcome::Ok(MockTransaction { state })
            }
        }
    }

    fn setup() -> (Arc<Mutex<MockState>>, TransactionProvider<MockConnection>) {
        let state = Arc::new(Mutex::new(MockState::default()));
        let provider = TransactionProvider::new(MockConnection {
            state: Arc::clone(&state),
        });
        (state, provider)
    }

    fn unwrap_outcome<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> T {
        match outcome {
            Outcome::Ok(v) => v,
            other => std::panic::panic_any(format!("unexpected outcome: {other:?}")),
        }
    }

    fn unwrap_err<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> Error {
        match outcome {
            Outcome::Err(e) => e,
            other => std::panic::panic_any(format!("expected error, got: {other:?}")),
        }
    }

    #[test]
    fn test_commit_on_success() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let (state, provider) = setup();

        rt.block_on(async {
            let scope = Scope::new(&cx, provider.connector());
            let value = unwrap_outcome(
                provider
                    .run_in_transaction(&scope, |s| {
                        Box::pin(async move {
                            assert!(s.in_transaction());
                            match s.executor().execute(s.cx(), "INSERT 1", &[]).await {
                                Outcome::Ok(_) => Outcome::Ok(42_i32),
                                Outcome::Err(e) => Outcome::Err(e),
                                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                                Outcome::Panicked(p) => Outcome::Panicked(p),
                            }
                        })
                    })
                    .await,
            );
            assert_eq!(value, 42);
        });

        let state = state.lock().expect("lock poisoned");
        assert_eq!(state.commits, 1);
        assert_eq!(state.rollbacks, 0);
        assert_eq!(state.executed, ["tx: INSERT 1"]);
        assert_eq!(state.begun, [dbkit_core::DEFAULT_TX_OPTIONS]);
    }

    #[test]
    fn test_rollback_on_error() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let (state, provider) = setup();

        rt.block_on(async {
            let scope = Scope::new(&cx, provider.connector());
            let err = unwrap_err(
                provider
                    .run_in_transaction(&scope, |_s| {
                        Box::pin(async { Outcome::<(), _>::Err(Error::Custom("boom".into())) })
                    })
                    .await,
            );
            assert_eq!(err.to_string(), "boom");
        });

        let state = state.lock().expect("lock poisoned");
        assert_eq!(state.commits, 0);
        assert_eq!(state.rollbacks, 1);
    }

    fn explode() -> Outcome<(), Error> {
        panic!("unit of work exploded")
    }

    #[test]
    fn test_panic_rolls_back_and_surfaces() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let (state, provider) = setup();

        rt.block_on(async {
            let scope = Scope::new(&cx, provider.connector());
            let err = unwrap_err(
                provider
                    .run_in_transaction(&scope, |_s| Box::pin(async { explode() }))
                    .await,
            );
            match err {
                Error::Transaction(te) => {
                    assert_eq!(te.kind, TransactionErrorKind::UnitOfWorkPanicked);
                    assert!(te.message.contains("unit of work exploded"));
                }
                other => panic!("expected transaction error, got {other:?}"),
            }
        });

        let state = state.lock().expect("lock poisoned");
        assert_eq!(state.commits, 0);
        assert_eq!(state.rollbacks, 1);
    }

    #[test]
    fn test_begin_failure_skips_unit_of_work() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let (state, provider) = setup();
        state.lock().expect("lock poisoned").fail_begin = true;
        let invoked = Arc::new(Mutex::new(false));

        rt.block_on(async {
            let scope = Scope::new(&cx, provider.connector());
            let flag = Arc::clone(&invoked);
            let err = unwrap_err(
                provider
                    .run_in_transaction(&scope, move |_s| {
                        Box::pin(async move {
                            *flag.lock().expect("lock poisoned") = true;
                            Outcome::<(), Error>::Ok(())
                        })
                    })
                    .await,
            );
            assert_eq!(err.to_string(), "Query error: begin failed");
        });

        assert!(!*invoked.lock().expect("lock poisoned"));
        let state = state.lock().expect("lock poisoned");
        assert_eq!(state.commits, 0);
        assert_eq!(state.rollbacks, 0);
    }

    #[test]
    fn test_commit_failure_replaces_result() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let (state, provider) = setup();
        state.lock().expect("lock poisoned").fail_commit = true;

        rt.block_on(async {
            let scope = Scope::new(&cx, provider.connector());
            let err = unwrap_err(
                provider
                    .run_in_transaction(&scope, |_s| {
                        Box::pin(async { Outcome::<i32, Error>::Ok(7) })
                    })
                    .await,
            );
            assert_eq!(err.to_string(), "Query error: commit failed");
        });

        let state = state.lock().expect("lock poisoned");
        assert_eq!(state.commits, 0);
        assert_eq!(state.rollbacks, 0);
    }

    #[test]
    fn test_joins_enclosing_transaction() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let (state, provider) = setup();

        rt.block_on(async {
            let scope = Scope::new(&cx, provider.connector());
            let tx = unwrap_outcome(provider.acquire(&scope).await);
            let outer = tx.scope();

            unwrap_outcome(
                provider
                    .run_in_transaction(&outer, |s| {
                        Box::pin(async move {
                            match s.executor().query(s.cx(), "SELECT 1", &[]).await {
                                Outcome::Ok(_) => Outcome::Ok(()),
                                Outcome::Err(e) => Outcome::Err(e),
                                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                                Outcome::Panicked(p) => Outcome::Panicked(p),
                            }
                        })
                    })
                    .await,
            );
            assert_eq!(state.lock().expect("lock poisoned").commits, 0);
            unwrap_outcome(tx.commit().await);
        });

        let state = state.lock().expect("lock poisoned");
        assert_eq!(state.begun.len(), 1);
        assert_eq!(state.commits, 1);
        assert_eq!(state.executed, ["tx: SELECT 1"]);
    }

    #[test]
    fn test_acquire_with_options_and_explicit_rollback() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let (state, provider) = setup();
        let options = TxOptions::new()
            .isolation(IsolationLevel::Serializable)
            .read_only(true);
        let provider = provider.with_default_options(options);
        assert_eq!(provider.default_options(), options);

        rt.block_on(async {
            let scope = Scope::new(&cx, provider.connector()).with_data_source("orders");
            let tx = unwrap_outcome(provider.acquire(&scope).await);
            assert_eq!(tx.options(), options);
            assert_eq!(tx.data_source(), Some("orders"));
            assert_eq!(tx.scope().data_source(), Some("orders"));

            unwrap_outcome(tx.execute(&cx, "UPDATE 1", &[]).await);
            unwrap_outcome(scope.executor().execute(&cx, "UPDATE 2", &[]).await);
            unwrap_outcome(tx.rollback().await);
        });

        let state = state.lock().expect("lock poisoned");
        assert_eq!(state.begun, [options]);
        assert_eq!(state.rollbacks, 1);
        assert_eq!(state.executed, ["tx: UPDATE 1", "conn: UPDATE 2"]);
    }

    #[test]
    fn test_rollback_failure_replaces_error() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let (state, provider) = setup();
        state.lock().expect("lock poisoned").fail_rollback = Some(driver_error("rollback failed"));

        rt.block_on(async {
            let scope = Scope::new(&cx, provider.connector());
            let err = unwrap_err(
                provider
                    .run_in_transaction(&scope, |_s| {
                        Box::pin(async { Outcome::<(), _>::Err(Error::Custom("boom".into())) })
                    })
                    .await,
            );
            assert_eq!(err.to_string(), "Query error: rollback failed");
        });

        let state = state.lock().expect("lock poisoned");
        assert_eq!(state.commits, 0);
        assert_eq!(state.rollbacks, 0);
    }

    #[test]
    fn test_cancelled_unit_of_work_rolls_back() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let (state, provider) = setup();

        rt.block_on(async {
            let scope = Scope::new(&cx, provider.connector());
            let outcome = provider
                .run_in_transaction(&scope, |_s| {
                    Box::pin(async {
                        Outcome::<(), Error>::Cancelled(CancelReason::user("client went away"))
                    })
                })
                .await;
            match outcome {
                Outcome::Cancelled(reason) => assert_eq!(reason.kind, CancelKind::User),
                other => panic!("expected cancellation, got {other:?}"),
            }
        });

        let state = state.lock().expect("lock poisoned");
        assert_eq!(state.commits, 0);
        assert_eq!(state.rollbacks, 1);
    }

    #[test]
    fn test_timeout_during_rollback_on_cancelled_cx() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let (state, provider) = setup();
        state.lock().expect("lock poisoned").fail_rollback = Some(Error::Timeout);

        rt.block_on(async {
            let scope = Scope::new(&cx, provider.connector());
            let err = unwrap_err(
                provider
                    .run_in_transaction(&scope, |s| {
                        s.cx().cancel_with(CancelKind::Timeout, Some("deadline"));
                        Box::pin(async { Outcome::<(), _>::Err(Error::Custom("slow".into())) })
                    })
                    .await,
            );
            assert!(err.is_timeout());
        });

        assert!(cx.cancel_reason().is_some());
        let state = state.lock().expect("lock poisoned");
        assert_eq!(state.commits, 0);
        assert_eq!(state.rollbacks, 0);
    }

    #[test]
    fn test_rollback_failure_wins_over_panic() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let (state, provider) = setup();
        state.lock().expect("lock poisoned").fail_rollback = Some(driver_error("rollback failed"));

        rt.block_on(async {
            let scope = Scope::new(&cx, provider.connector());
            let err = unwrap_err(
                provider
                    .run_in_transaction(&scope, |_s| Box::pin(async { explode() }))
                    .await,
            );
            assert_eq!(err.to_string(), "Query error: rollback failed");
        });

        let state = state.lock().expect("lock poisoned");
        assert_eq!(state.commits, 0);
        assert_eq!(state.rollbacks, 0);
    }
}
