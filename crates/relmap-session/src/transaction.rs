//! Closure-scoped transactions.
//!
//! ```ignore
//! let id = orm
//!     .run_in_transaction(&cx, |tx| {
//!         Box::pin(async move {
//!             let res = try_outcome!(tx.insert(&cx, &mut order).await);
//!             try_outcome!(tx.exec_with_row_affect_check(&cx, 1, DEBIT, &args).await);
//!             Outcome::Ok(res.last_insert_id)
//!         })
//!     })
//!     .await;
//! ```

use crate::orm::Orm;
use asupersync::{Cx, Outcome};
use relmap_core::{Connection, Error, TransactionOps};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Future returned by a transaction body.
pub type TxFuture<'t, T> = Pin<Box<dyn Future<Output = Outcome<T, Error>> + Send + 't>>;

impl<C: Connection> Orm<C> {
    /// Run `body` inside one transaction.
    ///
    /// The body gets an `Orm` bound to the open transaction. `Ok` commits.
    /// `Err` and `Cancelled` roll back and are returned unchanged. A panic
    /// in the body rolls back and then resumes unwinding. Exactly one of
    /// commit or rollback is issued per call.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn run_in_transaction<'a, T, F>(&'a self, cx: &Cx, body: F) -> Outcome<T, Error>
    where
        F: for<'t> FnOnce(&'t Orm<C::Tx<'a>>) -> TxFuture<'t, T>,
    {
        let tx = try_outcome!(self.executor().begin(cx).await);
        tracing::debug!("Transaction started");
        let scoped = Orm::with_state(tx, Arc::clone(self.state()));

        let result = {
            let fut = body(&scoped);
            CatchUnwind(fut).await
        };
        let tx = scoped.into_executor();

        match result {
            Ok(Outcome::Ok(value)) => match tx.commit(cx).await {
                Outcome::Ok(()) => {
                    tracing::debug!("Transaction committed");
                    Outcome::Ok(value)
                }
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            },
            Ok(Outcome::Err(e)) => {
                rollback(tx, cx, "transaction body failed").await;
                Outcome::Err(e)
            }
            Ok(Outcome::Cancelled(r)) => {
                rollback(tx, cx, "transaction body cancelled").await;
                Outcome::Cancelled(r)
            }
            Ok(Outcome::Panicked(p)) => {
                rollback(tx, cx, "transaction body panicked").await;
                Outcome::Panicked(p)
            }
            Err(payload) => {
                rollback(tx, cx, "transaction body panicked").await;
                panic::resume_unwind(payload)
            }
        }
    }
}

async fn rollback<T: TransactionOps>(tx: T, cx: &Cx, reason: &'static str) {
    tracing::debug!(reason, "Rolling back transaction");
    match tx.rollback(cx).await {
        Outcome::Ok(()) => {}
        Outcome::Err(e) => tracing::error!(error = %e, reason, "Rollback failed"),
        Outcome::Cancelled(_) => tracing::error!(reason, "Rollback cancelled"),
        Outcome::Panicked(_) => tracing::error!(reason, "Rollback panicked"),
    }
}

/// Polls the body, turning a panic into `Err(payload)`.
struct CatchUnwind<'t, T>(TxFuture<'t, T>);

impl<T> Future for CatchUnwind<'_, T> {
    type Output = std::thread::Result<Outcome<T, Error>>;

    fn poll(self: Pin<&mut Self>, task: &mut Context<'_>) -> Poll<Self::Output> {
        let fut = &mut self.get_mut().0;
        match panic::catch_unwind(AssertUnwindSafe(|| fut.as_mut().poll(task))) {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(out)) => Poll::Ready(Ok(out)),
            Err(payload) => Poll::Ready(Err(payload)),
        }
    }
}
