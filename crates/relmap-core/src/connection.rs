//! Backend contracts consumed by the mapping engine.
//!
//! relmap never speaks a wire protocol. A driver implements [`Executor`] for
//! plain statement dispatch and [`Connection`] for transaction support; the
//! engine assumes positional `?` placeholders.

use crate::error::{Error, Result};
use crate::row::Row;
use crate::value::Value;
use asupersync::{Cx, Outcome};
use std::future::Future;

/// Result of a non-query statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// Generated id of the first inserted row, when the backend reports one.
    pub last_insert_id: Option<i64>,
}

impl ExecResult {
    #[must_use]
    pub const fn new(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            last_insert_id: None,
        }
    }

    #[must_use]
    pub const fn with_last_insert_id(mut self, id: i64) -> Self {
        self.last_insert_id = Some(id);
        self
    }
}

/// Anything that can run a statement: a connection, a pool or an open
/// transaction.
pub trait Executor: Send + Sync {
    /// Run a statement that returns rows.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;

    /// Run a statement that does not return rows.
    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<ExecResult, Error>> + Send;
}

/// An open transaction.
///
/// Dropping a transaction without calling `commit` or `rollback` leaves the
/// outcome to the driver; the engine always ends transactions explicitly.
pub trait TransactionOps: Executor {
    fn commit(self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    fn rollback(self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;
}

/// A database handle that can open transactions.
pub trait Connection: Executor {
    type Tx<'conn>: TransactionOps
    where
        Self: 'conn;

    /// Begin an exclusive transaction.
    fn begin(&self, cx: &Cx) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send;

    /// Release the handle and whatever it pools.
    fn close(self, cx: &Cx) -> impl Future<Output = Result<()>> + Send;
}

/// Reports the column names a table currently has.
pub trait TableIntrospector: Send + Sync {
    fn describe(
        &self,
        cx: &Cx,
        table: &str,
    ) -> impl Future<Output = Outcome<Vec<String>, Error>> + Send;
}
