//! Logged statement dispatch.
//!
//! Every statement the engine runs passes through here: `??` lists are
//! expanded, the call is timed, slow statements are explained, and one
//! [`SqlLog`] goes to the engine's logger on success. Failures are returned
//! untouched and produce no success record.

use crate::logger::{ExplainRow, SqlLog};
use crate::orm::EngineState;
use asupersync::{Cx, Outcome};
use relmap_core::{Error, ExecResult, Executor, Row, Value};
use relmap_query::expand_in_list;
use std::time::{Duration, Instant};

pub(crate) async fn query<E: Executor>(
    executor: &E,
    state: &EngineState,
    cx: &Cx,
    sql: &str,
    args: Vec<Value>,
) -> Outcome<Vec<Row>, Error> {
    if let Some(reason) = cx.cancel_reason() {
        return Outcome::Cancelled(reason);
    }
    let (sql, args) = try_result!(expand_in_list(sql, args));

    let start = Instant::now();
    let rows = try_outcome!(executor.query(cx, &sql, &args).await);
    let duration = start.elapsed();

    record(executor, state, cx, sql, args, duration).await;
    Outcome::Ok(rows)
}

pub(crate) async fn execute<E: Executor>(
    executor: &E,
    state: &EngineState,
    cx: &Cx,
    sql: &str,
    args: Vec<Value>,
) -> Outcome<ExecResult, Error> {
    if let Some(reason) = cx.cancel_reason() {
        return Outcome::Cancelled(reason);
    }
    let (sql, args) = try_result!(expand_in_list(sql, args));

    let start = Instant::now();
    let result = try_outcome!(executor.execute(cx, &sql, &args).await);
    let duration = start.elapsed();

    record(executor, state, cx, sql, args, duration).await;
    Outcome::Ok(result)
}

async fn record<E: Executor>(
    executor: &E,
    state: &EngineState,
    cx: &Cx,
    sql: String,
    args: Vec<Value>,
    duration: Duration,
) {
    let explain = if state.logger.should_explain(duration) {
        explain(executor, cx, &sql, &args).await
    } else {
        Vec::new()
    };
    state.logger.log(
        cx,
        &SqlLog {
            sql,
            args,
            duration,
            explain,
        },
    );
}

async fn explain<E: Executor>(
    executor: &E,
    cx: &Cx,
    sql: &str,
    args: &[Value],
) -> Vec<ExplainRow> {
    let statement = format!("EXPLAIN {sql}");
    match executor.query(cx, &statement, args).await {
        Outcome::Ok(rows) => rows.iter().map(ExplainRow::from_row).collect(),
        Outcome::Err(e) => {
            tracing::warn!(error = %e, sql = %sql, "EXPLAIN failed; logging without plan");
            Vec::new()
        }
        Outcome::Cancelled(_) | Outcome::Panicked(_) => Vec::new(),
    }
}
