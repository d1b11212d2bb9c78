//! Statement logging.
//!
//! Every successful statement produces one [`SqlLog`] handed to the engine's
//! [`SqlLogger`]. The logger decides, from the measured duration, whether the
//! executor should also run `EXPLAIN` and attach the plan.

use asupersync::Cx;
use relmap_core::{Row, Value};
use serde::Serialize;
use std::time::Duration;

/// One row of MySQL-style `EXPLAIN` output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExplainRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub access_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_len: Option<String>,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
}

impl ExplainRow {
    /// Pick the known EXPLAIN columns out of a result row.
    pub fn from_row(row: &Row) -> Self {
        let text = |name: &str| {
            row.get_by_name(name)
                .filter(|v| !v.is_null())
                .map(|v| match v.as_str() {
                    Some(s) => s.to_string(),
                    None => v.to_string(),
                })
        };
        Self {
            table: text("table"),
            access_type: text("type"),
            key: text("key"),
            key_len: text("key_len"),
            reference: text("ref"),
            rows: row.get_by_name("rows").and_then(Value::as_i64),
            extra: text("Extra"),
        }
    }
}

/// Record of one executed statement.
#[derive(Debug, Clone, Serialize)]
pub struct SqlLog {
    /// Statement text after rewriting.
    pub sql: String,
    /// Arguments as bound.
    pub args: Vec<Value>,
    pub duration: Duration,
    /// Plan rows, present only for statements the logger asked to explain.
    pub explain: Vec<ExplainRow>,
}

impl SqlLog {
    /// Whitespace-collapsed statement with its arguments appended.
    pub fn statement(&self) -> String {
        format_statement(&self.sql, &self.args)
    }
}

/// Pluggable sink for statement logs.
pub trait SqlLogger: Send + Sync {
    fn log(&self, cx: &Cx, entry: &SqlLog);

    /// Whether a statement that took `duration` should be explained.
    fn should_explain(&self, duration: Duration) -> bool {
        let _ = duration;
        false
    }
}

/// Default logger: one `info` event per statement through `tracing`, with
/// EXPLAIN output for slow statements.
#[derive(Debug, Clone)]
pub struct VerboseSqlLogger {
    explain_threshold: Duration,
}

impl VerboseSqlLogger {
    pub fn new(explain_threshold: Duration) -> Self {
        Self { explain_threshold }
    }
}

impl Default for VerboseSqlLogger {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_EXPLAIN_THRESHOLD)
    }
}

impl SqlLogger for VerboseSqlLogger {
    fn log(&self, _cx: &Cx, entry: &SqlLog) {
        let duration_ms = entry.duration.as_secs_f64() * 1000.0;
        if entry.explain.is_empty() {
            tracing::info!(sql = %entry.statement(), duration_ms, "SQL executed");
        } else {
            let explain = serde_json::to_string(&entry.explain).unwrap_or_default();
            tracing::info!(
                sql = %entry.statement(),
                duration_ms,
                explain = %explain,
                "Slow SQL executed"
            );
        }
    }

    fn should_explain(&self, duration: Duration) -> bool {
        duration >= self.explain_threshold
    }
}

/// Collapse runs of whitespace and append the rendered arguments.
pub fn format_statement(sql: &str, args: &[Value]) -> String {
    let mut out = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    if !args.is_empty() {
        out.push_str(" [");
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&arg.to_string());
        }
        out.push(']');
    }
    out
}
