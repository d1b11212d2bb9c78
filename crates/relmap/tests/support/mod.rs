//! In-memory backend understanding the statements relmap renders.
#![allow(dead_code, clippy::manual_async_fn)]

use regex::Regex;
use relmap::prelude::*;
use relmap::{ExplainRow, SqlLog, SqlLogger};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

pub fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

pub fn expect_err<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> Error {
    match outcome {
        Outcome::Err(e) => e,
        other => panic!("expected an error, got {other:?}"),
    }
}

pub fn block_on<F: Future>(fut: F) -> F::Output {
    let rt = asupersync::runtime::RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    rt.block_on(fut)
}

#[derive(Debug, Clone, Default)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    auto_column: Option<usize>,
    next_id: i64,
}

impl Table {
    fn column(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::Custom(format!("unknown column '{name}'")))
    }
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, Table>,
    statements: Vec<String>,
    snapshot: Option<BTreeMap<String, Table>>,
    commits: usize,
    rollbacks: usize,
    text_values: bool,
    disconnected: bool,
}

/// Shared handle; clones see the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryDb {
    state: Arc<Mutex<State>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table. `auto` names the auto-increment column.
    pub fn with_table(self, name: &str, columns: &[&str], auto: Option<&str>) -> Self {
        {
            let mut state = self.lock();
            let columns: Vec<String> = columns.iter().map(|c| (*c).to_string()).collect();
            let auto_column = auto.and_then(|a| columns.iter().position(|c| c == a));
            state.tables.insert(
                name.to_string(),
                Table {
                    columns,
                    auto_column,
                    next_id: 1,
                    ..Table::default()
                },
            );
        }
        self
    }

    /// Report every selected value as text, the way text-protocol drivers do.
    pub fn reporting_text(self) -> Self {
        self.lock().text_values = true;
        self
    }

    /// Fail every later statement with a connection error.
    pub fn disconnect(&self) {
        self.lock().disconnected = true;
    }

    /// Statements run so far, EXPLAIN and transaction control included.
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    pub fn statements_matching(&self, prefix: &str) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|s| s.starts_with(prefix))
            .collect()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.lock().tables.get(table).map_or(0, |t| t.rows.len())
    }

    pub fn commits(&self) -> usize {
        self.lock().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.lock().rollbacks
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("memory db lock")
    }

    fn run_query(&self, sql: &str, params: &[Value]) -> Outcome<Vec<Row>, Error> {
        let mut state = self.lock();
        if state.disconnected {
            return Outcome::Err(Error::Connection("connection reset by peer".into()));
        }
        state.statements.push(sql.to_string());
        match query(&state, sql, params) {
            Ok(rows) => Outcome::Ok(rows),
            Err(e) => Outcome::Err(e),
        }
    }

    fn run_execute(&self, sql: &str, params: &[Value]) -> Outcome<ExecResult, Error> {
        let mut state = self.lock();
        if state.disconnected {
            return Outcome::Err(Error::Connection("connection reset by peer".into()));
        }
        state.statements.push(sql.to_string());
        match execute(&mut state, sql, params) {
            Ok(res) => Outcome::Ok(res),
            Err(e) => Outcome::Err(e),
        }
    }
}

fn pattern(cell: &'static OnceLock<Regex>, src: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(src).expect("test pattern compiles"))
}

fn select_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(
        &RE,
        r"(?is)^SELECT (.+?) FROM (\w+)(?: WHERE (\w+) (=|IN) (\?|\([^)]*\)))?(?: LIMIT (\d+))?$",
    )
}

fn insert_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(
        &RE,
        r"(?is)^INSERT INTO (\w+) \(([^)]*)\) VALUES (.+?)(?: ON DUPLICATE KEY UPDATE (.+))?$",
    )
}

fn update_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"(?is)^UPDATE (\w+) SET (.+) WHERE (\w+) = \?$")
}

fn delete_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"(?is)^DELETE FROM (\w+) WHERE (\w+) = \?$")
}

fn as_text(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        other => Value::Text(
            other
                .as_str()
                .map_or_else(|| other.to_string(), str::to_string),
        ),
    }
}

fn same_key(a: &Value, b: &Value) -> bool {
    match (a.as_key(), b.as_key()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn table<'a>(state: &'a State, name: &str) -> Result<&'a Table> {
    state
        .tables
        .get(name)
        .ok_or_else(|| Error::Custom(format!("no such table '{name}'")))
}

fn table_mut<'a>(state: &'a mut State, name: &str) -> Result<&'a mut Table> {
    state
        .tables
        .get_mut(name)
        .ok_or_else(|| Error::Custom(format!("no such table '{name}'")))
}

fn query(state: &State, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
    let sql = sql.trim();
    if let Some(explained) = sql.strip_prefix("EXPLAIN ") {
        let name = select_re()
            .captures(explained)
            .map_or("", |c| c.get(2).map_or("", |m| m.as_str()));
        return Ok(vec![Row::from_pairs([
            ("table", Value::Text(name.to_string())),
            ("type", Value::Text("ALL".into())),
            ("rows", Value::BigInt(1)),
            ("Extra", Value::Text("Using where".into())),
        ])]);
    }
    if let Some(name) = sql.strip_prefix("SHOW COLUMNS FROM ") {
        let t = table(state, name.trim())?;
        return Ok(t
            .columns
            .iter()
            .map(|c| {
                Row::from_pairs([
                    ("Field", Value::Text(c.clone())),
                    ("Type", Value::Text("varchar(255)".into())),
                ])
            })
            .collect());
    }

    let caps = select_re()
        .captures(sql)
        .ok_or_else(|| Error::query(sql, "unsupported statement"))?;
    let t = table(state, &caps[2])?;

    let mut rows: Vec<&Vec<Value>> = match (caps.get(3), caps.get(4)) {
        (Some(col), Some(op)) => {
            let idx = t.column(col.as_str())?;
            let wanted: Vec<&Value> = if op.as_str() == "=" {
                params.iter().take(1).collect()
            } else {
                params.iter().collect()
            };
            t.rows
                .iter()
                .filter(|r| wanted.iter().any(|w| same_key(&r[idx], w)))
                .collect()
        }
        _ => t.rows.iter().collect(),
    };
    let projection = caps[1].trim();
    if projection.eq_ignore_ascii_case("COUNT(*)") {
        return Ok(vec![Row::from_pairs([(
            "COUNT(*)",
            Value::BigInt(rows.len() as i64),
        )])]);
    }
    if let Some(limit) = caps.get(6) {
        let limit: usize = limit.as_str().parse().unwrap_or(usize::MAX);
        rows.truncate(limit);
    }
    let indices: Vec<usize> = if projection == "*" {
        (0..t.columns.len()).collect()
    } else {
        projection
            .split(',')
            .map(|c| t.column(c.trim()))
            .collect::<Result<_>>()?
    };
    let columns: Arc<[String]> = indices.iter().map(|&i| t.columns[i].clone()).collect();
    let render = |v: &Value| {
        if state.text_values {
            as_text(v)
        } else {
            v.clone()
        }
    };
    Ok(rows
        .into_iter()
        .map(|r| {
            let values = indices.iter().map(|&i| render(&r[i])).collect();
            Row::new(Arc::clone(&columns), values)
        })
        .collect())
}

fn execute(state: &mut State, sql: &str, params: &[Value]) -> Result<ExecResult> {
    let sql = sql.trim();
    if let Some(name) = sql.strip_prefix("TRUNCATE TABLE ") {
        let t = table_mut(state, name.trim())?;
        let n = t.rows.len() as u64;
        t.rows.clear();
        t.next_id = 1;
        return Ok(ExecResult::new(n));
    }
    if let Some(caps) = insert_re().captures(sql) {
        return insert(state, &caps, params);
    }
    if let Some(caps) = update_re().captures(sql) {
        let t = table_mut(state, &caps[1])?;
        let assigned: Vec<usize> = caps[2]
            .split(',')
            .map(|a| t.column(a.split('=').next().unwrap_or("").trim()))
            .collect::<Result<_>>()?;
        let key_idx = t.column(&caps[3])?;
        let key = params
            .last()
            .ok_or_else(|| Error::query(sql, "missing key argument"))?;
        let mut affected = 0;
        for row in t.rows.iter_mut().filter(|r| same_key(&r[key_idx], key)) {
            for (slot, value) in assigned.iter().zip(params) {
                row[*slot] = value.clone();
            }
            affected += 1;
        }
        return Ok(ExecResult::new(affected));
    }
    if let Some(caps) = delete_re().captures(sql) {
        let t = table_mut(state, &caps[1])?;
        let idx = t.column(&caps[2])?;
        let before = t.rows.len();
        let key = params.first().cloned().unwrap_or(Value::Null);
        t.rows.retain(|r| !same_key(&r[idx], &key));
        return Ok(ExecResult::new((before - t.rows.len()) as u64));
    }
    Err(Error::query(sql, "unsupported statement"))
}

fn insert(state: &mut State, caps: &regex::Captures<'_>, params: &[Value]) -> Result<ExecResult> {
    let t = table_mut(state, &caps[1])?;
    let columns: Vec<usize> = caps[2]
        .split(',')
        .map(|c| t.column(c.trim()))
        .collect::<Result<_>>()?;
    let updates: Option<Vec<usize>> = caps
        .get(4)
        .map(|u| {
            u.as_str()
                .split(',')
                .map(|a| t.column(a.split('=').next().unwrap_or("").trim()))
                .collect::<Result<_>>()
        })
        .transpose()?;

    let mut affected = 0;
    let mut first_id = None;
    for group in params.chunks(columns.len()) {
        let mut row = vec![Value::Null; t.columns.len()];
        for (slot, value) in columns.iter().zip(group) {
            row[*slot] = value.clone();
        }

        if let (Some(updates), Some(auto)) = (&updates, t.auto_column) {
            if let Some(existing) = t.rows.iter_mut().find(|r| same_key(&r[auto], &row[auto])) {
                for slot in updates {
                    existing[*slot] = row[*slot].clone();
                }
                affected += 2;
                continue;
            }
        }

        if let Some(auto) = t.auto_column {
            match row[auto].as_i64() {
                Some(id) if id > 0 => t.next_id = t.next_id.max(id + 1),
                _ => {
                    row[auto] = Value::BigInt(t.next_id);
                    first_id.get_or_insert(t.next_id);
                    t.next_id += 1;
                }
            }
        }
        t.rows.push(row);
        affected += 1;
    }

    let mut result = ExecResult::new(affected);
    if let Some(id) = first_id {
        result = result.with_last_insert_id(id);
    }
    Ok(result)
}

impl Executor for MemoryDb {
    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let out = self.run_query(sql, params);
        async move { out }
    }

    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<ExecResult, Error>> + Send {
        let out = self.run_execute(sql, params);
        async move { out }
    }
}

/// Transaction over a [`MemoryDb`]; BEGIN snapshots every table.
#[derive(Debug)]
pub struct MemoryTx<'a> {
    db: &'a MemoryDb,
}

impl Executor for MemoryTx<'_> {
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        self.db.query(cx, sql, params)
    }

    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<ExecResult, Error>> + Send {
        self.db.execute(cx, sql, params)
    }
}

impl TransactionOps for MemoryTx<'_> {
    fn commit(self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        {
            let mut state = self.db.lock();
            state.statements.push("COMMIT".into());
            state.snapshot = None;
            state.commits += 1;
        }
        async { Outcome::Ok(()) }
    }

    fn rollback(self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        {
            let mut state = self.db.lock();
            state.statements.push("ROLLBACK".into());
            if let Some(tables) = state.snapshot.take() {
                state.tables = tables;
            }
            state.rollbacks += 1;
        }
        async { Outcome::Ok(()) }
    }
}

impl Connection for MemoryDb {
    type Tx<'conn>
        = MemoryTx<'conn>
    where
        Self: 'conn;

    fn begin(&self, _cx: &Cx) -> impl Future<Output = Outcome<Self::Tx<'_>, Error>> + Send {
        {
            let mut state = self.lock();
            state.statements.push("BEGIN".into());
            state.snapshot = Some(state.tables.clone());
        }
        async move { Outcome::Ok(MemoryTx { db: self }) }
    }

    fn close(self, _cx: &Cx) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }
}

/// Logger keeping every record; explains everything when `explain_all`.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    pub explain_all: bool,
    records: Mutex<Vec<SqlLog>>,
}

impl RecordingLogger {
    pub fn explaining() -> Self {
        Self {
            explain_all: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<SqlLog> {
        self.records.lock().expect("logger lock").clone()
    }

    pub fn explains(&self) -> Vec<ExplainRow> {
        self.records()
            .into_iter()
            .flat_map(|r| r.explain)
            .collect()
    }
}

impl SqlLogger for RecordingLogger {
    fn log(&self, _cx: &Cx, entry: &SqlLog) {
        self.records.lock().expect("logger lock").push(entry.clone());
    }

    fn should_explain(&self, _duration: Duration) -> bool {
        self.explain_all
    }
}
