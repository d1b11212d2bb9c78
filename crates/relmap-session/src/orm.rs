//! The mapping engine.

use crate::cache::DescriptorCache;
use crate::config::EngineConfig;
use crate::executor;
use crate::logger::{SqlLogger, VerboseSqlLogger};
use crate::registry::{ShowColumns, TableRegistry};
use crate::relation;
use asupersync::{Cx, Outcome};
use relmap_core::{
    ColumnPlan, Connection, Error, ExecResult, Executor, FromValue, Model, ModelDescriptor,
    ParamSource, Result, Row, RowAffectMismatchError, Value, scan_scalar,
};
use relmap_query::{
    InsertBuilder, InsertManyBuilder, LimitMode, UpdateBuilder, UpsertBuilder, add_default_limit,
    bind_named_params, select_by_pk_sql, truncate_sql,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Engine-owned state shared by an `Orm` and the transaction handles it
/// opens.
pub struct EngineState {
    pub(crate) config: EngineConfig,
    pub(crate) logger: Arc<dyn SqlLogger>,
    pub(crate) descriptors: DescriptorCache,
    pub(crate) tables: TableRegistry,
}

impl fmt::Debug for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineState")
            .field("config", &self.config)
            .field("descriptors", &self.descriptors.len())
            .field("tables", &self.tables.len())
            .finish_non_exhaustive()
    }
}

/// Column names plus rows of raw values.
pub type RawRows = (Vec<String>, Vec<Vec<Value>>);

/// Typed record mapping over an [`Executor`].
///
/// Cheap to share by reference; holds no per-call state. Built with
/// [`OrmBuilder`].
#[derive(Debug)]
pub struct Orm<E: Executor> {
    executor: E,
    state: Arc<EngineState>,
}

impl<E: Executor> Orm<E> {
    pub(crate) fn with_state(executor: E, state: Arc<EngineState>) -> Self {
        Self { executor, state }
    }

    pub(crate) fn state(&self) -> &Arc<EngineState> {
        &self.state
    }

    pub(crate) fn into_executor(self) -> E {
        self.executor
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn config(&self) -> &EngineConfig {
        &self.state.config
    }

    pub fn tables(&self) -> &TableRegistry {
        &self.state.tables
    }

    /// Descriptor of a registered table.
    pub fn table(&self, name: &str) -> Option<&Arc<ModelDescriptor>> {
        self.state.tables.get(name)
    }

    /// Cached descriptor of `M`, built on first use.
    pub fn descriptor<M: Model>(&self) -> Result<Arc<ModelDescriptor>> {
        self.state.descriptors.get::<M>()
    }

    // ========================================================================
    // Selects
    // ========================================================================

    /// Fill `record` from the first row of `sql`, then load its associations.
    ///
    /// `LIMIT 1` is appended when the statement has no limit. Zero rows is
    /// [`Error::NotFound`].
    pub async fn select_one<M: Model>(
        &self,
        cx: &Cx,
        record: &mut M,
        sql: &str,
        args: &[Value],
    ) -> Outcome<(), Error> {
        self.select_one_inner(cx, record, sql, args.to_vec()).await
    }

    /// [`select_one`](Self::select_one) with `#{name}` parameters.
    pub async fn select_one_with_params<M: Model>(
        &self,
        cx: &Cx,
        record: &mut M,
        sql: &str,
        params: &dyn ParamSource,
    ) -> Outcome<(), Error> {
        let (sql, args) = try_result!(bind_named_params(sql, params));
        self.select_one_inner(cx, record, &sql, args).await
    }

    async fn select_one_inner<M: Model>(
        &self,
        cx: &Cx,
        record: &mut M,
        sql: &str,
        args: Vec<Value>,
    ) -> Outcome<(), Error> {
        let descriptor = try_result!(self.descriptor::<M>());
        let sql = add_default_limit(sql, LimitMode::One, self.state.config.default_limit);
        let rows = try_outcome!(self.run_query(cx, &sql, args).await);
        let Some(row) = rows.first() else {
            return Outcome::Err(Error::NotFound { sql });
        };

        let plan = ColumnPlan::new(&descriptor, row.columns());
        try_result!(plan.apply(record, row));
        relation::resolve(
            &self.executor,
            &self.state,
            cx,
            &descriptor,
            std::slice::from_mut(record),
        )
        .await
    }

    /// Load one record by primary key.
    pub async fn select_by_pk<M: Model>(&self, cx: &Cx, pk: impl Into<Value>) -> Outcome<M, Error> {
        let descriptor = try_result!(self.descriptor::<M>());
        let sql = try_result!(select_by_pk_sql(&descriptor));
        let mut record = M::default();
        try_outcome!(self.select_one_inner(cx, &mut record, &sql, vec![pk.into()]).await);
        Outcome::Ok(record)
    }

    /// Append one record per row of `sql` to `out`, then load associations
    /// for the new records.
    ///
    /// The default limit is appended when the statement has none.
    pub async fn select_many<M: Model>(
        &self,
        cx: &Cx,
        out: &mut Vec<M>,
        sql: &str,
        args: &[Value],
    ) -> Outcome<(), Error> {
        self.select_many_inner(cx, out, sql, args.to_vec()).await
    }

    /// [`select_many`](Self::select_many) with `#{name}` parameters.
    pub async fn select_many_with_params<M: Model>(
        &self,
        cx: &Cx,
        out: &mut Vec<M>,
        sql: &str,
        params: &dyn ParamSource,
    ) -> Outcome<(), Error> {
        let (sql, args) = try_result!(bind_named_params(sql, params));
        self.select_many_inner(cx, out, &sql, args).await
    }

    async fn select_many_inner<M: Model>(
        &self,
        cx: &Cx,
        out: &mut Vec<M>,
        sql: &str,
        args: Vec<Value>,
    ) -> Outcome<(), Error> {
        let descriptor = try_result!(self.descriptor::<M>());
        let sql = add_default_limit(sql, LimitMode::Many, self.state.config.default_limit);
        let rows = try_outcome!(self.run_query(cx, &sql, args).await);
        let Some(plan) = ColumnPlan::for_rows(&descriptor, &rows) else {
            return Outcome::Ok(());
        };

        let start = out.len();
        out.reserve(rows.len());
        for row in &rows {
            out.push(try_result!(plan.materialize(row)));
        }
        relation::resolve(&self.executor, &self.state, cx, &descriptor, &mut out[start..]).await
    }

    /// The single column of every row, converted to `T`.
    pub async fn select_scalars<T: FromValue>(
        &self,
        cx: &Cx,
        sql: &str,
        args: &[Value],
    ) -> Outcome<Vec<T>, Error> {
        let sql = add_default_limit(sql, LimitMode::Many, self.state.config.default_limit);
        let rows = try_outcome!(self.run_query(cx, &sql, args.to_vec()).await);
        let values = try_result!(rows.iter().map(scan_scalar).collect::<Result<Vec<T>>>());
        Outcome::Ok(values)
    }

    async fn select_scalar<T: FromValue>(
        &self,
        cx: &Cx,
        sql: &str,
        args: &[Value],
    ) -> Outcome<T, Error> {
        let sql = add_default_limit(sql, LimitMode::One, self.state.config.default_limit);
        let rows = try_outcome!(self.run_query(cx, &sql, args.to_vec()).await);
        let Some(row) = rows.first() else {
            return Outcome::Err(Error::NotFound { sql });
        };
        Outcome::Ok(try_result!(scan_scalar(row)))
    }

    /// A single text value.
    pub async fn select_str(&self, cx: &Cx, sql: &str, args: &[Value]) -> Outcome<String, Error> {
        self.select_scalar(cx, sql, args).await
    }

    /// A single integer value.
    pub async fn select_int(&self, cx: &Cx, sql: &str, args: &[Value]) -> Outcome<i64, Error> {
        self.select_scalar(cx, sql, args).await
    }

    /// Column names and raw rows, no model involved.
    pub async fn select_raw(&self, cx: &Cx, sql: &str, args: &[Value]) -> Outcome<RawRows, Error> {
        self.select_raw_inner(cx, sql, args.to_vec()).await
    }

    /// [`select_raw`](Self::select_raw) with `#{name}` parameters.
    pub async fn select_raw_with_params(
        &self,
        cx: &Cx,
        sql: &str,
        params: &dyn ParamSource,
    ) -> Outcome<RawRows, Error> {
        let (sql, args) = try_result!(bind_named_params(sql, params));
        self.select_raw_inner(cx, &sql, args).await
    }

    async fn select_raw_inner(
        &self,
        cx: &Cx,
        sql: &str,
        args: Vec<Value>,
    ) -> Outcome<RawRows, Error> {
        let sql = add_default_limit(sql, LimitMode::Many, self.state.config.default_limit);
        let rows = try_outcome!(self.run_query(cx, &sql, args).await);
        let columns = rows
            .first()
            .map(|r| r.columns().to_vec())
            .unwrap_or_default();
        let values = rows.into_iter().map(Row::into_values).collect();
        Outcome::Ok((columns, values))
    }

    /// Rows as column-to-value maps.
    pub async fn select_raw_set(
        &self,
        cx: &Cx,
        sql: &str,
        args: &[Value],
    ) -> Outcome<Vec<HashMap<String, Value>>, Error> {
        let raw = try_outcome!(self.select_raw_inner(cx, sql, args.to_vec()).await);
        Outcome::Ok(into_maps(raw))
    }

    /// [`select_raw_set`](Self::select_raw_set) with `#{name}` parameters.
    pub async fn select_raw_set_with_params(
        &self,
        cx: &Cx,
        sql: &str,
        params: &dyn ParamSource,
    ) -> Outcome<Vec<HashMap<String, Value>>, Error> {
        let raw = try_outcome!(self.select_raw_with_params(cx, sql, params).await);
        Outcome::Ok(into_maps(raw))
    }

    /// Run a row-returning statement as-is: no default limit, no mapping.
    pub async fn query(&self, cx: &Cx, sql: &str, args: &[Value]) -> Outcome<Vec<Row>, Error> {
        self.run_query(cx, sql, args.to_vec()).await
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Insert `record` into its table and write a generated key back.
    pub async fn insert<M: Model>(&self, cx: &Cx, record: &mut M) -> Outcome<ExecResult, Error> {
        let descriptor = try_result!(self.descriptor::<M>());
        let (sql, args) = try_result!(InsertBuilder::new(&descriptor, record).build());
        let result = try_outcome!(self.run_execute(cx, &sql, args).await);
        try_result!(assign_generated_key(&descriptor, record, result.last_insert_id));
        Outcome::Ok(result)
    }

    /// Insert `record` into `table` instead of the model's own table.
    pub async fn insert_into<M: Model>(
        &self,
        cx: &Cx,
        table: &str,
        record: &mut M,
    ) -> Outcome<ExecResult, Error> {
        let descriptor = try_result!(self.descriptor::<M>());
        let (sql, args) = try_result!(
            InsertBuilder::new(&descriptor, record)
                .into_table(table)
                .build()
        );
        let result = try_outcome!(self.run_execute(cx, &sql, args).await);
        try_result!(assign_generated_key(&descriptor, record, result.last_insert_id));
        Outcome::Ok(result)
    }

    /// Insert, or overwrite `update_fields` when the key already exists.
    ///
    /// Names are field or column names; an empty list overwrites every
    /// persisted non-key column.
    pub async fn insert_or_update<M: Model>(
        &self,
        cx: &Cx,
        record: &mut M,
        update_fields: &[&str],
    ) -> Outcome<ExecResult, Error> {
        let descriptor = try_result!(self.descriptor::<M>());
        let (sql, args) = try_result!(
            UpsertBuilder::new(&descriptor, record)
                .update_fields(update_fields)
                .build()
        );
        let result = try_outcome!(self.run_execute(cx, &sql, args).await);
        try_result!(assign_generated_key(&descriptor, record, result.last_insert_id));
        Outcome::Ok(result)
    }

    /// Insert all `records` with one statement.
    ///
    /// Generated keys are written back as `first_id + position`. That
    /// assumes the backend hands out contiguous ids to one multi-row insert,
    /// which MySQL/InnoDB does under its default lock mode and other
    /// backends may not. An empty batch runs nothing.
    pub async fn insert_batch<M: Model>(
        &self,
        cx: &Cx,
        records: &mut [M],
    ) -> Outcome<ExecResult, Error> {
        let descriptor = try_result!(self.descriptor::<M>());
        let Some((sql, args)) = try_result!(InsertManyBuilder::new(&descriptor, records).build())
        else {
            return Outcome::Ok(ExecResult::default());
        };
        let result = try_outcome!(self.run_execute(cx, &sql, args).await);

        if let Some(first_id) = result.last_insert_id {
            for (offset, record) in records.iter_mut().enumerate() {
                let id = first_id + offset as i64;
                try_result!(assign_generated_key(&descriptor, record, Some(id)));
            }
        }
        Outcome::Ok(result)
    }

    /// Write every persisted non-key field of `record` to its row.
    pub async fn update_by_pk<M: Model>(&self, cx: &Cx, record: &M) -> Outcome<ExecResult, Error> {
        let descriptor = try_result!(self.descriptor::<M>());
        let (sql, args) = try_result!(UpdateBuilder::new(&descriptor, record).build());
        self.run_execute(cx, &sql, args).await
    }

    /// Write only `fields` (field or column names) of `record` to its row.
    pub async fn update_fields_by_pk<M: Model>(
        &self,
        cx: &Cx,
        record: &M,
        fields: &[&str],
    ) -> Outcome<ExecResult, Error> {
        let descriptor = try_result!(self.descriptor::<M>());
        let (sql, args) = try_result!(
            UpdateBuilder::new(&descriptor, record)
                .fields(fields)
                .build()
        );
        self.run_execute(cx, &sql, args).await
    }

    // ========================================================================
    // Plain statements
    // ========================================================================

    pub async fn exec(&self, cx: &Cx, sql: &str, args: &[Value]) -> Outcome<ExecResult, Error> {
        self.run_execute(cx, sql, args.to_vec()).await
    }

    pub async fn exec_with_params(
        &self,
        cx: &Cx,
        sql: &str,
        params: &dyn ParamSource,
    ) -> Outcome<ExecResult, Error> {
        let (sql, args) = try_result!(bind_named_params(sql, params));
        self.run_execute(cx, &sql, args).await
    }

    /// Exec that fails with [`Error::RowAffectMismatch`] unless exactly
    /// `expected` rows were affected.
    pub async fn exec_with_row_affect_check(
        &self,
        cx: &Cx,
        expected: u64,
        sql: &str,
        args: &[Value],
    ) -> Outcome<ExecResult, Error> {
        let result = try_outcome!(self.run_execute(cx, sql, args.to_vec()).await);
        if result.rows_affected != expected {
            return Outcome::Err(Error::RowAffectMismatch(RowAffectMismatchError {
                sql: sql.to_string(),
                expected,
                actual: result.rows_affected,
            }));
        }
        Outcome::Ok(result)
    }

    // ========================================================================
    // Tables
    // ========================================================================

    /// Check every registered table against its model with `SHOW COLUMNS`.
    pub async fn check_tables(&self, cx: &Cx) -> Outcome<(), Error> {
        self.state.tables.check(cx, &ShowColumns(&self.executor)).await
    }

    pub async fn truncate_table(&self, cx: &Cx, table: &str) -> Outcome<ExecResult, Error> {
        self.run_execute(cx, &truncate_sql(table), Vec::new()).await
    }

    /// Truncate every registered table, in registration order.
    pub async fn truncate_tables(&self, cx: &Cx) -> Outcome<(), Error> {
        for table in self.state.tables.table_names() {
            try_outcome!(self.truncate_table(cx, table).await);
        }
        Outcome::Ok(())
    }

    async fn run_query(&self, cx: &Cx, sql: &str, args: Vec<Value>) -> Outcome<Vec<Row>, Error> {
        executor::query(&self.executor, &self.state, cx, sql, args).await
    }

    async fn run_execute(
        &self,
        cx: &Cx,
        sql: &str,
        args: Vec<Value>,
    ) -> Outcome<ExecResult, Error> {
        executor::execute(&self.executor, &self.state, cx, sql, args).await
    }
}

impl<C: Connection> Orm<C> {
    /// Close the underlying connection.
    pub async fn close(self, cx: &Cx) -> Result<()> {
        tracing::info!("Closing connection");
        self.executor.close(cx).await
    }
}

fn assign_generated_key<M: Model>(
    descriptor: &ModelDescriptor,
    record: &mut M,
    last_insert_id: Option<i64>,
) -> Result<()> {
    let (Some(pk), Some(id)) = (descriptor.primary_key(), last_insert_id) else {
        return Ok(());
    };
    if !pk.is_generated_key() {
        return Ok(());
    }
    record.set_field_value(pk.field_name, &Value::BigInt(id))
}

fn into_maps((columns, rows): RawRows) -> Vec<HashMap<String, Value>> {
    rows.into_iter()
        .map(|values| columns.iter().cloned().zip(values).collect())
        .collect()
}

/// Builder for [`Orm`].
pub struct OrmBuilder {
    config: EngineConfig,
    logger: Option<Arc<dyn SqlLogger>>,
    descriptors: DescriptorCache,
    tables: TableRegistry,
}

impl Default for OrmBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OrmBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrmBuilder")
            .field("config", &self.config)
            .field("custom_logger", &self.logger.is_some())
            .field("tables", &self.tables)
            .finish_non_exhaustive()
    }
}

impl OrmBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            logger: None,
            descriptors: DescriptorCache::new(),
            tables: TableRegistry::new(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default [`VerboseSqlLogger`].
    pub fn logger(mut self, logger: Arc<dyn SqlLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Register `M`'s table. Fails on an invalid descriptor or a table
    /// already claimed by another model.
    pub fn register<M: Model>(mut self) -> Result<Self> {
        let descriptor = self.descriptors.get::<M>()?;
        self.tables.register(descriptor)?;
        Ok(self)
    }

    pub fn build<E: Executor>(self, executor: E) -> Orm<E> {
        let logger = self
            .logger
            .unwrap_or_else(|| Arc::new(VerboseSqlLogger::new(self.config.explain_threshold)));
        Orm::with_state(
            executor,
            Arc::new(EngineState {
                config: self.config,
                logger,
                descriptors: self.descriptors,
                tables: self.tables,
            }),
        )
    }
}
