//! Registered tables and the schema consistency check.

use asupersync::{Cx, Outcome};
use relmap_core::{Error, Executor, ModelDescriptor, Result, TableIntrospector};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Tables known to an engine, in registration order.
///
/// Filled while the engine is built and read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct TableRegistry {
    tables: Vec<Arc<ModelDescriptor>>,
    by_name: HashMap<String, usize>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor. Registering the same model twice is a no-op; two
    /// different models claiming one table is a configuration error.
    pub fn register(&mut self, descriptor: Arc<ModelDescriptor>) -> Result<()> {
        let table = descriptor.table_name().to_string();
        if let Some(&idx) = self.by_name.get(&table) {
            let existing = &self.tables[idx];
            if existing.type_name() == descriptor.type_name() {
                return Ok(());
            }
            return Err(Error::configuration(
                descriptor.type_name(),
                format!(
                    "table '{table}' is already registered by {}",
                    existing.type_name()
                ),
            ));
        }
        tracing::info!(
            model = descriptor.type_name(),
            table = %table,
            "Registered table"
        );
        self.by_name.insert(table, self.tables.len());
        self.tables.push(descriptor);
        Ok(())
    }

    pub fn get(&self, table: &str) -> Option<&Arc<ModelDescriptor>> {
        self.by_name.get(table).map(|&i| &self.tables[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ModelDescriptor>> {
        self.tables.iter()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|d| d.table_name())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Verify that every column of every registered table maps to a field.
    ///
    /// Stops at the first table whose schema has a column its model does not
    /// declare.
    pub async fn check<I: TableIntrospector>(
        &self,
        cx: &Cx,
        introspector: &I,
    ) -> Outcome<(), Error> {
        for descriptor in self.iter() {
            let table = descriptor.table_name();
            let columns = try_outcome!(introspector.describe(cx, table).await);
            if let Some(missing) = columns
                .iter()
                .find(|c| descriptor.field_for_column(c).is_none())
            {
                return Outcome::Err(Error::configuration(
                    descriptor.type_name(),
                    format!("{table} missing field {missing}"),
                ));
            }
            tracing::debug!(
                table = %table,
                columns = columns.len(),
                "Table matches model"
            );
        }
        Outcome::Ok(())
    }
}

/// Introspection through `SHOW COLUMNS FROM <table>`.
#[derive(Debug)]
pub struct ShowColumns<'a, E: Executor>(pub &'a E);

impl<E: Executor> TableIntrospector for ShowColumns<'_, E> {
    fn describe(
        &self,
        cx: &Cx,
        table: &str,
    ) -> impl Future<Output = Outcome<Vec<String>, Error>> + Send {
        let sql = format!("SHOW COLUMNS FROM {table}");
        async move {
            let rows = try_outcome!(self.0.query(cx, &sql, &[]).await);
            let columns = rows
                .iter()
                .filter_map(|row| {
                    row.get_by_name("Field")
                        .or_else(|| row.get(0))
                        .and_then(|v| v.as_str())
                        .map(str::to_string)
                })
                .collect();
            Outcome::Ok(columns)
        }
    }
}
