//! Row materialization: filling records from result rows.

use crate::descriptor::ModelDescriptor;
use crate::error::{Error, Result};
use crate::model::{Model, Related};
use crate::row::Row;
use crate::value::{FromValue, Value};

/// Column-to-field bindings for one result set.
///
/// Built once per result set so that the per-row work is a straight walk
/// over the values. Columns no field claims are reported once, here, and
/// skipped afterwards.
#[derive(Debug, Clone)]
pub struct ColumnPlan {
    type_name: &'static str,
    bindings: Vec<Option<&'static str>>,
}

impl ColumnPlan {
    pub fn new(descriptor: &ModelDescriptor, columns: &[String]) -> Self {
        let bindings = columns
            .iter()
            .map(|column| {
                let field = descriptor.field_for_column(column).map(|f| f.field_name);
                if field.is_none() {
                    tracing::warn!(
                        model = descriptor.type_name(),
                        column = %column,
                        "Discarding result column with no mapped field"
                    );
                }
                field
            })
            .collect();
        Self {
            type_name: descriptor.type_name(),
            bindings,
        }
    }

    /// Plan for the result set `rows` belongs to; `None` when it is empty.
    pub fn for_rows(descriptor: &ModelDescriptor, rows: &[Row]) -> Option<Self> {
        rows.first().map(|row| Self::new(descriptor, row.columns()))
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Number of columns bound to a field.
    pub fn mapped_columns(&self) -> usize {
        self.bindings.iter().filter(|b| b.is_some()).count()
    }

    /// Copy every mapped column of `row` into `record`.
    ///
    /// Fields without a column keep their current value.
    pub fn apply<M: Model>(&self, record: &mut M, row: &Row) -> Result<()> {
        for ((field, value), column) in self
            .bindings
            .iter()
            .zip(row.values())
            .zip(row.columns())
        {
            if let Some(field) = field {
                record
                    .set_field_value(field, value)
                    .map_err(|e| e.in_column(column))?;
            }
        }
        Ok(())
    }

    /// Materialize a fresh record from `row`.
    pub fn materialize<M: Model>(&self, row: &Row) -> Result<M> {
        let mut record = M::default();
        self.apply(&mut record, row)?;
        Ok(record)
    }
}

/// Bind the sole column of a row directly to `T`.
pub fn scan_scalar<T: FromValue>(row: &Row) -> Result<T> {
    if row.len() != 1 {
        return Err(Error::scan(format!(
            "scalar select must return exactly one column, got {}",
            row.len()
        )));
    }
    let column = &row.columns()[0];
    T::from_value(&row.values()[0]).map_err(|e| e.in_column(column))
}

/// Materialize every row of a result set.
pub fn materialize_all<M: Model>(descriptor: &ModelDescriptor, rows: &[Row]) -> Result<Vec<M>> {
    let Some(plan) = ColumnPlan::for_rows(descriptor, rows) else {
        return Ok(Vec::new());
    };
    rows.iter().map(|row| plan.materialize(row)).collect()
}

pub(crate) fn materialize_related<T: Model>(
    plan: &ColumnPlan,
    row: &Row,
    key_field: &str,
) -> Result<(Option<Value>, Related)> {
    let record = plan.materialize::<T>(row)?;
    Ok((record.field_value(key_field), Related::new(record)))
}
