//! The `Model` trait and type-erased association plumbing.

use crate::descriptor::ModelDescriptor;
use crate::error::{Error, Result};
use crate::row::Row;
use crate::scan::ColumnPlan;
use crate::value::Value;
use std::any::{Any, TypeId};
use std::fmt;

/// A record type mapped to a table.
///
/// Usually implemented by `#[derive(Model)]`. Field access goes by Rust
/// field name so the engine can fill and read records without knowing their
/// concrete types.
pub trait Model: Default + Send + Sync + 'static {
    /// Table this type maps to.
    const TABLE_NAME: &'static str;

    /// Build this type's descriptor. Called once per engine and cached.
    fn describe() -> Result<ModelDescriptor>;

    /// Current value of a mapped field, `None` for unknown or association
    /// fields.
    fn field_value(&self, field: &str) -> Option<Value>;

    /// Overwrite a mapped field from a result value.
    fn set_field_value(&mut self, field: &str, value: &Value) -> Result<()>;

    /// Store one resolved association record. Single-record fields are
    /// replaced, collection fields are appended to.
    fn attach_related(&mut self, field: &str, related: Related) -> Result<()> {
        let _ = related;
        Err(Error::configuration(
            std::any::type_name::<Self>(),
            format!("'{field}' does not accept associated records"),
        ))
    }
}

/// A materialized association record whose concrete type is known only to
/// the owning model.
pub struct Related {
    type_name: &'static str,
    record: Box<dyn Any + Send>,
}

impl Related {
    pub fn new<T: Model>(record: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            record: Box::new(record),
        }
    }

    /// Recover the record; fails when the association was declared with a
    /// different target type than the field holds.
    pub fn downcast<T: Model>(self) -> Result<Box<T>> {
        let type_name = self.type_name;
        self.record.downcast::<T>().map_err(|_| {
            Error::configuration(
                std::any::type_name::<T>(),
                format!("associated record has type {type_name}"),
            )
        })
    }
}

impl fmt::Debug for Related {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Related")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Function table for an association's target type.
#[derive(Clone, Copy)]
pub struct TargetModel {
    type_id: fn() -> TypeId,
    type_name: fn() -> &'static str,
    table_name: fn() -> &'static str,
    describe: fn() -> Result<ModelDescriptor>,
    materialize: fn(&ColumnPlan, &Row, &str) -> Result<(Option<Value>, Related)>,
}

impl TargetModel {
    pub fn of<T: Model>() -> Self {
        Self {
            type_id: TypeId::of::<T>,
            type_name: std::any::type_name::<T>,
            table_name: || T::TABLE_NAME,
            describe: T::describe,
            materialize: crate::scan::materialize_related::<T>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    pub fn type_name(&self) -> &'static str {
        (self.type_name)()
    }

    pub fn table_name(&self) -> &'static str {
        (self.table_name)()
    }

    pub fn describe(&self) -> Result<ModelDescriptor> {
        (self.describe)()
    }

    /// Build one target record from a row, along with the converted value
    /// of its `key_field`.
    pub fn materialize(
        &self,
        plan: &ColumnPlan,
        row: &Row,
        key_field: &str,
    ) -> Result<(Option<Value>, Related)> {
        (self.materialize)(plan, row, key_field)
    }
}

impl fmt::Debug for TargetModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetModel")
            .field("type_name", &self.type_name())
            .field("table_name", &self.table_name())
            .finish()
    }
}
