//! Core types and traits for relmap.
//!
//! `relmap-core` is the **foundation layer** of the workspace. It defines the
//! contracts every other crate builds on.
//!
//! # Role In The Architecture
//!
//! - **Contract layer**: `Model` is implemented by records (usually through
//!   `#[derive(Model)]`), `Executor`/`Connection` by database drivers.
//! - **Mapping metadata**: `ModelDescriptor` is the validated, per-type
//!   description of table, columns, primary key and associations.
//! - **Data model**: `Row`, `Value` and `Timestamp` carry statement inputs and
//!   outputs.
//! - **Materialization**: `ColumnPlan` fills records from rows.
//! - **Structured concurrency**: re-exports `Cx` and `Outcome` from asupersync
//!   so every database call is cancel-correct.
//!
//! # Who Uses This Crate
//!
//! - `relmap-macros` generates `Model` and `ParamSource` implementations.
//! - `relmap-query` renders statements from descriptors and values.
//! - `relmap-session` runs everything against an `Executor`.
//!
//! Most applications should use the `relmap` facade.

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod connection;
pub mod descriptor;
pub mod error;
pub mod model;
pub mod naming;
pub mod params;
pub mod row;
pub mod scan;
pub mod timestamp;
pub mod value;

pub use connection::{Connection, ExecResult, Executor, TableIntrospector, TransactionOps};
pub use descriptor::{
    AssociationDescriptor, AssociationKind, FieldDef, FieldMapping, FieldShape, ModelDescriptor,
    ModelDescriptorBuilder,
};
pub use error::{
    ConfigurationError, Error, QueryError, Result, RowAffectMismatchError, ScanError,
};
pub use model::{Model, Related, TargetModel};
pub use naming::{column_to_field, field_to_column};
pub use params::{ParamSource, model_param};
pub use row::Row;
pub use scan::{ColumnPlan, materialize_all, scan_scalar};
pub use timestamp::Timestamp;
pub use value::{FromValue, RowKey, ToValue, Value};
