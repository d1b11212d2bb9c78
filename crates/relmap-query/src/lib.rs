//! Statement rewriting and mutation builders for relmap.
//!
//! Everything here is pure string and value work; nothing touches a
//! connection. The session crate runs the results.
//!
//! - [`rewrite`]: `IN (??)` list expansion.
//! - [`limit`]: default `LIMIT` injection for selects.
//! - [`named`]: `#{name}` parameters resolved against a map or a record.
//! - [`builder`]: INSERT, upsert, batch INSERT and UPDATE from descriptors.

pub mod builder;
pub mod limit;
pub mod named;
pub mod rewrite;

pub use builder::{
    InsertBuilder, InsertManyBuilder, UpdateBuilder, UpsertBuilder, select_by_pk_sql,
    select_in_sql, truncate_sql,
};
pub use limit::{DEFAULT_LIMIT, LimitMode, add_default_limit};
pub use named::bind_named_params;
pub use rewrite::{LIST_TOKEN, expand_in_list, placeholders};
