//! relmap: typed records mapped onto relational rows.
//!
//! This crate is the user-facing facade. It re-exports the mapping contracts
//! from `relmap-core`, the statement rewriting of `relmap-query`, the engine
//! of `relmap-session` and the `Model` derive.
//!
//! ```ignore
//! use relmap::prelude::*;
//!
//! #[derive(Model, Debug, Default)]
//! #[relmap(table = "author")]
//! struct Author {
//!     #[relmap(primary_key, auto_increment)]
//!     id: i64,
//!     name: String,
//!     #[relmap(has_many = "book")]
//!     books: Vec<Book>,
//! }
//!
//! let orm = OrmBuilder::new().register::<Author>()?.build(conn);
//!
//! let mut authors = Vec::new();
//! orm.select_many(&cx, &mut authors, "SELECT * FROM author WHERE id IN (??)",
//!     &[Value::list([1, 2, 3])]).await;
//! ```
//!
//! Every author's books arrive through a single `IN` query, and the
//! statement gets `LIMIT 2000` appended because it has no limit of its own.

pub use relmap_core::*;
pub use relmap_macros::Model;
pub use relmap_query::{
    DEFAULT_LIMIT, InsertBuilder, InsertManyBuilder, LIST_TOKEN, LimitMode, UpdateBuilder,
    UpsertBuilder, add_default_limit, bind_named_params, expand_in_list, placeholders,
};
pub use relmap_session::{
    DEFAULT_EXPLAIN_THRESHOLD, DescriptorCache, EngineConfig, ExplainRow, Orm, OrmBuilder,
    PoolOptions, RawRows, ShowColumns, SqlLog, SqlLogger, TableRegistry, TxFuture,
    VerboseSqlLogger, format_statement,
};

/// Everything a typical application needs.
pub mod prelude {
    pub use crate::{
        Connection, Cx, EngineConfig, Error, ExecResult, Executor, Model, ModelDescriptor,
        Orm, OrmBuilder, Outcome, ParamSource, Result, Row, Timestamp, TransactionOps,
        TxFuture, Value,
    };
}
