//! Mapping engine for relmap.
//!
//! `relmap-session` is the **runtime layer**: it owns the engine state and
//! runs every statement through one logged path.
//!
//! # Role In The Architecture
//!
//! - **Engine**: [`Orm`] wraps an [`Executor`](relmap_core::Executor) with
//!   a descriptor cache, a table registry, an [`EngineConfig`] and a
//!   [`SqlLogger`].
//! - **Statement path**: `??` expansion, default limits, timing, EXPLAIN of
//!   slow statements and one log record per successful call.
//! - **Relations**: declared associations are loaded with one `IN` query
//!   per association, never one query per record.
//! - **Transactions**: [`Orm::run_in_transaction`] commits on success and
//!   rolls back on error, cancellation or panic.

/// Unwrap `Outcome::Ok` or return the other variants from the enclosing
/// function.
macro_rules! try_outcome {
    ($e:expr) => {
        match $e {
            ::asupersync::Outcome::Ok(v) => v,
            ::asupersync::Outcome::Err(e) => return ::asupersync::Outcome::Err(e),
            ::asupersync::Outcome::Cancelled(r) => return ::asupersync::Outcome::Cancelled(r),
            ::asupersync::Outcome::Panicked(p) => return ::asupersync::Outcome::Panicked(p),
        }
    };
}

/// Unwrap a `Result` inside a function returning `Outcome`.
macro_rules! try_result {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => return ::asupersync::Outcome::Err(e),
        }
    };
}

mod cache;
mod config;
mod executor;
mod logger;
mod orm;
mod registry;
mod relation;
mod transaction;

pub use cache::DescriptorCache;
pub use config::{DEFAULT_EXPLAIN_THRESHOLD, EngineConfig, PoolOptions};
pub use logger::{ExplainRow, SqlLog, SqlLogger, VerboseSqlLogger, format_statement};
pub use orm::{EngineState, Orm, OrmBuilder, RawRows};
pub use registry::{ShowColumns, TableRegistry};
pub use transaction::TxFuture;
