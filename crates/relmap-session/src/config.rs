//! Engine configuration.

use relmap_query::DEFAULT_LIMIT;
use std::time::Duration;

/// Statements slower than this get an EXPLAIN attached to their log record.
pub const DEFAULT_EXPLAIN_THRESHOLD: Duration = Duration::from_millis(200);

/// Connection pool settings.
///
/// relmap does not pool connections itself; these are handed to whatever
/// backend builds the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    /// Maximum open connections.
    pub max_open: u32,
    /// Maximum idle connections kept around.
    pub max_idle: u32,
    /// Maximum lifetime of one connection.
    pub max_lifetime: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_open: 100,
            max_idle: 5,
            max_lifetime: Duration::from_secs(10 * 60),
        }
    }
}

impl PoolOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_open(mut self, n: u32) -> Self {
        self.max_open = n;
        self
    }

    pub fn max_idle(mut self, n: u32) -> Self {
        self.max_idle = n;
        self
    }

    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = lifetime;
        self
    }
}

/// Configuration for an [`Orm`](crate::Orm).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Cap appended to multi-row selects that carry no LIMIT.
    pub default_limit: u64,
    /// Duration at which the default logger asks for EXPLAIN output.
    pub explain_threshold: Duration,
    /// Passed through to the backend.
    pub pool: PoolOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            explain_threshold: DEFAULT_EXPLAIN_THRESHOLD,
            pool: PoolOptions::default(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_limit(mut self, limit: u64) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn explain_threshold(mut self, threshold: Duration) -> Self {
        self.explain_threshold = threshold;
        self
    }

    pub fn pool(mut self, pool: PoolOptions) -> Self {
        self.pool = pool;
        self
    }
}
