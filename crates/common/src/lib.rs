#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::{io, path::PathBuf, time::Duration};
use thiserror::Error;

/// Canonical error type shared across the engine's subsystems.
///
/// Outward-facing operations (the ones spec §6 lists: insert, select, ...)
/// collapse any of these into a plain `bool`/`Option`/falsy result at their
/// own boundary; `DbError` exists for the layers beneath that boundary
/// where distinguishing the failure matters (e.g. a transaction needs to
/// tell a lock conflict apart from a missing record).
#[derive(Error, Debug)]
pub enum DbError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("lock conflict: {0}")]
    LockConflict(String),
    #[error("transaction aborted: {0}")]
    TransactionAborted(String),
    #[error("storage: {0}")]
    Storage(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias that carries a `DbError`.
pub type DbResult<T> = Result<T, DbError>;

/// Runtime configuration for the storage engine.
///
/// # Example
/// ```
/// use common::Config;
/// use std::path::PathBuf;
///
/// let config = Config::builder()
///     .data_dir(PathBuf::from("./my_db"))
///     .buffer_pool_pages(2000)
///     .build();
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, bon::Builder)]
pub struct Config {
    /// Directory under which per-table metadata and page files live.
    #[builder(default = PathBuf::from("./db_data"))]
    pub data_dir: PathBuf,
    /// Number of pages the bufferpool keeps resident before it must evict.
    #[builder(default = 1000)]
    pub buffer_pool_pages: usize,
    /// Number of updates on a table between merge attempts.
    #[builder(default = 10)]
    pub merge_threshold: u64,
    /// Minimum wall-clock time between two merges of the same table.
    #[builder(default = Duration::from_secs(60))]
    pub merge_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./db_data"),
            buffer_pool_pages: 1000,
            merge_threshold: 10,
            merge_interval: Duration::from_secs(60),
        }
    }
}

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::{Config, DbError, DbResult};
}
