//! Backend seam
//!
//! The store client only needs a handful of key-value commands plus atomic
//! batches. Every backend connection implements [`KeyValueConnection`] and every
//! backend pool manager implements [`ConnectionSource`].

use super::batch::{BatchReport, CommandBatch};
use super::errors::StoreResult;
use crate::config::DatabaseConfig;

/// Commands the store client issues on a pooled connection
pub trait KeyValueConnection {
    /// Whether a primary record exists under `key`
    fn exists(&mut self, key: &str) -> StoreResult<bool>;

    /// Read a primary record
    fn get(&mut self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Read many primary records; one entry per key, in key order
    fn get_many(&mut self, keys: &[String]) -> StoreResult<Vec<Option<Vec<u8>>>>;

    /// All members of a set, unordered
    fn members(&mut self, set: &str) -> StoreResult<Vec<String>>;

    /// Abort the next `execute` if `key` is modified before it runs
    fn watch(&mut self, key: &str) -> StoreResult<()>;

    /// Drop every watch held by this connection
    fn unwatch(&mut self) -> StoreResult<()>;

    /// Run the batch atomically.
    ///
    /// Returns `None` when a watched key changed and nothing was applied.
    /// Executing clears all watches either way.
    fn execute(&mut self, batch: &CommandBatch) -> StoreResult<Option<BatchReport>>;
}

/// Pool manager that can be built from database configuration
pub trait ConnectionSource: r2d2::ManageConnection + Sized {
    fn from_config(config: &DatabaseConfig) -> StoreResult<Self>;
}
