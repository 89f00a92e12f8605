//! One-shot client construction
//!
//! A [`StoreConnector`] builds its [`StoreClient`] on the first `initialize`
//! call and hands the same instance to every later caller. Configuration
//! passed after the first successful call is ignored.

use super::backend::{ConnectionSource, KeyValueConnection};
use super::client::StoreClient;
use super::errors::StoreResult;
use super::redis_backend::RedisConnectionManager;
use crate::config::DatabaseConfig;
use once_cell::sync::OnceCell;
use r2d2::ManageConnection;
use std::sync::Arc;
use tracing::debug;

/// Connector for the Redis backend
pub type RedisStoreConnector = StoreConnector<RedisConnectionManager>;

/// Owns the single client built for one backend
pub struct StoreConnector<M: ManageConnection> {
    client: OnceCell<Arc<StoreClient<M>>>,
}

impl<M: ManageConnection> Default for StoreConnector<M> {
    fn default() -> Self {
        Self {
            client: OnceCell::new(),
        }
    }
}

impl<M> StoreConnector<M>
where
    M: ConnectionSource,
    M::Connection: KeyValueConnection,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the client on first use, then return the same instance.
    ///
    /// A failed first attempt leaves the connector uninitialized, so a later
    /// call may succeed with corrected configuration.
    pub fn initialize(&self, config: &DatabaseConfig) -> StoreResult<Arc<StoreClient<M>>> {
        let mut built = false;
        let client = self.client.get_or_try_init(|| {
            built = true;
            let manager = M::from_config(config)?;
            StoreClient::connect(manager, config).map(Arc::new)
        })?;

        if !built {
            debug!(address = %config.address(), "store client already initialized; configuration ignored");
        }
        Ok(Arc::clone(client))
    }

    /// The client, if `initialize` has succeeded
    pub fn client(&self) -> Option<Arc<StoreClient<M>>> {
        self.client.get().cloned()
    }
}
