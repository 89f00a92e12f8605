//! Store client
//!
//! CRUD over stored objects. Every operation borrows one pooled connection
//! for its whole duration and returns it on every exit path. Primary writes
//! and owner index changes always travel in the same atomic batch.
//!
//! Read-then-write operations (store, update, remove, reconcile) watch the
//! keys they read and retry when another client changes them before the
//! batch runs, so concurrent writers cannot leave the index out of step
//! with the primary records.

use super::backend::KeyValueConnection;
use super::batch::{BatchReport, CommandBatch};
use super::codec::{EncodedObject, JsonCodec, ObjectCodec};
use super::contract::StoredObject;
use super::errors::{StoreError, StoreResult};
use super::index::OwnerIndex;
use crate::config::DatabaseConfig;
use crate::metrics::{self, Timer};
use r2d2::{ManageConnection, Pool, PooledConnection};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Attempts made before a watched operation gives up with `Conflict`
pub const MAX_WATCH_ATTEMPTS: usize = 8;

fn handle_poison<T>(_err: PoisonError<T>) -> StoreError {
    StoreError::Transport("Lock poisoned: a thread panicked while holding the pool".to_string())
}

/// Build a lazily-dialing pool from database configuration
pub fn build_pool<M: ManageConnection>(manager: M, config: &DatabaseConfig) -> StoreResult<Pool<M>> {
    config
        .validate()
        .map_err(|e| StoreError::InvalidArgument(e.to_string()))?;

    let idle_timeout = (!config.idle_timeout.is_zero()).then_some(config.idle_timeout);

    Ok(Pool::builder()
        .max_size(config.max_idle)
        .min_idle(Some(0))
        .idle_timeout(idle_timeout)
        .connection_timeout(config.connect_timeout)
        .build_unchecked(manager))
}

fn release_watches<C: KeyValueConnection>(conn: &mut C, operation: &'static str) {
    if let Err(err) = conn.unwatch() {
        debug!(operation, error = %err, "unwatch failed; connection may still hold watches");
    }
}

/// Run `attempt` until its batch executes without a watched key changing.
///
/// `attempt` watches whatever it reads, then returns the batch to execute.
/// Watches are released whenever an attempt fails or the retries run out.
fn run_watched<C, F>(conn: &mut C, operation: &'static str, mut attempt: F) -> StoreResult<BatchReport>
where
    C: KeyValueConnection,
    F: FnMut(&mut C) -> StoreResult<CommandBatch>,
{
    for round in 1..=MAX_WATCH_ATTEMPTS {
        let batch = match attempt(conn) {
            Ok(batch) => batch,
            Err(err) => {
                release_watches(conn, operation);
                return Err(err);
            }
        };

        if batch.is_empty() {
            conn.unwatch()?;
            return BatchReport::new(&batch, Vec::new());
        }

        match conn.execute(&batch) {
            Ok(Some(report)) => return Ok(report),
            Ok(None) => {
                debug!(operation, round, "watched key changed, retrying");
                metrics::record_counter(metrics::WATCH_RETRIES, 1);
            }
            Err(err) => {
                release_watches(conn, operation);
                return Err(err);
            }
        }
    }

    release_watches(conn, operation);
    Err(StoreError::Conflict(format!(
        "{} gave up after {} conflicting attempts",
        operation, MAX_WATCH_ATTEMPTS
    )))
}

/// Client for the durable object store
pub struct StoreClient<M: ManageConnection> {
    pool: RwLock<Option<Pool<M>>>,
    codec: Box<dyn ObjectCodec>,
    index: OwnerIndex,
    batch_size: usize,
}

impl<M: ManageConnection> std::fmt::Debug for StoreClient<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreClient")
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl<M> StoreClient<M>
where
    M: ManageConnection,
    M::Connection: KeyValueConnection,
{
    /// Wrap an existing pool
    pub fn new(pool: Pool<M>, batch_size: usize) -> Self {
        Self {
            pool: RwLock::new(Some(pool)),
            codec: Box::new(JsonCodec),
            index: OwnerIndex::default(),
            batch_size,
        }
    }

    /// Build a client with its own pool over `manager`
    pub fn connect(manager: M, config: &DatabaseConfig) -> StoreResult<Self> {
        let pool = build_pool(manager, config)?;
        info!(
            address = %config.address(),
            max_idle = config.max_idle,
            "store client configured"
        );
        Ok(Self::new(pool, config.batch_size))
    }

    pub fn with_codec(mut self, codec: impl ObjectCodec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    pub fn with_index(mut self, index: OwnerIndex) -> Self {
        self.index = index;
        self
    }

    /// Page size for collaborators; not used by the client itself
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn is_connected(&self) -> bool {
        self.pool.read().map(|pool| pool.is_some()).unwrap_or(false)
    }

    fn connection(&self) -> StoreResult<PooledConnection<M>> {
        let pool = self
            .pool
            .read()
            .map_err(handle_poison)?
            .clone()
            .ok_or_else(|| StoreError::Transport("store client is disconnected".to_string()))?;

        Ok(pool.get()?)
    }

    fn encode(&self, object: &StoredObject) -> StoreResult<EncodedObject> {
        let encoded = self.codec.encode(object)?;
        if encoded.id.is_empty() {
            return Err(StoreError::EmptyId);
        }
        Ok(encoded)
    }

    fn observe<T>(&self, operation: &'static str, run: impl FnOnce() -> StoreResult<T>) -> StoreResult<T> {
        let timer = Timer::new(operation);
        let result = run();
        timer.stop();

        if let Err(err) = &result {
            warn!(operation, error = %err, "store operation failed");
            metrics::record_error(operation, err.kind());
        }
        result
    }

    /// Persist a new object and index it under its owner.
    ///
    /// An empty ID is replaced by a fresh one; the ID written is returned.
    /// Fails with `Duplicate` if a record with the same ID already exists.
    pub fn store(&self, mut object: StoredObject) -> StoreResult<String> {
        self.observe("store", || {
            object.validate_contract(false)?;

            let mut conn = self.connection()?;
            let encoded = self.encode(&object)?;
            let id = encoded.id.as_str();

            run_watched(&mut *conn, "store", |conn| {
                conn.watch(id)?;
                if conn.exists(id)? {
                    return Err(StoreError::Duplicate(format!("object {} exists in database", id)));
                }

                let mut batch = CommandBatch::new();
                batch.set(id, encoded.bytes.clone());
                self.index.add(&mut batch, &object.app_service_key, id);
                Ok(batch)
            })?;

            debug!(id, owner = %object.app_service_key, "object stored");
            metrics::record_counter(metrics::OBJECTS_STORED, 1);
            Ok(encoded.id.clone())
        })
    }

    /// All objects owned by `app_service_key`, in no particular order.
    ///
    /// An owner with no objects yields an empty collection. Index entries
    /// without a primary record are skipped (see [`Self::reconcile_index`]).
    pub fn retrieve(&self, app_service_key: &str) -> StoreResult<Vec<StoredObject>> {
        self.observe("retrieve", || {
            if app_service_key.is_empty() {
                return Err(StoreError::InvalidArgument(
                    "no AppServiceKey provided".to_string(),
                ));
            }

            let mut conn = self.connection()?;
            let ids = self.index.members(&mut *conn, app_service_key)?;
            if ids.is_empty() {
                return Ok(Vec::new());
            }

            let records = conn.get_many(&ids)?;
            let mut objects = Vec::with_capacity(records.len());
            for (id, record) in ids.iter().zip(records) {
                match record {
                    Some(bytes) => objects.push(self.codec.decode(&bytes)?),
                    None => warn!(id = %id, owner = app_service_key, "index entry without primary record"),
                }
            }

            metrics::record_counter(metrics::OBJECTS_RETRIEVED, objects.len() as u64);
            Ok(objects)
        })
    }

    /// Replace an existing object.
    ///
    /// If the owner changed, the ID moves between owner indexes in the same
    /// batch as the overwrite. Fails with `NotFound` if nothing is stored.
    pub fn update(&self, mut object: StoredObject) -> StoreResult<()> {
        self.observe("update", || {
            object.validate_contract(true)?;

            let mut conn = self.connection()?;
            let encoded = self.encode(&object)?;
            let id = encoded.id.as_str();
            let owner = object.app_service_key.as_str();

            run_watched(&mut *conn, "update", |conn| {
                conn.watch(id)?;
                let current = conn
                    .get(id)?
                    .ok_or_else(|| StoreError::NotFound(format!("object {} not found", id)))?;
                let current = self.codec.decode(&current)?;

                let mut batch = CommandBatch::new();
                if current.app_service_key != owner {
                    self.index
                        .relocate(&mut batch, &current.app_service_key, owner, id);
                }
                batch.set(id, encoded.bytes.clone());
                Ok(batch)
            })?;

            debug!(id, owner, "object updated");
            metrics::record_counter(metrics::OBJECTS_UPDATED, 1);
            Ok(())
        })
    }

    /// Delete an object and its index entry.
    ///
    /// The index entry under the given owner is removed even when no primary
    /// record exists; that case still fails with `NotFound`. If the stored
    /// record names a different owner, that owner's entry is removed too.
    pub fn remove(&self, mut object: StoredObject) -> StoreResult<()> {
        self.observe("remove", || {
            object.validate_contract(true)?;

            let mut conn = self.connection()?;
            let id = object.id.as_str();
            let owner = object.app_service_key.as_str();
            let mut deleted = None;

            let report = run_watched(&mut *conn, "remove", |conn| {
                conn.watch(id)?;
                // an unreadable record is still deleted; only its owner is unknown
                let stored_owner = conn.get(id)?.and_then(|bytes| match self.codec.decode(&bytes) {
                    Ok(stored) => Some(stored.app_service_key),
                    Err(err) => {
                        warn!(id, error = %err, "stored record could not be decoded");
                        None
                    }
                });

                let mut batch = CommandBatch::new();
                deleted = Some(batch.unlink(id));
                self.index.remove(&mut batch, owner, id);
                if let Some(stored_owner) = stored_owner.filter(|stored| stored != owner) {
                    self.index.remove(&mut batch, &stored_owner, id);
                }
                Ok(batch)
            })?;

            let existed = deleted
                .and_then(|slot| report.affected(slot))
                .is_some_and(|count| count > 0);
            if !existed {
                return Err(StoreError::NotFound(
                    "could not remove object from store".to_string(),
                ));
            }

            debug!(id, owner, "object removed");
            metrics::record_counter(metrics::OBJECTS_REMOVED, 1);
            Ok(())
        })
    }

    /// Drop index entries for `app_service_key` whose primary record is gone
    /// or now belongs to another owner. Returns the pruned IDs.
    ///
    /// Idempotent: a second call on an unchanged store prunes nothing.
    pub fn reconcile_index(&self, app_service_key: &str) -> StoreResult<Vec<String>> {
        self.observe("reconcile", || {
            if app_service_key.is_empty() {
                return Err(StoreError::InvalidArgument(
                    "no AppServiceKey provided".to_string(),
                ));
            }

            let mut conn = self.connection()?;
            let mut pruned = Vec::new();

            run_watched(&mut *conn, "reconcile", |conn| {
                for id in self.index.members(conn, app_service_key)? {
                    conn.watch(&id)?;
                }
                pruned = self
                    .index
                    .stale_entries(conn, self.codec.as_ref(), app_service_key)?;

                let mut batch = CommandBatch::new();
                for id in &pruned {
                    self.index.remove(&mut batch, app_service_key, id);
                }
                Ok(batch)
            })?;

            if !pruned.is_empty() {
                info!(owner = app_service_key, count = pruned.len(), "pruned stale index entries");
                metrics::record_counter(metrics::INDEX_PRUNED, pruned.len() as u64);
            }
            Ok(pruned)
        })
    }

    /// Close the pool. Every later operation fails with `Transport`.
    ///
    /// Connections currently borrowed are closed when they are returned.
    pub fn disconnect(&self) -> StoreResult<()> {
        let pool = self.pool.write().map_err(handle_poison)?.take();
        if pool.is_some() {
            info!("store client disconnected");
        }
        Ok(())
    }
}
