//! In-Memory Backend
//!
//! Process-local keyspace with the same command semantics as the Redis
//! backend. All connections handed out by one manager share one keyspace;
//! a batch runs under a single lock, and write stamps back `watch`.

use super::backend::{ConnectionSource, KeyValueConnection};
use super::batch::{BatchReport, Command, CommandBatch, CommandOutcome};
use super::errors::{StoreError, StoreResult};
use crate::config::DatabaseConfig;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn handle_poison<T>(_err: PoisonError<T>) -> StoreError {
    StoreError::Transport("Lock poisoned: a thread panicked while holding the keyspace".to_string())
}

#[derive(Debug, Default)]
struct Keyspace {
    records: HashMap<String, Vec<u8>>,
    sets: HashMap<String, HashSet<String>>,
    /// Global write counter; every modification takes the next value
    clock: u64,
    /// Stamp of the last write, kept only for live or watched keys
    stamps: HashMap<String, u64>,
    /// Number of open watches per key
    watchers: HashMap<String, usize>,
}

impl Keyspace {
    fn stamp(&self, key: &str) -> u64 {
        self.stamps.get(key).copied().unwrap_or(0)
    }

    fn is_live(&self, key: &str) -> bool {
        self.records.contains_key(key) || self.sets.contains_key(key)
    }

    fn touch(&mut self, key: &str) {
        self.clock += 1;
        if self.is_live(key) || self.watchers.contains_key(key) {
            self.stamps.insert(key.to_string(), self.clock);
        } else {
            self.stamps.remove(key);
        }
    }

    fn watch(&mut self, key: &str) -> u64 {
        *self.watchers.entry(key.to_string()).or_insert(0) += 1;
        self.stamp(key)
    }

    fn release(&mut self, key: &str) {
        if let Some(count) = self.watchers.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                self.watchers.remove(key);
                if !self.is_live(key) {
                    self.stamps.remove(key);
                }
            }
        }
    }

    fn apply(&mut self, command: &Command) -> CommandOutcome {
        match command {
            Command::Set { key, value } => {
                self.records.insert(key.clone(), value.clone());
                self.touch(key);
                CommandOutcome::Acknowledged
            }
            Command::Unlink { key } => {
                let removed = self.records.remove(key).is_some();
                if removed {
                    self.touch(key);
                }
                CommandOutcome::Affected(removed as u64)
            }
            Command::SetAdd { set, member } => {
                let added = self.sets.entry(set.clone()).or_default().insert(member.clone());
                if added {
                    self.touch(set);
                }
                CommandOutcome::Affected(added as u64)
            }
            Command::SetRemove { set, member } => {
                let removed = match self.sets.get_mut(set) {
                    Some(members) => {
                        let removed = members.remove(member);
                        if members.is_empty() {
                            self.sets.remove(set);
                        }
                        removed
                    }
                    None => false,
                };
                if removed {
                    self.touch(set);
                }
                CommandOutcome::Affected(removed as u64)
            }
        }
    }
}

/// r2d2 manager over a shared in-memory keyspace
#[derive(Debug, Clone, Default)]
pub struct MemoryConnectionManager {
    keyspace: Arc<Mutex<Keyspace>>,
}

impl MemoryConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Keyspace>> {
        self.keyspace.lock().map_err(handle_poison)
    }

    /// Whether a primary record exists under `key`
    pub fn has_record(&self, key: &str) -> StoreResult<bool> {
        Ok(self.lock()?.records.contains_key(key))
    }

    /// Keys of every primary record
    pub fn record_keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.lock()?.records.keys().cloned().collect())
    }

    /// Keys of every non-empty set
    pub fn set_keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.lock()?.sets.keys().cloned().collect())
    }

    /// Members of one set
    pub fn set_members(&self, set: &str) -> StoreResult<HashSet<String>> {
        Ok(self.lock()?.sets.get(set).cloned().unwrap_or_default())
    }

    /// Apply commands outside any client, e.g. to plant stale index entries
    pub fn apply_raw(&self, batch: &CommandBatch) -> StoreResult<()> {
        let mut keyspace = self.lock()?;
        for command in batch.commands() {
            keyspace.apply(command);
        }
        Ok(())
    }
}

impl ConnectionSource for MemoryConnectionManager {
    fn from_config(_config: &DatabaseConfig) -> StoreResult<Self> {
        Ok(Self::new())
    }
}

impl r2d2::ManageConnection for MemoryConnectionManager {
    type Connection = MemoryConnection;
    type Error = StoreError;

    fn connect(&self) -> Result<MemoryConnection, StoreError> {
        Ok(MemoryConnection {
            keyspace: Arc::clone(&self.keyspace),
            watched: Vec::new(),
        })
    }

    fn is_valid(&self, _conn: &mut MemoryConnection) -> Result<(), StoreError> {
        Ok(())
    }

    fn has_broken(&self, _conn: &mut MemoryConnection) -> bool {
        false
    }
}

/// One client's view of the shared keyspace
#[derive(Debug)]
pub struct MemoryConnection {
    keyspace: Arc<Mutex<Keyspace>>,
    /// Watched keys and the stamps seen at watch time
    watched: Vec<(String, u64)>,
}

impl MemoryConnection {
    fn lock(&self) -> StoreResult<MutexGuard<'_, Keyspace>> {
        self.keyspace.lock().map_err(handle_poison)
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        if !self.watched.is_empty() {
            let _ = self.unwatch();
        }
    }
}

impl KeyValueConnection for MemoryConnection {
    fn exists(&mut self, key: &str) -> StoreResult<bool> {
        Ok(self.lock()?.records.contains_key(key))
    }

    fn get(&mut self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.lock()?.records.get(key).cloned())
    }

    fn get_many(&mut self, keys: &[String]) -> StoreResult<Vec<Option<Vec<u8>>>> {
        let keyspace = self.lock()?;
        Ok(keys.iter().map(|key| keyspace.records.get(key).cloned()).collect())
    }

    fn members(&mut self, set: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .lock()?
            .sets
            .get(set)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn watch(&mut self, key: &str) -> StoreResult<()> {
        let stamp = self.lock()?.watch(key);
        self.watched.push((key.to_string(), stamp));
        Ok(())
    }

    fn unwatch(&mut self) -> StoreResult<()> {
        let watched = std::mem::take(&mut self.watched);
        let mut keyspace = self.lock()?;
        for (key, _) in &watched {
            keyspace.release(key);
        }
        Ok(())
    }

    fn execute(&mut self, batch: &CommandBatch) -> StoreResult<Option<BatchReport>> {
        let watched = std::mem::take(&mut self.watched);
        let mut keyspace = self.lock()?;

        let changed = watched
            .iter()
            .any(|(key, stamp)| keyspace.stamp(key) != *stamp);
        for (key, _) in &watched {
            keyspace.release(key);
        }
        if changed {
            return Ok(None);
        }

        let outcomes = batch
            .commands()
            .iter()
            .map(|command| keyspace.apply(command))
            .collect();

        Ok(Some(BatchReport::new(batch, outcomes)?))
    }
}
