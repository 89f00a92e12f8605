//! Redis backend
//!
//! Pooled connections are dialed with the configured password and connect
//! timeout. Batches run inside MULTI/EXEC.

use super::backend::{ConnectionSource, KeyValueConnection};
use super::batch::{BatchReport, Command, CommandBatch, CommandOutcome};
use super::errors::{StoreError, StoreResult};
use crate::config::DatabaseConfig;
use redis::{ConnectionLike, RedisError, Value};
use std::time::Duration;
use tracing::debug;

/// r2d2 manager dialing a single Redis endpoint
pub struct RedisConnectionManager {
    client: redis::Client,
    connect_timeout: Duration,
}

impl RedisConnectionManager {
    pub fn new(client: redis::Client, connect_timeout: Duration) -> Self {
        Self {
            client,
            connect_timeout,
        }
    }
}

impl ConnectionSource for RedisConnectionManager {
    fn from_config(config: &DatabaseConfig) -> StoreResult<Self> {
        let info = redis::ConnectionInfo {
            addr: redis::ConnectionAddr::Tcp(config.host.clone(), config.port),
            redis: redis::RedisConnectionInfo {
                password: config.password.clone(),
                ..Default::default()
            },
        };
        let client = redis::Client::open(info)
            .map_err(|e| StoreError::Transport(format!("Could not configure Redis client: {}", e)))?;

        Ok(Self::new(client, config.connect_timeout))
    }
}

impl r2d2::ManageConnection for RedisConnectionManager {
    type Connection = redis::Connection;
    type Error = RedisError;

    fn connect(&self) -> Result<redis::Connection, RedisError> {
        debug!(timeout = ?self.connect_timeout, "dialing redis");
        self.client.get_connection_with_timeout(self.connect_timeout)
    }

    fn is_valid(&self, conn: &mut redis::Connection) -> Result<(), RedisError> {
        redis::cmd("PING").query::<String>(conn).map(|_| ())
    }

    fn has_broken(&self, conn: &mut redis::Connection) -> bool {
        !conn.is_open()
    }
}

fn outcome_from_value(value: &Value) -> CommandOutcome {
    match value {
        Value::Int(n) => CommandOutcome::Affected((*n).max(0) as u64),
        _ => CommandOutcome::Acknowledged,
    }
}

impl KeyValueConnection for redis::Connection {
    fn exists(&mut self, key: &str) -> StoreResult<bool> {
        Ok(redis::cmd("EXISTS").arg(key).query::<bool>(self)?)
    }

    fn get(&mut self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(redis::cmd("GET").arg(key).query::<Option<Vec<u8>>>(self)?)
    }

    fn get_many(&mut self, keys: &[String]) -> StoreResult<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        Ok(redis::cmd("MGET").arg(keys).query::<Vec<Option<Vec<u8>>>>(self)?)
    }

    fn members(&mut self, set: &str) -> StoreResult<Vec<String>> {
        Ok(redis::cmd("SMEMBERS").arg(set).query::<Vec<String>>(self)?)
    }

    fn watch(&mut self, key: &str) -> StoreResult<()> {
        Ok(redis::cmd("WATCH").arg(key).query::<()>(self)?)
    }

    fn unwatch(&mut self) -> StoreResult<()> {
        Ok(redis::cmd("UNWATCH").query::<()>(self)?)
    }

    fn execute(&mut self, batch: &CommandBatch) -> StoreResult<Option<BatchReport>> {
        let mut pipe = redis::pipe();
        pipe.atomic();

        for command in batch.commands() {
            match command {
                Command::Set { key, value } => {
                    pipe.cmd("SET").arg(key).arg(value.as_slice());
                }
                Command::Unlink { key } => {
                    pipe.cmd("UNLINK").arg(key);
                }
                Command::SetAdd { set, member } => {
                    pipe.cmd("SADD").arg(set).arg(member);
                }
                Command::SetRemove { set, member } => {
                    pipe.cmd("SREM").arg(set).arg(member);
                }
            }
        }

        // EXEC replies nil when a watched key was touched
        let values: Option<Vec<Value>> = pipe.query(self)?;

        match values {
            Some(values) => {
                let outcomes = values.iter().map(outcome_from_value).collect();
                Ok(Some(BatchReport::new(batch, outcomes)?))
            }
            None => Ok(None),
        }
    }
}
