/*
    Store subsystem - durable object persistence

    Objects live under their ID; an owner index maps each app service key
    to the IDs it owns. Both views change together in atomic batches.
*/

pub mod backend;
pub mod batch;
pub mod client;
pub mod codec;
pub mod connector;
pub mod contract;
pub mod errors;
pub mod index;
pub mod memory_backend;
pub mod redis_backend;

pub use backend::{ConnectionSource, KeyValueConnection};
pub use batch::{BatchReport, Command, CommandBatch, CommandOutcome, Slot};
pub use client::{build_pool, StoreClient, MAX_WATCH_ATTEMPTS};
pub use codec::{EncodedObject, JsonCodec, ObjectCodec};
pub use connector::{RedisStoreConnector, StoreConnector};
pub use contract::StoredObject;
pub use errors::*;
pub use index::{OwnerIndex, INDEX_COLLECTION};
pub use memory_backend::{MemoryConnection, MemoryConnectionManager};
pub use redis_backend::RedisConnectionManager;
