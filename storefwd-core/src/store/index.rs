/*
    index.rs - Owner index

    Maintains owner key -> set of object IDs. Membership must mirror
    primary-record existence exactly, so every index change is queued into
    the same batch as the primary write/delete it belongs to.

    Layout: "<collection>:<owner key>" -> { id, ... }
*/

use super::backend::KeyValueConnection;
use super::batch::{CommandBatch, Slot};
use super::codec::ObjectCodec;
use super::errors::StoreResult;

/// Collection name prefixing every owner index key
pub const INDEX_COLLECTION: &str = "store";

/// Queues index commands for one collection
#[derive(Debug, Clone)]
pub struct OwnerIndex {
    collection: String,
}

impl Default for OwnerIndex {
    fn default() -> Self {
        Self::new(INDEX_COLLECTION)
    }
}

impl OwnerIndex {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
        }
    }

    /// Index key holding the IDs owned by `owner`
    pub fn key(&self, owner: &str) -> String {
        format!("{}:{}", self.collection, owner)
    }

    /// Queue adding `id` to the owner's set
    pub fn add(&self, batch: &mut CommandBatch, owner: &str, id: &str) -> Slot {
        batch.set_add(self.key(owner), id)
    }

    /// Queue removing `id` from the owner's set
    pub fn remove(&self, batch: &mut CommandBatch, owner: &str, id: &str) -> Slot {
        batch.set_remove(self.key(owner), id)
    }

    /// Queue moving `id` from one owner's set to another's
    pub fn relocate(&self, batch: &mut CommandBatch, from: &str, to: &str, id: &str) -> (Slot, Slot) {
        let removed = self.remove(batch, from, id);
        let added = self.add(batch, to, id);
        (removed, added)
    }

    /// IDs currently indexed for `owner`
    pub fn members<C: KeyValueConnection>(&self, conn: &mut C, owner: &str) -> StoreResult<Vec<String>> {
        conn.members(&self.key(owner))
    }

    /// Find index entries for `owner` that no longer match a primary record.
    ///
    /// An entry is stale when its record is missing or now belongs to a
    /// different owner. Records that fail to decode are left alone.
    pub fn stale_entries<C: KeyValueConnection>(
        &self,
        conn: &mut C,
        codec: &dyn ObjectCodec,
        owner: &str,
    ) -> StoreResult<Vec<String>> {
        let ids = self.members(conn, owner)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let records = conn.get_many(&ids)?;
        let stale = ids
            .into_iter()
            .zip(records)
            .filter(|(_, record)| match record {
                None => true,
                Some(bytes) => codec
                    .decode(bytes)
                    .map(|object| object.app_service_key != owner)
                    .unwrap_or(false),
            })
            .map(|(id, _)| id)
            .collect();

        Ok(stale)
    }
}
