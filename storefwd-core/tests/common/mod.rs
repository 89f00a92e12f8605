//! Shared helpers for integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use storefwd_core::store::{MemoryConnectionManager, StoreClient, StoredObject, INDEX_COLLECTION};
use storefwd_core::DatabaseConfig;

/// Client over a fresh in-memory keyspace, plus a handle for inspecting it
pub fn memory_client() -> (StoreClient<MemoryConnectionManager>, MemoryConnectionManager) {
    let manager = MemoryConnectionManager::new();
    let client = StoreClient::connect(manager.clone(), &DatabaseConfig::default())
        .expect("memory pool should build");
    (client, manager)
}

/// Object owned by `owner` with a fresh ID
pub fn object(owner: &str) -> StoredObject {
    let mut object = StoredObject::new(owner, b"{\"reading\":42}".to_vec(), "pipeline-v1");
    object.correlation_id = "corr-1".to_string();
    object.event_id = "event-1".to_string();
    object
}

pub fn index_key(owner: &str) -> String {
    format!("{}:{}", INDEX_COLLECTION, owner)
}

/// Assert that every primary record is indexed under exactly its owner
/// and that no index entry lacks a primary record.
pub fn assert_index_consistent(
    client: &StoreClient<MemoryConnectionManager>,
    manager: &MemoryConnectionManager,
    owners: &[&str],
) {
    let records: HashSet<String> = manager.record_keys().unwrap().into_iter().collect();
    let mut indexed = HashSet::new();

    for set in manager.set_keys().unwrap() {
        for id in manager.set_members(&set).unwrap() {
            assert!(records.contains(&id), "index {} holds {} without a record", set, id);
            assert!(indexed.insert(id.clone()), "{} indexed under more than one owner", id);
        }
    }
    assert_eq!(records, indexed, "records missing from the index");

    for owner in owners {
        for object in client.retrieve(owner).unwrap() {
            assert_eq!(&object.app_service_key, owner);
            assert!(manager.set_members(&index_key(owner)).unwrap().contains(&object.id));
        }
    }
}
