//! Object codec
//!
//! Converts between [`StoredObject`] and the bytes written under its primary key.

use super::contract::StoredObject;
use super::errors::StoreResult;
use serde::{Deserialize, Serialize};

/// Encoded form of an object, ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedObject {
    /// ID carried by the encoded record
    pub id: String,
    pub bytes: Vec<u8>,
}

/// Serialize/deserialize capability used by the store client
pub trait ObjectCodec: Send + Sync {
    fn encode(&self, object: &StoredObject) -> StoreResult<EncodedObject>;

    fn decode(&self, bytes: &[u8]) -> StoreResult<StoredObject>;
}

/// Storage record layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    id: String,
    app_service_key: String,
    payload: Vec<u8>,
    retry_count: u32,
    pipeline_position: u32,
    version: String,
    #[serde(rename = "correlationID")]
    correlation_id: String,
    #[serde(rename = "eventID")]
    event_id: String,
    event_checksum: String,
}

impl From<&StoredObject> for StoredRecord {
    fn from(object: &StoredObject) -> Self {
        Self {
            id: object.id.clone(),
            app_service_key: object.app_service_key.clone(),
            payload: object.payload.clone(),
            retry_count: object.retry_count,
            pipeline_position: object.pipeline_position,
            version: object.version.clone(),
            correlation_id: object.correlation_id.clone(),
            event_id: object.event_id.clone(),
            event_checksum: object.event_checksum.clone(),
        }
    }
}

impl From<StoredRecord> for StoredObject {
    fn from(record: StoredRecord) -> Self {
        Self {
            id: record.id,
            app_service_key: record.app_service_key,
            payload: record.payload,
            retry_count: record.retry_count,
            pipeline_position: record.pipeline_position,
            version: record.version,
            correlation_id: record.correlation_id,
            event_id: record.event_id,
            event_checksum: record.event_checksum,
        }
    }
}

/// JSON codec backed by `serde_json`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl ObjectCodec for JsonCodec {
    fn encode(&self, object: &StoredObject) -> StoreResult<EncodedObject> {
        let record = StoredRecord::from(object);
        let bytes = serde_json::to_vec(&record)?;
        Ok(EncodedObject { id: record.id, bytes })
    }

    fn decode(&self, bytes: &[u8]) -> StoreResult<StoredObject> {
        let record: StoredRecord = serde_json::from_slice(bytes)?;
        Ok(record.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::errors::StoreError;

    #[test]
    fn test_json_field_names() {
        let mut object = StoredObject::new("svc-a", vec![7], "v1");
        object.correlation_id = "corr".to_string();

        let encoded = JsonCodec.encode(&object).unwrap();
        assert_eq!(encoded.id, object.id);

        let value: serde_json::Value = serde_json::from_slice(&encoded.bytes).unwrap();
        assert_eq!(value["appServiceKey"], "svc-a");
        assert_eq!(value["correlationID"], "corr");
        assert!(value.get("eventChecksum").is_some());

        let decoded = JsonCodec.decode(&encoded.bytes).unwrap();
        assert_eq!(decoded, object);
    }

    #[test]
    fn test_decode_garbage() {
        let err = JsonCodec.decode(b"{\"id\": 5").unwrap_err();
        assert!(matches!(err, StoreError::Encoding(_)));
    }
}
