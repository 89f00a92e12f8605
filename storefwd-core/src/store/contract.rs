//! Stored object contract
//!
//! The caller-facing representation of a unit of work that must survive
//! restarts and be retried later, owned by an app service key.

use super::errors::{StoreError, StoreResult};
use uuid::Uuid;

/// A persisted unit of work, grouped by the app service that owns it
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoredObject {
    /// Unique identifier, primary key in the store
    pub id: String,

    /// Owner key of the app service this object belongs to
    pub app_service_key: String,

    /// Opaque data to retry
    pub payload: Vec<u8>,

    /// Number of attempts made so far
    pub retry_count: u32,

    /// Position in the pipeline to resume from
    pub pipeline_position: u32,

    /// Hash of the pipeline configuration the payload was produced with
    pub version: String,

    pub correlation_id: String,
    pub event_id: String,
    pub event_checksum: String,
}

impl StoredObject {
    /// Create a new object with a fresh ID
    pub fn new(app_service_key: impl Into<String>, payload: Vec<u8>, version: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            app_service_key: app_service_key.into(),
            payload,
            version: version.into(),
            ..Default::default()
        }
    }

    /// Check the contract for create (`id_required == false`) or
    /// update/remove (`id_required == true`) mode.
    ///
    /// In create mode an empty ID is replaced by a fresh UUID.
    pub fn validate_contract(&mut self, id_required: bool) -> StoreResult<()> {
        if self.id.is_empty() {
            if id_required {
                return Err(StoreError::Validation("ID cannot be empty".to_string()));
            }
            self.id = Uuid::new_v4().to_string();
        }

        if self.app_service_key.is_empty() {
            return Err(StoreError::Validation(
                "AppServiceKey cannot be empty".to_string(),
            ));
        }

        if self.payload.is_empty() {
            return Err(StoreError::Validation("payload cannot be empty".to_string()));
        }

        if self.version.is_empty() {
            return Err(StoreError::Validation("version cannot be empty".to_string()));
        }

        Ok(())
    }
}
