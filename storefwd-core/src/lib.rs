pub mod config;
pub mod logging;
pub mod metrics;
pub mod store;

pub use config::{Config, ConfigError, DatabaseConfig};
pub use logging::{init_logging, LogLevel};
pub use store::{
    RedisStoreConnector, StoreClient, StoreConnector, StoreError, StoreResult, StoredObject,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let _ = LogLevel::Info;
        let _ = DatabaseConfig::default();
        let _ = RedisStoreConnector::new();
    }
}
