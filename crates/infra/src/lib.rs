//! Infrastructure layer: storage, services, configuration.

pub mod config;
pub mod error;
pub mod services;
pub mod store;

use std::sync::Arc;

use tracing::info;

pub use config::{AppConfig, ConfigError, DatabaseConfig};
pub use error::ServiceError;
pub use services::InventoryServices;
pub use store::{InMemoryInventoryStore, InventoryStore, PostgresInventoryStore, StoreError};

/// Open the store selected by configuration: Postgres when a database URL is
/// set, otherwise an empty in-memory store.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn InventoryStore>, StoreError> {
    match &config.database {
        Some(db) => {
            let store = PostgresInventoryStore::connect(db).await?;
            info!(max_connections = db.max_connections, "using postgres inventory store");
            Ok(Arc::new(store))
        }
        None => {
            info!("DATABASE_URL not set; using in-memory inventory store");
            Ok(Arc::new(InMemoryInventoryStore::new()))
        }
    }
}
