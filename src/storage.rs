use std::sync::Arc;

pub use outlay_core::storage::{StorageBackend, StorageError};
pub use outlay_memory::InMemoryStorage;
pub use outlay_sqlite::SqliteStorage;

use crate::config::{StorageConfig, StorageKind};

/// Opens the backend selected in configuration.
pub fn open_storage(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>, StorageError> {
    let storage: Arc<dyn StorageBackend> = match config.backend {
        StorageKind::Memory => Arc::new(InMemoryStorage::new()),
        StorageKind::Sqlite => Arc::new(SqliteStorage::new(&config.path)?),
    };
    tracing::info!(backend = storage.name(), path = %config.path, "Storage opened");
    Ok(storage)
}
