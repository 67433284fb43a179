use crate::config::{StorageBackend, StorageConfig};
use crate::error::{AppError, Result};
use crate::state::{InMemoryStore, SledStore, Store};
use std::sync::Arc;

/// Create a store based on configuration
pub async fn create_store(config: &StorageConfig) -> Result<Arc<dyn Store>> {
    match config.backend {
        StorageBackend::Sled => {
            let path = config.path.as_ref().ok_or_else(|| {
                AppError::Configuration(
                    "Sled backend requires 'storage.path' configuration".to_string(),
                )
            })?;

            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }

            tracing::info!(path = ?path, "Initializing Sled storage backend");

            let store = SledStore::new(path)?;
            Ok(Arc::new(store))
        }

        StorageBackend::Memory => Ok(create_in_memory_store()),
    }
}

/// Create an in-memory store (for testing and development)
pub fn create_in_memory_store() -> Arc<dyn Store> {
    tracing::info!("Initializing in-memory storage backend");
    Arc::new(InMemoryStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_sled_store() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig {
            backend: StorageBackend::Sled,
            path: Some(temp_dir.path().join("nested").join("retention.db")),
        };

        let store = create_store(&config).await.unwrap();
        assert!(store.list_segments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_in_memory_store() {
        let config = StorageConfig {
            backend: StorageBackend::Memory,
            path: None,
        };
        let store = create_store(&config).await.unwrap();
        assert!(store.get_user(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sled_requires_path() {
        let config = StorageConfig {
            backend: StorageBackend::Sled,
            path: None,
        };

        let result = create_store(&config).await;
        assert!(result.is_err());
    }
}
