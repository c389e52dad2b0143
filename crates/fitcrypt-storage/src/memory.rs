//! In-memory key cache (for testing)

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use fitcrypt_core::KeyId;

use crate::error::{StorageError, StorageResult};
use crate::traits::{EvaluationKeyStore, StoredKeys};

/// In-memory key cache for unit tests
///
/// Thread-safe via `RwLock`. Not persistent.
#[derive(Default)]
pub struct InMemoryKeyCache {
    entries: RwLock<HashMap<KeyId, StoredKeys>>,
}

fn poisoned<T>(_: PoisonError<T>) -> StorageError {
    StorageError::Backend("key cache lock poisoned".into())
}

impl InMemoryKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[async_trait]
impl EvaluationKeyStore for InMemoryKeyCache {
    async fn put(&self, id: &KeyId, keys: &StoredKeys) -> StorageResult<()> {
        self.entries
            .write()
            .map_err(poisoned)?
            .insert(*id, keys.clone());
        Ok(())
    }

    async fn get(&self, id: &KeyId) -> StorageResult<StoredKeys> {
        self.entries
            .read()
            .map_err(poisoned)?
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_base58()))
    }

    async fn exists(&self, id: &KeyId) -> StorageResult<bool> {
        Ok(self.entries.read().map_err(poisoned)?.contains_key(id))
    }

    async fn delete(&self, id: &KeyId) -> StorageResult<()> {
        self.entries.write().map_err(poisoned)?.remove(id);
        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<KeyId>> {
        Ok(self.entries.read().map_err(poisoned)?.keys().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{fetch, publish};
    use fitcrypt_core::he::backends::MockBackend;
    use fitcrypt_core::{EncryptionParams, KeyPaths, generate_keys};

    fn sample() -> StoredKeys {
        StoredKeys {
            galois: "Zw==".into(),
            single_step: "cw==".into(),
            relin: "cg==".into(),
        }
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let cache = InMemoryKeyCache::new();
        let id = KeyId::of(b"client");

        cache.put(&id, &sample()).await.unwrap();
        assert_eq!(cache.get(&id).await.unwrap(), sample());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_not_found() {
        let cache = InMemoryKeyCache::new();
        let result = cache.get(&KeyId::of(b"nobody")).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_idempotent() {
        let cache = InMemoryKeyCache::new();
        let id = KeyId::of(b"deleteme");

        cache.delete(&id).await.unwrap();
        cache.put(&id, &sample()).await.unwrap();
        cache.delete(&id).await.unwrap();
        assert!(!cache.exists(&id).await.unwrap());
        cache.delete(&id).await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_publish_then_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::new(EncryptionParams::new(64).unwrap());
        let bundle = generate_keys(&backend, &KeyPaths::in_dir(dir.path())).unwrap();
        let cache = InMemoryKeyCache::new();

        let id = publish(&cache, bundle.evaluation_keys()).await.unwrap();
        assert_eq!(id, bundle.key_id());
        assert_eq!(cache.list().await.unwrap(), vec![id]);

        let keys = fetch(&cache, &backend, &id).await.unwrap();
        assert_eq!(keys.key_id(), id);
    }

    #[tokio::test]
    async fn test_entry_under_wrong_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::new(EncryptionParams::new(64).unwrap());
        let bundle = generate_keys(&backend, &KeyPaths::in_dir(dir.path())).unwrap();
        let cache = InMemoryKeyCache::new();

        let wrong = KeyId::of(b"someone else");
        cache
            .put(&wrong, &StoredKeys::from_evaluation(bundle.evaluation_keys()))
            .await
            .unwrap();

        assert!(matches!(
            fetch(&cache, &backend, &wrong).await,
            Err(StorageError::KeyIdMismatch { .. })
        ));
    }
}
