//! Storage trait definitions

use async_trait::async_trait;
use fitcrypt_core::{EvaluationKeys, HeBackend, KeyId};

use crate::error::{StorageError, StorageResult};

/// Parse a base58 key id as used for cache entry names
pub fn key_id_from_base58(s: &str) -> StorageResult<KeyId> {
    KeyId::from_base58(s).ok_or_else(|| StorageError::InvalidKeyId(s.to_string()))
}

/// The three armored evaluation keys of one client install
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredKeys {
    pub galois: String,
    pub single_step: String,
    pub relin: String,
}

impl StoredKeys {
    pub fn from_evaluation(keys: &EvaluationKeys) -> Self {
        let (galois, single_step, relin) = keys.to_armored();
        Self {
            galois,
            single_step,
            relin,
        }
    }

    /// Parse the cached texts and confirm they belong to `expected`
    pub fn open(&self, backend: &dyn HeBackend, expected: &KeyId) -> StorageResult<EvaluationKeys> {
        let keys =
            EvaluationKeys::from_armored(backend, &self.galois, &self.single_step, &self.relin)?;
        let actual = keys.key_id();
        if actual != *expected {
            return Err(StorageError::KeyIdMismatch {
                expected: expected.to_base58(),
                actual: actual.to_base58(),
            });
        }
        Ok(keys)
    }
}

/// Cache of published evaluation keys, keyed by the client's key id
///
/// Entries are written and removed as a unit: a reader never sees a
/// subset of the three keys.
#[async_trait]
pub trait EvaluationKeyStore: Send + Sync {
    /// Store the keys for `id`, replacing any previous entry
    async fn put(&self, id: &KeyId, keys: &StoredKeys) -> StorageResult<()>;

    /// Returns `StorageError::NotFound` if nothing is cached for `id`.
    async fn get(&self, id: &KeyId) -> StorageResult<StoredKeys>;

    async fn exists(&self, id: &KeyId) -> StorageResult<bool>;

    /// Returns `Ok(())` even if the entry didn't exist (idempotent).
    async fn delete(&self, id: &KeyId) -> StorageResult<()>;

    async fn list(&self) -> StorageResult<Vec<KeyId>>;
}

/// Cache a client's evaluation keys under their own key id
pub async fn publish(store: &dyn EvaluationKeyStore, keys: &EvaluationKeys) -> StorageResult<KeyId> {
    let id = keys.key_id();
    store.put(&id, &StoredKeys::from_evaluation(keys)).await?;
    tracing::info!(key_id = %id, "Published evaluation keys");
    Ok(id)
}

/// Load and validate the cached evaluation keys for `id`
pub async fn fetch(
    store: &dyn EvaluationKeyStore,
    backend: &dyn HeBackend,
    id: &KeyId,
) -> StorageResult<EvaluationKeys> {
    let stored = store.get(id).await?;
    stored.open(backend, id)
}
