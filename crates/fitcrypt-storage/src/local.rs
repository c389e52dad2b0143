//! Local filesystem key cache

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fitcrypt_core::KeyId;
use tokio::fs;

use crate::error::{StorageError, StorageResult};
use crate::traits::{EvaluationKeyStore, StoredKeys};

const GALOIS_FILE: &str = "galKey";
const SINGLE_STEP_FILE: &str = "galSingleStepKey";
const RELIN_FILE: &str = "relinKey";

/// Local filesystem key cache
///
/// One directory per client, named by the base58 key id.
/// Structure: `{root}/keys/{key_id_base58}/{galKey,galSingleStepKey,relinKey}`
pub struct LocalKeyCache {
    root: PathBuf,
}

impl LocalKeyCache {
    /// Create the cache at the given root directory
    ///
    /// Creates the directory structure if it doesn't exist.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("keys")).await?;
        Ok(Self { root })
    }

    fn entry_dir(&self, id: &KeyId) -> PathBuf {
        self.root.join("keys").join(id.to_base58())
    }

    async fn write_entry(dir: &Path, keys: &StoredKeys) -> StorageResult<()> {
        fs::create_dir_all(dir).await?;
        fs::write(dir.join(GALOIS_FILE), &keys.galois).await?;
        fs::write(dir.join(SINGLE_STEP_FILE), &keys.single_step).await?;
        fs::write(dir.join(RELIN_FILE), &keys.relin).await?;
        Ok(())
    }
}

async fn read_key(path: &Path, id: &KeyId) -> StorageResult<String> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(StorageError::NotFound(id.to_base58()))
        }
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl EvaluationKeyStore for LocalKeyCache {
    async fn put(&self, id: &KeyId, keys: &StoredKeys) -> StorageResult<()> {
        let dir = self.entry_dir(id);
        if let Err(e) = Self::write_entry(&dir, keys).await {
            // Never leave a partial entry behind
            let _ = fs::remove_dir_all(&dir).await;
            return Err(e);
        }
        tracing::debug!(key_id = %id, path = %dir.display(), "Cached evaluation keys");
        Ok(())
    }

    async fn get(&self, id: &KeyId) -> StorageResult<StoredKeys> {
        let dir = self.entry_dir(id);
        Ok(StoredKeys {
            galois: read_key(&dir.join(GALOIS_FILE), id).await?,
            single_step: read_key(&dir.join(SINGLE_STEP_FILE), id).await?,
            relin: read_key(&dir.join(RELIN_FILE), id).await?,
        })
    }

    async fn exists(&self, id: &KeyId) -> StorageResult<bool> {
        let dir = self.entry_dir(id);
        Ok([GALOIS_FILE, SINGLE_STEP_FILE, RELIN_FILE]
            .iter()
            .all(|name| dir.join(name).is_file()))
    }

    async fn delete(&self, id: &KeyId) -> StorageResult<()> {
        match fs::remove_dir_all(self.entry_dir(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> StorageResult<Vec<KeyId>> {
        let mut ids = Vec::new();

        let mut entries = fs::read_dir(self.root.join("keys")).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(id) = entry.file_name().to_str().and_then(KeyId::from_base58) {
                ids.push(id);
            }
        }

        Ok(ids)
    }
}
