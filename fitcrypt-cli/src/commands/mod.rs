pub mod add;
pub mod compute;
pub mod config;
pub mod decrypt;
pub mod encrypt;
pub mod keys;

use anyhow::Context as _;
use std::path::PathBuf;

use fitcrypt_core::he::backends::MockBackend;
use fitcrypt_core::params::DEFAULT_POLY_MODULUS_DEGREE;
use fitcrypt_core::{BackendId, EncryptionParams, HeBackend, KeyPaths};
use fitcrypt_storage::LocalKeyCache;

use crate::config::Config;

/// Global context passed to all commands
pub struct Context {
    pub json_output: bool,
    pub key_dir_override: Option<PathBuf>,
    pub cache_dir_override: Option<PathBuf>,
    pub poly_degree_override: Option<usize>,
    pub backend_override: Option<String>,
}

impl Context {
    /// Key directory: --key-dir, then config, then `<data dir>/keys`
    pub fn key_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = &self.key_dir_override {
            return Ok(dir.clone());
        }
        match Config::load()?.key_dir {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => Ok(Config::data_dir()?.join("keys")),
        }
    }

    /// Key cache directory: --cache-dir, then config, then `<data dir>/cache`
    pub fn cache_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = &self.cache_dir_override {
            return Ok(dir.clone());
        }
        match Config::load()?.cache_dir {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => Ok(Config::data_dir()?.join("cache")),
        }
    }

    pub fn key_paths(&self) -> anyhow::Result<KeyPaths> {
        Ok(KeyPaths::in_dir(self.key_dir()?))
    }

    pub async fn key_cache(&self) -> anyhow::Result<LocalKeyCache> {
        let dir = self.cache_dir()?;
        LocalKeyCache::new(&dir)
            .await
            .with_context(|| format!("Failed to open key cache at {}", dir.display()))
    }

    pub fn params(&self) -> anyhow::Result<EncryptionParams> {
        let degree = match self.poly_degree_override {
            Some(degree) => degree,
            None => Config::load()?
                .poly_modulus_degree
                .unwrap_or(DEFAULT_POLY_MODULUS_DEGREE),
        };
        Ok(EncryptionParams::new(degree)?)
    }

    /// Resolve which backend to use, with priority:
    /// 1. --backend CLI flag
    /// 2. Config file default_backend
    /// 3. "mock", the only provider compiled in today
    pub fn resolve_backend_id(&self) -> anyhow::Result<BackendId> {
        if let Some(ref backend_str) = self.backend_override {
            return backend_str.parse().map_err(|e| anyhow::anyhow!("{e}"));
        }

        let config = Config::load()?;
        if let Some(ref backend_str) = config.default_backend {
            return backend_str.parse().map_err(|e| anyhow::anyhow!("{e}"));
        }

        Ok(BackendId::Mock)
    }

    /// Create a boxed backend from the resolved backend ID and parameters
    pub fn create_backend(&self) -> anyhow::Result<Box<dyn HeBackend>> {
        create_backend_from_id(self.resolve_backend_id()?, self.params()?)
    }
}

pub fn create_backend_from_id(
    backend_id: BackendId,
    params: EncryptionParams,
) -> anyhow::Result<Box<dyn HeBackend>> {
    match backend_id {
        BackendId::Mock => {
            tracing::warn!("Using the mock HE backend: ciphertexts are NOT confidential");
            Ok(Box::new(MockBackend::new(params)))
        }
        other => anyhow::bail!("Backend {other} is not yet implemented"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(backend: Option<&str>, degree: Option<usize>) -> Context {
        Context {
            json_output: false,
            key_dir_override: Some(PathBuf::from("/tmp/k")),
            cache_dir_override: Some(PathBuf::from("/tmp/c")),
            poly_degree_override: degree,
            backend_override: backend.map(String::from),
        }
    }

    #[test]
    fn test_overrides_win() {
        let ctx = ctx(Some("mock"), Some(4096));
        assert_eq!(ctx.key_dir().unwrap(), PathBuf::from("/tmp/k"));
        assert_eq!(ctx.cache_dir().unwrap(), PathBuf::from("/tmp/c"));
        assert_eq!(ctx.params().unwrap().slot_count(), 2048);
        assert_eq!(ctx.create_backend().unwrap().backend_id(), BackendId::Mock);
    }

    #[test]
    fn test_rejected_choices() {
        assert!(ctx(Some("mock"), Some(16384)).params().is_err());
        assert!(ctx(Some("seal"), Some(4096)).create_backend().is_err());
        assert!(ctx(Some("paillier"), Some(4096)).resolve_backend_id().is_err());
    }
}
