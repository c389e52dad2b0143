//! Integration tests for LocalKeyCache

use fitcrypt_core::he::backends::MockBackend;
use fitcrypt_core::{EncryptionParams, KeyBundle, KeyPaths, generate_keys};
use fitcrypt_storage::{
    EvaluationKeyStore, LocalKeyCache, StorageError, StoredKeys, fetch, publish,
};
use tempfile::TempDir;

fn client() -> (TempDir, MockBackend, KeyBundle) {
    let dir = TempDir::new().unwrap();
    let backend = MockBackend::new(EncryptionParams::new(64).unwrap());
    let bundle = generate_keys(&backend, &KeyPaths::in_dir(dir.path())).unwrap();
    (dir, backend, bundle)
}

#[tokio::test]
async fn test_local_roundtrip() {
    let temp = TempDir::new().unwrap();
    let cache = LocalKeyCache::new(temp.path()).await.unwrap();
    let (_dir, backend, bundle) = client();

    let id = publish(&cache, bundle.evaluation_keys()).await.unwrap();
    assert!(cache.exists(&id).await.unwrap());

    let keys = fetch(&cache, &backend, &id).await.unwrap();
    assert_eq!(keys.key_id(), bundle.key_id());
}

#[tokio::test]
async fn test_local_layout() {
    let temp = TempDir::new().unwrap();
    let cache = LocalKeyCache::new(temp.path()).await.unwrap();
    let (_dir, _backend, bundle) = client();

    let id = publish(&cache, bundle.evaluation_keys()).await.unwrap();
    let entry = temp.path().join("keys").join(id.to_base58());
    for name in ["galKey", "galSingleStepKey", "relinKey"] {
        assert!(entry.join(name).is_file(), "{name} missing");
    }
}

#[tokio::test]
async fn test_local_persistence() {
    let temp = TempDir::new().unwrap();
    let (_dir, backend, bundle) = client();

    let id = {
        let cache = LocalKeyCache::new(temp.path()).await.unwrap();
        publish(&cache, bundle.evaluation_keys()).await.unwrap()
    };

    let cache = LocalKeyCache::new(temp.path()).await.unwrap();
    assert_eq!(cache.list().await.unwrap(), vec![id]);
    assert!(fetch(&cache, &backend, &id).await.is_ok());
}

#[tokio::test]
async fn test_local_not_found() {
    let temp = TempDir::new().unwrap();
    let cache = LocalKeyCache::new(temp.path()).await.unwrap();
    let (_dir, _backend, bundle) = client();

    let result = cache.get(&bundle.key_id()).await;
    assert!(matches!(result, Err(StorageError::NotFound(_))));
}

#[tokio::test]
async fn test_local_partial_entry_is_not_served() {
    let temp = TempDir::new().unwrap();
    let cache = LocalKeyCache::new(temp.path()).await.unwrap();
    let (_dir, _backend, bundle) = client();

    let id = publish(&cache, bundle.evaluation_keys()).await.unwrap();
    let entry = temp.path().join("keys").join(id.to_base58());
    std::fs::remove_file(entry.join("relinKey")).unwrap();

    assert!(!cache.exists(&id).await.unwrap());
    assert!(matches!(
        cache.get(&id).await,
        Err(StorageError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_local_corrupt_entry_fails_to_open() {
    let temp = TempDir::new().unwrap();
    let cache = LocalKeyCache::new(temp.path()).await.unwrap();
    let (_dir, backend, bundle) = client();

    let id = bundle.key_id();
    let mut stored = StoredKeys::from_evaluation(bundle.evaluation_keys());
    stored.relin = "!!".into();
    cache.put(&id, &stored).await.unwrap();

    assert!(matches!(
        fetch(&cache, &backend, &id).await,
        Err(StorageError::Core(_))
    ));
}

#[tokio::test]
async fn test_local_delete_idempotent() {
    let temp = TempDir::new().unwrap();
    let cache = LocalKeyCache::new(temp.path()).await.unwrap();
    let (_dir, _backend, bundle) = client();
    let id = bundle.key_id();

    cache.delete(&id).await.unwrap();
    publish(&cache, bundle.evaluation_keys()).await.unwrap();
    cache.delete(&id).await.unwrap();
    assert!(!cache.exists(&id).await.unwrap());
    assert!(cache.list().await.unwrap().is_empty());
    cache.delete(&id).await.unwrap();
}

#[tokio::test]
async fn test_local_list_skips_foreign_names() {
    let temp = TempDir::new().unwrap();
    let cache = LocalKeyCache::new(temp.path()).await.unwrap();
    std::fs::create_dir(temp.path().join("keys").join("not-a-key-id")).unwrap();

    assert!(cache.list().await.unwrap().is_empty());
}
