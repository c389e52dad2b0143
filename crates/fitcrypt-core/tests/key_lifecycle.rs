//! Key generation, persistence and all-or-nothing loading

use fitcrypt_core::he::backends::MockBackend;
use fitcrypt_core::*;
use rand::Rng;

fn backend(degree: usize) -> MockBackend {
    MockBackend::new(EncryptionParams::new(degree).unwrap())
}

fn assert_roundtrip(backend: &MockBackend, bundle: &KeyBundle, values: &[f64]) {
    let codec = ClientCodec::new(backend, bundle);
    let out = codec.decrypt(&codec.encrypt(values).unwrap()).unwrap();
    for (a, b) in values.iter().zip(&out) {
        assert!((a - b).abs() < 1e-4, "{a} vs {b}");
    }
}

#[test]
fn test_generate_then_load_is_equivalent() {
    let dir = tempfile::tempdir().unwrap();
    let paths = KeyPaths::in_dir(dir.path());
    let backend = backend(64);
    let slots = backend.params().slot_count();

    let generated = generate_keys(&backend, &paths).unwrap();
    let loaded = load_keys(&backend, &paths).unwrap();
    assert_eq!(loaded.key_id(), generated.key_id());

    let mut rng = rand::thread_rng();
    let random: Vec<f64> = (0..slots).map(|_| rng.gen_range(-1000.0..1000.0)).collect();
    for values in [vec![0.0; slots], vec![1.0; slots], random] {
        assert_roundtrip(&backend, &loaded, &values);
    }

    // A ciphertext made before the reload still opens with the loaded secret
    let before = ClientCodec::new(&backend, &generated).encrypt(&[7.0]).unwrap();
    let opened = ClientCodec::new(&backend, &loaded).decrypt(&before).unwrap();
    assert!((opened[0] - 7.0).abs() < 1e-4);
}

#[test]
fn test_missing_artifact_fails_whole_load() {
    let dir = tempfile::tempdir().unwrap();
    let paths = KeyPaths::in_dir(dir.path());
    let backend = backend(64);
    generate_keys(&backend, &paths).unwrap();

    std::fs::remove_file(&paths.single_step_galois_keys).unwrap();
    let err = load_keys(&backend, &paths).err().unwrap();
    assert!(matches!(err, CoreError::KeyLoad { .. }));
}

#[test]
fn test_load_or_generate_regenerates_everything() {
    let dir = tempfile::tempdir().unwrap();
    let paths = KeyPaths::in_dir(dir.path());
    let backend = backend(64);

    let (first, source) = load_or_generate(&backend, &paths).unwrap();
    assert_eq!(source, KeySource::Generated);
    let old = ClientCodec::new(&backend, &first).encrypt(&[1.0]).unwrap();

    let (again, source) = load_or_generate(&backend, &paths).unwrap();
    assert_eq!(source, KeySource::Loaded);
    assert_eq!(again.key_id(), first.key_id());

    std::fs::write(&paths.relin_keys, "not armor at all !!").unwrap();
    let (fresh, source) = load_or_generate(&backend, &paths).unwrap();
    assert_eq!(source, KeySource::Generated);
    assert_ne!(fresh.key_id(), first.key_id());

    // Old ciphertexts are lost with the old secret
    assert!(ClientCodec::new(&backend, &fresh).decrypt(&old).is_err());
    // And every file on disk now belongs to the new bundle
    assert_eq!(load_keys(&backend, &paths).unwrap().key_id(), fresh.key_id());
}

#[test]
fn test_mixed_generations_are_rejected() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let paths_a = KeyPaths::in_dir(dir_a.path());
    let paths_b = KeyPaths::in_dir(dir_b.path());
    let backend = backend(64);

    generate_keys(&backend, &paths_a).unwrap();
    generate_keys(&backend, &paths_b).unwrap();
    std::fs::copy(&paths_b.galois_keys, &paths_a.galois_keys).unwrap();

    assert!(matches!(
        load_keys(&backend, &paths_a),
        Err(CoreError::KeyLoad { .. })
    ));
    assert!(load_evaluation_keys(&backend, &paths_a).is_err());
}

#[test]
fn test_server_loads_without_secret() {
    let dir = tempfile::tempdir().unwrap();
    let paths = KeyPaths::in_dir(dir.path());
    let backend = backend(64);
    let bundle = generate_keys(&backend, &paths).unwrap();

    std::fs::remove_file(&paths.secret_key).unwrap();
    let eval = load_evaluation_keys(&backend, &paths).unwrap();
    assert_eq!(eval.key_id(), bundle.key_id());
    assert!(load_keys(&backend, &paths).is_err());
}

#[test]
fn test_keys_for_other_parameters_do_not_load() {
    let dir = tempfile::tempdir().unwrap();
    let paths = KeyPaths::in_dir(dir.path());
    generate_keys(&backend(64), &paths).unwrap();

    assert!(matches!(
        load_keys(&backend(128), &paths),
        Err(CoreError::KeyLoad { .. })
    ));
}

#[test]
fn test_insecure_degree_fails_before_any_key() {
    let dir = tempfile::tempdir().unwrap();
    let err = EncryptionParams::new(16384).unwrap_err();
    assert!(matches!(err, CoreError::Parameter(_)));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_key_files_are_plain_base64() {
    let dir = tempfile::tempdir().unwrap();
    let paths = KeyPaths::in_dir(dir.path());
    generate_keys(&backend(64), &paths).unwrap();

    for (_, path) in paths.all() {
        let text = std::fs::read_to_string(path).unwrap();
        assert!(!text.is_empty());
        assert!(
            text.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=')
        );
    }
}
