//! Codec and wire-format round trips

use fitcrypt_core::he::backends::MockBackend;
use fitcrypt_core::*;

fn setup() -> (tempfile::TempDir, MockBackend, KeyBundle) {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockBackend::new(EncryptionParams::new(64).unwrap());
    let bundle = generate_keys(&backend, &KeyPaths::in_dir(dir.path())).unwrap();
    (dir, backend, bundle)
}

#[test]
fn test_short_vectors_are_zero_padded() {
    let (_dir, backend, bundle) = setup();
    let codec = ClientCodec::new(&backend, &bundle);

    let out = codec.decrypt(&codec.encrypt(&[4.0, -4.0]).unwrap()).unwrap();
    assert_eq!(out.len(), 32);
    assert!((out[1] + 4.0).abs() < 1e-4);
    assert!(out[2..].iter().all(|v| v.abs() < 1e-4));
}

#[test]
fn test_long_vectors_are_truncated() {
    let (_dir, backend, bundle) = setup();
    let codec = ClientCodec::new(&backend, &bundle);
    let values: Vec<f64> = (0..40).map(f64::from).collect();

    let out = codec.decrypt(&codec.encrypt(&values).unwrap()).unwrap();
    assert_eq!(out.len(), 32);
    assert!((out[31] - 31.0).abs() < 1e-4);
}

#[test]
fn test_wire_roundtrip() {
    let (_dir, backend, bundle) = setup();
    let codec = ClientCodec::new(&backend, &bundle);

    let text = codec.encrypt_to_wire(&[1.25, 2.5]).unwrap();
    let ct = ciphertext_from_wire(&text, backend.params()).unwrap();
    assert_eq!(ct.level(), backend.params().top_level());
    assert_eq!(ct.key_id(), bundle.key_id());

    let out = codec.decrypt_wire(&text).unwrap();
    assert!((out[0] - 1.25).abs() < 1e-4);
    assert!((out[1] - 2.5).abs() < 1e-4);
}

#[test]
fn test_wire_from_other_parameters_is_rejected() {
    let (_dir, backend, bundle) = setup();
    let codec = ClientCodec::new(&backend, &bundle);
    let text = codec.encrypt_to_wire(&[1.0]).unwrap();

    let other = EncryptionParams::new(128).unwrap();
    assert!(ciphertext_from_wire(&text, &other).is_err());
    assert!(matches!(
        ciphertext_from_wire("@@@", backend.params()),
        Err(CoreError::Armor(_))
    ));
}

#[test]
fn test_circuit_wire_add() {
    let (_dir, backend, bundle) = setup();
    let codec = ClientCodec::new(&backend, &bundle);
    let mut circuit = StatsCircuit::new(
        MockBackend::new(EncryptionParams::new(64).unwrap()),
        bundle.evaluation_keys().clone(),
    )
    .unwrap();

    let sum = circuit
        .add_ciphers_wire(
            &codec.encrypt_to_wire(&[1.0, 2.0]).unwrap(),
            &codec.encrypt_to_wire(&[0.5, 0.25]).unwrap(),
        )
        .unwrap();
    let out = codec.decrypt_wire(&sum).unwrap();
    assert!((out[0] - 1.5).abs() < 1e-4);
    assert!((out[1] - 2.25).abs() < 1e-4);
}
