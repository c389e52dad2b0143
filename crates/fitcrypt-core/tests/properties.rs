//! Property-based tests for the codec and provider
//!
//! These validate approximate semantics, never byte equality: every
//! encryption draws fresh noise.

use fitcrypt_core::he::backends::MockBackend;
use fitcrypt_core::*;
use proptest::prelude::*;
use std::sync::OnceLock;

const EPS: f64 = 1e-4;

struct Shared {
    _dir: tempfile::TempDir,
    backend: MockBackend,
    bundle: KeyBundle,
}

fn shared() -> &'static Shared {
    static SHARED: OnceLock<Shared> = OnceLock::new();
    SHARED.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::new(EncryptionParams::new(64).unwrap());
        let bundle = generate_keys(&backend, &KeyPaths::in_dir(dir.path())).unwrap();
        Shared {
            _dir: dir,
            backend,
            bundle,
        }
    })
}

proptest! {
    /// Property: decrypt(encrypt(v)) ≈ v
    #[test]
    fn prop_encrypt_decrypt_roundtrip(values in prop::collection::vec(-1000.0f64..1000.0, 0..=32)) {
        let s = shared();
        let codec = ClientCodec::new(&s.backend, &s.bundle);
        let out = codec.decrypt(&codec.encrypt(&values).unwrap()).unwrap();

        for (i, v) in values.iter().enumerate() {
            prop_assert!((out[i] - v).abs() < EPS);
        }
        for v in &out[values.len()..] {
            prop_assert!(v.abs() < EPS);
        }
    }

    /// Property: decrypt(add(encrypt(a), encrypt(b))) ≈ a + b
    #[test]
    fn prop_add_is_homomorphic(
        a in prop::collection::vec(-1000.0f64..1000.0, 32),
        b in prop::collection::vec(-1000.0f64..1000.0, 32),
    ) {
        let s = shared();
        let codec = ClientCodec::new(&s.backend, &s.bundle);
        let sum = s
            .backend
            .add(&codec.encrypt(&a).unwrap(), &codec.encrypt(&b).unwrap())
            .unwrap();
        let out = codec.decrypt(&sum).unwrap();

        for i in 0..32 {
            prop_assert!((out[i] - (a[i] + b[i])).abs() < EPS);
        }
    }

    /// Property: rotate(rotate(v, k), n - k) ≈ v
    #[test]
    fn prop_rotation_complement(
        values in prop::collection::vec(-1000.0f64..1000.0, 32),
        k in 1usize..32,
    ) {
        let s = shared();
        let codec = ClientCodec::new(&s.backend, &s.bundle);
        let galois = &s.bundle.evaluation_keys().galois;

        let ct = codec.encrypt(&values).unwrap();
        let once = s.backend.rotate(&ct, k, galois).unwrap();
        let back = s.backend.rotate(&once, 32 - k, galois).unwrap();
        let out = codec.decrypt(&back).unwrap();

        for i in 0..32 {
            prop_assert!((out[i] - values[i]).abs() < EPS);
        }
        let shifted = codec.decrypt(&once).unwrap();
        prop_assert!((shifted[0] - values[k]).abs() < EPS);
    }
}
