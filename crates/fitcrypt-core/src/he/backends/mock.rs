//! Mock HE backend for testing
//!
//! NOT SECURE - slot values are stored in the clear inside the ciphertext.
//! Tracks scale, level and size exactly like a CKKS provider and rejects every
//! call a real provider would reject, so circuits can be exercised quickly.

use crate::error::{HeError, HeResult};
use crate::he::*;
use crate::params::EncryptionParams;
use rand::{RngCore, rngs::OsRng};
use rand_distr::{Distribution, Normal};

/// Standard deviation of the error distribution in coefficient units
const ERROR_STD_DEV: f64 = 3.2;

pub struct MockBackend {
    params: EncryptionParams,
}

impl MockBackend {
    pub fn new(params: EncryptionParams) -> Self {
        Self { params }
    }

    fn slots(&self) -> usize {
        self.params.slot_count()
    }

    fn pack(values: &[f64]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn unpack(&self, bytes: &[u8]) -> HeResult<Vec<f64>> {
        if bytes.len() != self.slots() * 8 {
            return Err(HeError::Deserialization(format!(
                "Mock payload has {} bytes, expected {}",
                bytes.len(),
                self.slots() * 8
            )));
        }
        Ok(bytes
            .chunks_exact(8)
            .map(|chunk| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                f64::from_le_bytes(raw)
            })
            .collect())
    }

    fn check_backend(&self, backend: BackendId) -> HeResult<()> {
        if backend != BackendId::Mock {
            return Err(HeError::BackendUnavailable(format!(
                "Mock backend cannot operate on {backend} artifacts"
            )));
        }
        Ok(())
    }

    fn check_slots(&self, slot_count: usize) -> HeResult<()> {
        if slot_count != self.slots() {
            return Err(HeError::SlotMismatch {
                left: slot_count,
                right: self.slots(),
            });
        }
        Ok(())
    }

    fn check_ct(&self, ct: &Ciphertext) -> HeResult<Vec<f64>> {
        self.check_backend(ct.backend)?;
        self.check_slots(ct.slot_count)?;
        self.unpack(&ct.bytes)
    }

    fn check_pt(&self, pt: &Plaintext) -> HeResult<Vec<f64>> {
        self.check_backend(pt.backend)?;
        self.check_slots(pt.slot_count)?;
        self.unpack(&pt.bytes)
    }

    fn check_same_key(a: KeyId, b: KeyId) -> HeResult<()> {
        if a != b {
            return Err(HeError::KeyMismatch(format!(
                "operands encrypted under different keys ({a} vs {b})"
            )));
        }
        Ok(())
    }

    fn check_level(left: usize, right: usize) -> HeResult<()> {
        if left != right {
            return Err(HeError::LevelMismatch { left, right });
        }
        Ok(())
    }

    #[allow(clippy::float_cmp)]
    fn check_scale(left: f64, right: f64) -> HeResult<()> {
        if left != right {
            return Err(HeError::ScaleMismatch { left, right });
        }
        Ok(())
    }

    fn check_relinearized(ct: &Ciphertext) -> HeResult<()> {
        if ct.size != 2 {
            return Err(HeError::NotRelinearized(ct.size));
        }
        Ok(())
    }

    fn derive(&self, secret: &SecretKey, label: &str, extra: &[u8]) -> Vec<u8> {
        let mut hasher = blake3::Hasher::new_derive_key(label);
        hasher.update(&secret.bytes);
        hasher.update(extra);
        hasher.finalize().as_bytes().to_vec()
    }

    fn with_values(&self, template: &Ciphertext, values: &[f64]) -> Ciphertext {
        Ciphertext {
            bytes: Self::pack(values),
            ..template.clone()
        }
    }

    fn zip_with(
        &self,
        a: &Ciphertext,
        b: &Ciphertext,
        op: impl Fn(f64, f64) -> f64,
    ) -> HeResult<Ciphertext> {
        let left = self.check_ct(a)?;
        let right = self.check_ct(b)?;
        Self::check_same_key(a.key_id, b.key_id)?;
        Self::check_level(a.level, b.level)?;
        Self::check_scale(a.scale, b.scale)?;

        let values: Vec<f64> = left.iter().zip(&right).map(|(x, y)| op(*x, *y)).collect();
        let mut out = self.with_values(a, &values);
        out.size = a.size.max(b.size);
        Ok(out)
    }

    fn product(&self, a: &Ciphertext, b: &Ciphertext) -> HeResult<Ciphertext> {
        let left = self.check_ct(a)?;
        let right = self.check_ct(b)?;
        Self::check_same_key(a.key_id, b.key_id)?;
        Self::check_relinearized(a)?;
        Self::check_relinearized(b)?;
        Self::check_level(a.level, b.level)?;

        let scale = a.scale * b.scale;
        self.params.check_scale(scale, a.level)?;

        let values: Vec<f64> = left.iter().zip(&right).map(|(x, y)| x * y).collect();
        let mut out = self.with_values(a, &values);
        out.scale = scale;
        out.size = 3;
        Ok(out)
    }
}

impl HeBackend for MockBackend {
    fn backend_id(&self) -> BackendId {
        BackendId::Mock
    }

    fn name(&self) -> &'static str {
        "Mock (TESTING ONLY)"
    }

    fn params(&self) -> &EncryptionParams {
        &self.params
    }

    fn generate_keypair(&self) -> HeResult<KeyPair> {
        let mut secret_bytes = vec![0u8; 32];
        OsRng.fill_bytes(&mut secret_bytes);
        let public_bytes = blake3::hash(&secret_bytes).as_bytes().to_vec();
        let key_id = KeyId::of(&public_bytes);
        let parms_id = self.params.parms_id();

        Ok(KeyPair {
            public: PublicKey::new(BackendId::Mock, parms_id, public_bytes),
            secret: SecretKey::new(BackendId::Mock, parms_id, key_id, secret_bytes),
        })
    }

    fn generate_galois_keys(
        &self,
        secret: &SecretKey,
        steps: &[usize],
        decomposition_bits: u8,
    ) -> HeResult<GaloisKeys> {
        self.check_backend(secret.backend)?;
        if let Some(bad) = steps
            .iter()
            .find(|s| !s.is_power_of_two() || **s >= self.slots())
        {
            return Err(HeError::Encoding(format!(
                "Galois key step {bad} is not a power of two below {}",
                self.slots()
            )));
        }

        let mut extra = vec![decomposition_bits];
        for step in steps {
            extra.extend((*step as u32).to_le_bytes());
        }
        Ok(GaloisKeys::new(
            BackendId::Mock,
            self.params.parms_id(),
            secret.key_id,
            decomposition_bits,
            steps.to_vec(),
            self.derive(secret, "fitcrypt mock galois keys", &extra),
        ))
    }

    fn generate_relin_keys(
        &self,
        secret: &SecretKey,
        decomposition_bits: u8,
    ) -> HeResult<RelinKeys> {
        self.check_backend(secret.backend)?;
        Ok(RelinKeys::new(
            BackendId::Mock,
            self.params.parms_id(),
            secret.key_id,
            decomposition_bits,
            self.derive(secret, "fitcrypt mock relin keys", &[decomposition_bits]),
        ))
    }

    fn encode(&self, values: &[f64], scale: f64, level: usize) -> HeResult<Plaintext> {
        if values.len() > self.slots() {
            return Err(HeError::Encoding(format!(
                "{} values do not fit in {} slots",
                values.len(),
                self.slots()
            )));
        }
        if level > self.params.top_level() {
            return Err(HeError::LevelExhausted(level));
        }
        self.params.check_scale(scale, level)?;
        if let Some(v) = values.iter().find(|v| !v.is_finite()) {
            return Err(HeError::Encoding(format!("cannot encode non-finite value {v}")));
        }

        let mut quantized: Vec<f64> = values.iter().map(|v| (v * scale).round() / scale).collect();
        quantized.resize(self.slots(), 0.0);

        Ok(Plaintext::new(
            BackendId::Mock,
            self.slots(),
            scale,
            level,
            Self::pack(&quantized),
        ))
    }

    fn decode(&self, plaintext: &Plaintext) -> HeResult<Vec<f64>> {
        self.check_pt(plaintext)
    }

    fn encrypt(&self, public: &PublicKey, plaintext: &Plaintext) -> HeResult<Ciphertext> {
        self.check_backend(public.backend)?;
        let values = self.check_pt(plaintext)?;

        let sigma = ERROR_STD_DEV * (self.params.poly_modulus_degree() as f64).sqrt()
            / plaintext.scale;
        let noise = Normal::new(0.0, sigma).map_err(|e| HeError::Encoding(e.to_string()))?;
        let noisy: Vec<f64> = values
            .iter()
            .map(|v| v + noise.sample(&mut OsRng))
            .collect();

        Ok(Ciphertext::new(
            BackendId::Mock,
            self.params.parms_id(),
            public.key_id(),
            self.slots(),
            plaintext.scale,
            plaintext.level,
            2,
            Self::pack(&noisy),
        ))
    }

    fn decrypt(&self, secret: &SecretKey, ciphertext: &Ciphertext) -> HeResult<Plaintext> {
        self.check_backend(secret.backend)?;
        let values = self.check_ct(ciphertext)?;
        if secret.key_id != ciphertext.key_id {
            return Err(HeError::KeyMismatch(format!(
                "ciphertext was encrypted under {}, secret key belongs to {}",
                ciphertext.key_id, secret.key_id
            )));
        }

        Ok(Plaintext::new(
            BackendId::Mock,
            self.slots(),
            ciphertext.scale,
            ciphertext.level,
            Self::pack(&values),
        ))
    }

    fn add(&self, a: &Ciphertext, b: &Ciphertext) -> HeResult<Ciphertext> {
        self.zip_with(a, b, |x, y| x + y)
    }

    fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> HeResult<Ciphertext> {
        self.zip_with(a, b, |x, y| x - y)
    }

    fn add_plain(&self, a: &Ciphertext, b: &Plaintext) -> HeResult<Ciphertext> {
        let left = self.check_ct(a)?;
        let right = self.check_pt(b)?;
        Self::check_level(a.level, b.level)?;
        Self::check_scale(a.scale, b.scale)?;

        let values: Vec<f64> = left.iter().zip(&right).map(|(x, y)| x + y).collect();
        Ok(self.with_values(a, &values))
    }

    fn multiply(&self, a: &Ciphertext, b: &Ciphertext) -> HeResult<Ciphertext> {
        self.product(a, b)
    }

    fn multiply_plain(&self, a: &Ciphertext, b: &Plaintext) -> HeResult<Ciphertext> {
        let left = self.check_ct(a)?;
        let right = self.check_pt(b)?;
        Self::check_level(a.level, b.level)?;

        let scale = a.scale * b.scale;
        self.params.check_scale(scale, a.level)?;

        let values: Vec<f64> = left.iter().zip(&right).map(|(x, y)| x * y).collect();
        let mut out = self.with_values(a, &values);
        out.scale = scale;
        Ok(out)
    }

    fn square(&self, a: &Ciphertext) -> HeResult<Ciphertext> {
        self.product(a, a)
    }

    fn relinearize(&self, a: &Ciphertext, keys: &RelinKeys) -> HeResult<Ciphertext> {
        self.check_backend(keys.backend)?;
        let values = self.check_ct(a)?;
        Self::check_same_key(a.key_id, keys.key_id)?;

        let mut out = self.with_values(a, &values);
        out.size = 2;
        Ok(out)
    }

    fn rescale(&self, a: &Ciphertext) -> HeResult<Ciphertext> {
        let values = self.check_ct(a)?;
        let (scale, level) = self.params.rescaled(a.scale, a.level)?;
        if scale < 1.0 {
            return Err(HeError::ScaleOutOfBounds {
                scale_bits: 0,
                modulus_bits: self.params.modulus_bits(level),
            });
        }

        let mut out = self.with_values(a, &values);
        out.scale = scale;
        out.level = level;
        Ok(out)
    }

    fn mod_switch(&self, a: &Ciphertext) -> HeResult<Ciphertext> {
        let values = self.check_ct(a)?;
        if a.level == 0 {
            return Err(HeError::LevelExhausted(0));
        }
        self.params.check_scale(a.scale, a.level - 1)?;

        let mut out = self.with_values(a, &values);
        out.level = a.level - 1;
        Ok(out)
    }

    fn mod_switch_plain(&self, a: &Plaintext) -> HeResult<Plaintext> {
        self.check_pt(a)?;
        if a.level == 0 {
            return Err(HeError::LevelExhausted(0));
        }
        self.params.check_scale(a.scale, a.level - 1)?;

        let mut out = a.clone();
        out.level = a.level - 1;
        Ok(out)
    }

    fn rotate(&self, a: &Ciphertext, step: usize, keys: &GaloisKeys) -> HeResult<Ciphertext> {
        self.check_backend(keys.backend)?;
        let values = self.check_ct(a)?;
        Self::check_same_key(a.key_id, keys.key_id)?;
        Self::check_relinearized(a)?;

        let slots = self.slots();
        if let Some(missing) = rotation_components(step, slots)
            .into_iter()
            .find(|component| !keys.has_step(*component))
        {
            return Err(HeError::MissingRotationKey(missing));
        }

        let shift = step % slots;
        let rotated: Vec<f64> = (0..slots).map(|i| values[(i + shift) % slots]).collect();
        Ok(self.with_values(a, &rotated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SMALL_SCALE;

    fn backend() -> MockBackend {
        MockBackend::new(EncryptionParams::new(64).unwrap())
    }

    fn fresh(backend: &MockBackend, kp: &KeyPair, values: &[f64]) -> Ciphertext {
        let params = backend.params();
        let pt = backend
            .encode(values, params.scale(), params.top_level())
            .unwrap();
        backend.encrypt(&kp.public, &pt).unwrap()
    }

    fn open(backend: &MockBackend, kp: &KeyPair, ct: &Ciphertext) -> Vec<f64> {
        let pt = backend.decrypt(&kp.secret, ct).unwrap();
        backend.decode(&pt).unwrap()
    }

    #[test]
    fn test_mock_encrypt_decrypt() {
        let backend = backend();
        let kp = backend.generate_keypair().unwrap();
        let ct = fresh(&backend, &kp, &[1.5, -2.25, 1000.0]);

        let out = open(&backend, &kp, &ct);
        assert_eq!(out.len(), 32);
        assert!((out[0] - 1.5).abs() < 1e-6);
        assert!((out[1] + 2.25).abs() < 1e-6);
        assert!((out[2] - 1000.0).abs() < 1e-6);
        assert!(out[3].abs() < 1e-6);
    }

    #[test]
    fn test_decrypt_with_other_key_fails() {
        let backend = backend();
        let alice = backend.generate_keypair().unwrap();
        let bob = backend.generate_keypair().unwrap();
        let ct = fresh(&backend, &alice, &[1.0]);

        assert!(matches!(
            backend.decrypt(&bob.secret, &ct),
            Err(HeError::KeyMismatch(_))
        ));
    }

    #[test]
    fn test_add_requires_equal_scale() {
        let backend = backend();
        let kp = backend.generate_keypair().unwrap();
        let a = fresh(&backend, &kp, &[1.0]);
        let mask = backend.encode(&[1.0], SMALL_SCALE, 3).unwrap();
        let lifted = backend.multiply_plain(&a, &mask).unwrap();

        assert!(matches!(
            backend.add(&a, &lifted),
            Err(HeError::ScaleMismatch { .. })
        ));
    }

    #[test]
    fn test_rotate_needs_relinearized_input() {
        let backend = backend();
        let kp = backend.generate_keypair().unwrap();
        let gk = backend
            .generate_galois_keys(&kp.secret, &[1], SINGLE_STEP_DECOMPOSITION_BITS)
            .unwrap();
        let a = fresh(&backend, &kp, &[1.0, 2.0]);
        let sq = backend.square(&a).unwrap();

        assert_eq!(
            backend.rotate(&sq, 1, &gk).unwrap_err(),
            HeError::NotRelinearized(3)
        );
    }

    #[test]
    fn test_rotate_with_missing_component() {
        let backend = backend();
        let kp = backend.generate_keypair().unwrap();
        let gk = backend
            .generate_galois_keys(&kp.secret, &[1], SINGLE_STEP_DECOMPOSITION_BITS)
            .unwrap();
        let a = fresh(&backend, &kp, &[1.0, 2.0, 3.0]);

        let rotated = backend.rotate(&a, 1, &gk).unwrap();
        assert!((open(&backend, &kp, &rotated)[0] - 2.0).abs() < 1e-6);
        assert_eq!(
            backend.rotate(&a, 3, &gk).unwrap_err(),
            HeError::MissingRotationKey(2)
        );
    }

    #[test]
    fn test_rescale_consumes_levels_until_exhausted() {
        let backend = backend();
        let kp = backend.generate_keypair().unwrap();
        let mut ct = fresh(&backend, &kp, &[1.0]);
        let scale = ct.scale();

        for expected in (0..3).rev() {
            ct = backend.mod_switch(&ct).unwrap();
            assert_eq!(ct.level(), expected);
            assert_eq!(ct.scale(), scale);
        }
        assert_eq!(
            backend.mod_switch(&ct).unwrap_err(),
            HeError::LevelExhausted(0)
        );
    }

    #[test]
    fn test_scale_overflow_is_rejected() {
        let backend = backend();
        let kp = backend.generate_keypair().unwrap();
        let a = fresh(&backend, &kp, &[1.0]);
        let low = backend.mod_switch(&backend.mod_switch(&a).unwrap()).unwrap();

        // 2^160 does not fit under the 119 bits left at level 1
        let sq = backend.square(&low).unwrap();
        let rl = backend
            .generate_relin_keys(&kp.secret, RELIN_DECOMPOSITION_BITS)
            .unwrap();
        let sq = backend.relinearize(&sq, &rl).unwrap();
        assert!(matches!(
            backend.square(&sq),
            Err(HeError::ScaleOutOfBounds { .. })
        ));
    }
}
