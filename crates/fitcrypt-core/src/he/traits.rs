use super::{BackendId, Ciphertext, GaloisKeys, KeyPair, Plaintext, PublicKey, RelinKeys, SecretKey};
use crate::error::HeResult;
use crate::params::EncryptionParams;

/// Leveled approximate-arithmetic HE provider.
///
/// Implementations own the ring arithmetic. Callers only sequence these
/// primitives and are responsible for keeping operands aligned: additions
/// and subtractions require identical scale and level, multiplications an
/// identical level, and rotation and multiplication size-2 (relinearized)
/// ciphertexts.
pub trait HeBackend: Send + Sync {
    /// Backend identifier
    fn backend_id(&self) -> BackendId;

    /// Human-readable name
    fn name(&self) -> &'static str;

    /// Parameter set every artifact of this backend is bound to
    fn params(&self) -> &EncryptionParams;

    fn generate_keypair(&self) -> HeResult<KeyPair>;

    /// Rotation keys for exactly the given power-of-two steps
    fn generate_galois_keys(
        &self,
        secret: &SecretKey,
        steps: &[usize],
        decomposition_bits: u8,
    ) -> HeResult<GaloisKeys>;

    fn generate_relin_keys(&self, secret: &SecretKey, decomposition_bits: u8)
    -> HeResult<RelinKeys>;

    /// Encode up to `slot_count` values; missing lanes are zero
    fn encode(&self, values: &[f64], scale: f64, level: usize) -> HeResult<Plaintext>;

    fn decode(&self, plaintext: &Plaintext) -> HeResult<Vec<f64>>;

    fn encrypt(&self, public: &PublicKey, plaintext: &Plaintext) -> HeResult<Ciphertext>;

    fn decrypt(&self, secret: &SecretKey, ciphertext: &Ciphertext) -> HeResult<Plaintext>;

    fn add(&self, a: &Ciphertext, b: &Ciphertext) -> HeResult<Ciphertext>;

    fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> HeResult<Ciphertext>;

    fn add_plain(&self, a: &Ciphertext, b: &Plaintext) -> HeResult<Ciphertext>;

    /// Ciphertext product; output has size 3 and scale `a.scale * b.scale`
    fn multiply(&self, a: &Ciphertext, b: &Ciphertext) -> HeResult<Ciphertext>;

    fn multiply_plain(&self, a: &Ciphertext, b: &Plaintext) -> HeResult<Ciphertext>;

    fn square(&self, a: &Ciphertext) -> HeResult<Ciphertext>;

    fn relinearize(&self, a: &Ciphertext, keys: &RelinKeys) -> HeResult<Ciphertext>;

    /// Drop the top modulus and divide the scale by it
    fn rescale(&self, a: &Ciphertext) -> HeResult<Ciphertext>;

    /// Drop the top modulus, scale unchanged
    fn mod_switch(&self, a: &Ciphertext) -> HeResult<Ciphertext>;

    /// Plaintext variant of [`HeBackend::mod_switch`]
    fn mod_switch_plain(&self, a: &Plaintext) -> HeResult<Plaintext>;

    /// Cyclic left rotation: lane `i` of the output holds lane `i + step` of the input
    fn rotate(&self, a: &Ciphertext, step: usize, keys: &GaloisKeys) -> HeResult<Ciphertext>;
}

/// Lets callers pick a provider at runtime and still use the generic
/// circuit.
impl<T: HeBackend + ?Sized> HeBackend for Box<T> {
    fn backend_id(&self) -> BackendId {
        (**self).backend_id()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn params(&self) -> &EncryptionParams {
        (**self).params()
    }

    fn generate_keypair(&self) -> HeResult<KeyPair> {
        (**self).generate_keypair()
    }

    fn generate_galois_keys(
        &self,
        secret: &SecretKey,
        steps: &[usize],
        decomposition_bits: u8,
    ) -> HeResult<GaloisKeys> {
        (**self).generate_galois_keys(secret, steps, decomposition_bits)
    }

    fn generate_relin_keys(&self, secret: &SecretKey, decomposition_bits: u8)
    -> HeResult<RelinKeys> {
        (**self).generate_relin_keys(secret, decomposition_bits)
    }

    fn encode(&self, values: &[f64], scale: f64, level: usize) -> HeResult<Plaintext> {
        (**self).encode(values, scale, level)
    }

    fn decode(&self, plaintext: &Plaintext) -> HeResult<Vec<f64>> {
        (**self).decode(plaintext)
    }

    fn encrypt(&self, public: &PublicKey, plaintext: &Plaintext) -> HeResult<Ciphertext> {
        (**self).encrypt(public, plaintext)
    }

    fn decrypt(&self, secret: &SecretKey, ciphertext: &Ciphertext) -> HeResult<Plaintext> {
        (**self).decrypt(secret, ciphertext)
    }

    fn add(&self, a: &Ciphertext, b: &Ciphertext) -> HeResult<Ciphertext> {
        (**self).add(a, b)
    }

    fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> HeResult<Ciphertext> {
        (**self).sub(a, b)
    }

    fn add_plain(&self, a: &Ciphertext, b: &Plaintext) -> HeResult<Ciphertext> {
        (**self).add_plain(a, b)
    }

    fn multiply(&self, a: &Ciphertext, b: &Ciphertext) -> HeResult<Ciphertext> {
        (**self).multiply(a, b)
    }

    fn multiply_plain(&self, a: &Ciphertext, b: &Plaintext) -> HeResult<Ciphertext> {
        (**self).multiply_plain(a, b)
    }

    fn square(&self, a: &Ciphertext) -> HeResult<Ciphertext> {
        (**self).square(a)
    }

    fn relinearize(&self, a: &Ciphertext, keys: &RelinKeys) -> HeResult<Ciphertext> {
        (**self).relinearize(a, keys)
    }

    fn rescale(&self, a: &Ciphertext) -> HeResult<Ciphertext> {
        (**self).rescale(a)
    }

    fn mod_switch(&self, a: &Ciphertext) -> HeResult<Ciphertext> {
        (**self).mod_switch(a)
    }

    fn mod_switch_plain(&self, a: &Plaintext) -> HeResult<Plaintext> {
        (**self).mod_switch_plain(a)
    }

    fn rotate(&self, a: &Ciphertext, step: usize, keys: &GaloisKeys) -> HeResult<Ciphertext> {
        (**self).rotate(a, step, keys)
    }
}
