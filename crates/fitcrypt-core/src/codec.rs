//! Client-side encode/encrypt and decrypt/decode

use crate::armor::{armor, dearmor};
use crate::error::{CoreError, CoreResult};
use crate::he::{Ciphertext, HeBackend, PublicKey, SecretKey};
use crate::keys::KeyBundle;
use crate::params::EncryptionParams;
use tracing::debug;

/// Armored form of a ciphertext as sent over the wire
pub fn ciphertext_to_wire(ciphertext: &Ciphertext) -> String {
    armor(&ciphertext.to_bytes())
}

pub fn ciphertext_from_wire(text: &str, params: &EncryptionParams) -> CoreResult<Ciphertext> {
    Ok(Ciphertext::from_bytes(&dearmor(text)?, params)?)
}

pub struct ClientCodec<'a> {
    backend: &'a dyn HeBackend,
    public: &'a PublicKey,
    secret: &'a SecretKey,
}

impl<'a> ClientCodec<'a> {
    pub fn new(backend: &'a dyn HeBackend, bundle: &'a KeyBundle) -> Self {
        Self {
            backend,
            public: &bundle.public,
            secret: &bundle.secret,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.backend.params().slot_count()
    }

    /// Encrypt at the top-level scale, padding with zeros or truncating to the slot count
    pub fn encrypt(&self, values: &[f64]) -> CoreResult<Ciphertext> {
        let params = self.backend.params();
        let slots = params.slot_count();
        if values.len() > slots {
            debug!(len = values.len(), slots, "Truncating input vector");
        }
        let values = &values[..values.len().min(slots)];

        let plaintext = self
            .backend
            .encode(values, params.scale(), params.top_level())?;
        Ok(self.backend.encrypt(self.public, &plaintext)?)
    }

    /// Decrypt and decode; values carry approximation error
    pub fn decrypt(&self, ciphertext: &Ciphertext) -> CoreResult<Vec<f64>> {
        if ciphertext.slot_count() != self.slot_count() {
            return Err(CoreError::DimensionMismatch {
                expected: self.slot_count(),
                found: ciphertext.slot_count(),
            });
        }
        let plaintext = self.backend.decrypt(self.secret, ciphertext)?;
        Ok(self.backend.decode(&plaintext)?)
    }

    pub fn encrypt_to_wire(&self, values: &[f64]) -> CoreResult<String> {
        Ok(ciphertext_to_wire(&self.encrypt(values)?))
    }

    pub fn decrypt_wire(&self, text: &str) -> CoreResult<Vec<f64>> {
        self.decrypt(&ciphertext_from_wire(text, self.backend.params())?)
    }
}
