//! Text armor for key files and ciphertexts on the wire
//!
//! Artifacts are stored as bare standard base64 over the provider's canonical
//! bytes. There are no BEGIN/END lines or headers; a reader only tolerates
//! surrounding whitespace.

use crate::error::CoreResult;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

/// Kinds of armored artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmorType {
    PublicKey,
    SecretKey,
    GaloisKeys,
    SingleStepGaloisKeys,
    RelinKeys,
    Ciphertext,
}

impl ArmorType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::PublicKey => "public key",
            Self::SecretKey => "secret key",
            Self::GaloisKeys => "Galois keys",
            Self::SingleStepGaloisKeys => "single-step Galois key",
            Self::RelinKeys => "relinearization key",
            Self::Ciphertext => "ciphertext",
        }
    }
}

/// Encode bytes as armored text
pub fn armor(payload: &[u8]) -> String {
    BASE64.encode(payload)
}

/// Decode armored text
pub fn dearmor(text: &str) -> CoreResult<Vec<u8>> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(BASE64.decode(cleaned)?)
}
