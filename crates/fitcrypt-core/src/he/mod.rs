pub mod backends;
pub mod keys;
pub mod traits;

pub use keys::{Ciphertext, GaloisKeys, KeyPair, Plaintext, PublicKey, RelinKeys, SecretKey};
pub use traits::HeBackend;

use crate::error::HeError;

/// Identifies which provider produced a key or ciphertext
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum BackendId {
    /// Microsoft SEAL CKKS through native bindings - future
    #[serde(rename = "seal")]
    Seal = 0,
    /// Mock provider for testing
    #[serde(rename = "mock")]
    Mock = 255,
}

impl std::fmt::Display for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendId::Seal => write!(f, "seal"),
            BackendId::Mock => write!(f, "mock"),
        }
    }
}

impl std::str::FromStr for BackendId {
    type Err = HeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "seal" | "ckks" => Ok(BackendId::Seal),
            "mock" | "test" => Ok(BackendId::Mock),
            other => Err(HeError::BackendUnavailable(format!("Unknown backend: {other}"))),
        }
    }
}

impl TryFrom<u8> for BackendId {
    type Error = HeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Seal),
            255 => Ok(Self::Mock),
            other => Err(HeError::Deserialization(format!("Unknown backend ID: {other}"))),
        }
    }
}

/// Digest binding every artifact of one key generation together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyId(pub [u8; 32]);

impl KeyId {
    pub fn of(public_key_bytes: &[u8]) -> Self {
        Self(*blake3::hash(public_key_bytes).as_bytes())
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    pub fn from_base58(s: &str) -> Option<Self> {
        let bytes = bs58::decode(s).into_vec().ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl std::fmt::Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_base58())
    }
}

/// Rotation steps covered by the generic Galois key set: every power of two up to half the slots
pub fn generic_rotation_steps(slot_count: usize) -> Vec<usize> {
    std::iter::successors(Some(1usize), |step| step.checked_mul(2))
        .take_while(|step| *step <= slot_count / 2)
        .collect()
}

/// Rotation steps covered by the single-step Galois key set
pub fn single_step_rotation_steps() -> Vec<usize> {
    vec![1]
}

/// Decomposition bit count for the generic Galois keys (largest supported)
pub const GENERIC_DECOMPOSITION_BITS: u8 = 60;

/// Decomposition bit count for the single-step Galois key
pub const SINGLE_STEP_DECOMPOSITION_BITS: u8 = 15;

/// Decomposition bit count for the relinearization key
pub const RELIN_DECOMPOSITION_BITS: u8 = 60;

/// Split a rotation into the power-of-two components it is applied as
pub fn rotation_components(step: usize, slot_count: usize) -> Vec<usize> {
    let step = if slot_count == 0 { 0 } else { step % slot_count };
    (0..usize::BITS)
        .map(|bit| 1usize << bit)
        .take_while(|component| *component <= step)
        .filter(|component| step & component != 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_steps_are_powers_of_two_up_to_half() {
        assert_eq!(generic_rotation_steps(64), vec![1, 2, 4, 8, 16, 32]);
    }

    #[test]
    fn test_rotation_components() {
        assert_eq!(rotation_components(5, 64), vec![1, 4]);
        assert_eq!(rotation_components(33, 64), vec![1, 32]);
        assert_eq!(rotation_components(64, 64), Vec::<usize>::new());
        assert_eq!(rotation_components(65, 64), vec![1]);
    }

    #[test]
    fn test_key_id_base58_roundtrip() {
        let id = KeyId::of(b"public key bytes");
        assert_eq!(KeyId::from_base58(&id.to_base58()), Some(id));
        assert_eq!(KeyId::from_base58("not-base58!"), None);
    }

    #[test]
    fn test_backend_id_parse() {
        assert_eq!("mock".parse::<BackendId>().unwrap(), BackendId::Mock);
        assert_eq!(BackendId::try_from(255u8).unwrap(), BackendId::Mock);
        assert!(BackendId::try_from(7u8).is_err());
    }
}
