//! Fixed CKKS-style parameter set: one 4-modulus chain, degree up to 8192

use crate::error::{CoreError, CoreResult, HeError, HeResult};

/// Coefficient modulus chain, lowest level first.
///
/// The chain is only secure up to a polynomial modulus degree of 8192.
pub const COEFF_MODULI: [u64; 4] = [
    0xffffffffffc0001, // 60 bits
    0x7fffffffffcc001, // 59 bits
    0x7fffffffffa4001, // 59 bits
    0xffffe80001,      // 40 bits
];

/// Largest polynomial modulus degree the chain is secure for
pub const MAX_POLY_MODULUS_DEGREE: usize = 8192;

/// Smallest degree that still leaves room for the circuit's lane layout
pub const MIN_POLY_MODULUS_DEGREE: usize = 16;

/// Degree used by the mobile client and the service
pub const DEFAULT_POLY_MODULUS_DEGREE: usize = 8192;

/// Encoding scale for 0/1 masks and scale lifters (2^25)
pub const SMALL_SCALE: f64 = 33_554_432.0;

/// Level of a freshly encrypted ciphertext
pub const TOP_LEVEL: usize = COEFF_MODULI.len() - 1;

/// Short digest identifying a parameter set, carried by every serialized artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParmsId(pub [u8; 8]);

impl std::fmt::Display for ParmsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncryptionParams {
    poly_modulus_degree: usize,
    parms_id: ParmsId,
}

impl EncryptionParams {
    /// Validate the degree against the fixed chain.
    ///
    /// Degrees above 8192 are insecure for this chain and rejected outright.
    pub fn new(poly_modulus_degree: usize) -> CoreResult<Self> {
        if poly_modulus_degree > MAX_POLY_MODULUS_DEGREE {
            return Err(CoreError::Parameter(format!(
                "insecure parameters: poly modulus degree {poly_modulus_degree} > {MAX_POLY_MODULUS_DEGREE}"
            )));
        }
        if poly_modulus_degree < MIN_POLY_MODULUS_DEGREE || !poly_modulus_degree.is_power_of_two()
        {
            return Err(CoreError::Parameter(format!(
                "poly modulus degree must be a power of two >= {MIN_POLY_MODULUS_DEGREE}, got {poly_modulus_degree}"
            )));
        }

        let mut hasher = blake3::Hasher::new();
        hasher.update(&(poly_modulus_degree as u64).to_le_bytes());
        for modulus in COEFF_MODULI {
            hasher.update(&modulus.to_le_bytes());
        }
        let digest = hasher.finalize();
        let mut id = [0u8; 8];
        id.copy_from_slice(&digest.as_bytes()[..8]);

        Ok(Self {
            poly_modulus_degree,
            parms_id: ParmsId(id),
        })
    }

    /// Parameters for a given number of slots (half the degree)
    pub fn with_slot_count(slot_count: usize) -> CoreResult<Self> {
        Self::new(slot_count.saturating_mul(2))
    }

    pub fn poly_modulus_degree(&self) -> usize {
        self.poly_modulus_degree
    }

    pub fn slot_count(&self) -> usize {
        self.poly_modulus_degree / 2
    }

    pub fn parms_id(&self) -> ParmsId {
        self.parms_id
    }

    /// Top-level encoding scale: the value of the modulus dropped by the first rescale
    pub fn scale(&self) -> f64 {
        COEFF_MODULI[TOP_LEVEL] as f64
    }

    pub fn small_scale(&self) -> f64 {
        SMALL_SCALE
    }

    pub fn top_level(&self) -> usize {
        TOP_LEVEL
    }

    /// Modulus removed when rescaling or switching down from `level`
    pub fn modulus_at(&self, level: usize) -> HeResult<u64> {
        COEFF_MODULI
            .get(level)
            .copied()
            .ok_or(HeError::LevelExhausted(level))
    }

    /// Total bit width of the moduli still present at `level`
    pub fn modulus_bits(&self, level: usize) -> u32 {
        COEFF_MODULI
            .iter()
            .take(level + 1)
            .map(|q| u64::BITS - q.leading_zeros())
            .sum()
    }

    /// Scale after dropping the top modulus of `level`
    pub fn rescaled(&self, scale: f64, level: usize) -> HeResult<(f64, usize)> {
        if level == 0 {
            return Err(HeError::LevelExhausted(level));
        }
        let q = self.modulus_at(level)?;
        Ok((scale / q as f64, level - 1))
    }

    /// Reject scales that no longer fit under the remaining modulus
    pub fn check_scale(&self, scale: f64, level: usize) -> HeResult<()> {
        let modulus_bits = self.modulus_bits(level);
        if scale.is_nan() || scale <= 0.0 {
            return Err(HeError::ScaleOutOfBounds {
                scale_bits: 0,
                modulus_bits,
            });
        }
        let scale_bits = scale.log2() as u32;
        if scale_bits >= modulus_bits {
            return Err(HeError::ScaleOutOfBounds {
                scale_bits,
                modulus_bits,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degree_above_bound_is_rejected() {
        let err = EncryptionParams::new(16384).unwrap_err();
        assert!(matches!(err, CoreError::Parameter(_)));
    }

    #[test]
    fn test_non_power_of_two_is_rejected() {
        assert!(EncryptionParams::new(6000).is_err());
        assert!(EncryptionParams::new(8).is_err());
    }

    #[test]
    fn test_chain_bit_widths() {
        let params = EncryptionParams::new(8192).unwrap();
        assert_eq!(params.slot_count(), 4096);
        assert_eq!(params.modulus_bits(3), 60 + 59 + 59 + 40);
        assert_eq!(params.modulus_bits(0), 60);
        assert_eq!(params.scale(), 0xffffe80001u64 as f64);
    }

    #[test]
    fn test_first_rescale_drops_base_scale() {
        let params = EncryptionParams::new(64).unwrap();
        let (scale, level) = params
            .rescaled(params.scale() * SMALL_SCALE, TOP_LEVEL)
            .unwrap();
        assert_eq!(scale, SMALL_SCALE);
        assert_eq!(level, TOP_LEVEL - 1);
    }

    #[test]
    fn test_parms_id_depends_on_degree() {
        let a = EncryptionParams::new(64).unwrap();
        let b = EncryptionParams::new(128).unwrap();
        assert_ne!(a.parms_id(), b.parms_id());
        assert_eq!(a.parms_id(), EncryptionParams::new(64).unwrap().parms_id());
    }
}
