use super::{BackendId, KeyId};
use crate::error::{HeError, HeResult};
use crate::params::{EncryptionParams, ParmsId};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Cursor over a canonical artifact encoding
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    what: &'static str,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8], what: &'static str) -> Self {
        Self { bytes, pos: 0, what }
    }

    fn take(&mut self, len: usize) -> HeResult<&'a [u8]> {
        if self.pos + len > self.bytes.len() {
            return Err(HeError::Deserialization(format!("{} truncated", self.what)));
        }
        let out = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn u8(&mut self) -> HeResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> HeResult<u32> {
        let raw: [u8; 4] = self
            .take(4)?
            .try_into()
            .map_err(|_| HeError::Deserialization(format!("{} length field", self.what)))?;
        Ok(u32::from_le_bytes(raw))
    }

    fn f64(&mut self) -> HeResult<f64> {
        let raw: [u8; 8] = self
            .take(8)?
            .try_into()
            .map_err(|_| HeError::Deserialization(format!("{} scale field", self.what)))?;
        Ok(f64::from_le_bytes(raw))
    }

    fn key_id(&mut self) -> HeResult<KeyId> {
        let raw: [u8; 32] = self
            .take(32)?
            .try_into()
            .map_err(|_| HeError::Deserialization(format!("{} key id", self.what)))?;
        Ok(KeyId(raw))
    }

    /// Backend tag followed by the parameter digest, checked against `params`
    fn header(&mut self, params: &EncryptionParams) -> HeResult<(BackendId, ParmsId)> {
        let backend = BackendId::try_from(self.u8()?)?;
        let raw: [u8; 8] = self
            .take(8)?
            .try_into()
            .map_err(|_| HeError::Deserialization(format!("{} parms id", self.what)))?;
        let parms_id = ParmsId(raw);
        if parms_id != params.parms_id() {
            return Err(HeError::Deserialization(format!(
                "{} was produced for parameters {parms_id}, expected {}",
                self.what,
                params.parms_id()
            )));
        }
        Ok((backend, parms_id))
    }

    fn rest(self) -> Vec<u8> {
        self.bytes[self.pos..].to_vec()
    }
}

fn header(backend: BackendId, parms_id: ParmsId) -> Vec<u8> {
    let mut out = vec![backend as u8];
    out.extend(parms_id.0);
    out
}

/// An HE public key (backend-agnostic wrapper)
#[derive(Clone, Debug)]
pub struct PublicKey {
    pub(crate) backend: BackendId,
    pub(crate) parms_id: ParmsId,
    pub(crate) bytes: Vec<u8>,
}

impl PublicKey {
    pub fn new(backend: BackendId, parms_id: ParmsId, bytes: Vec<u8>) -> Self {
        Self {
            backend,
            parms_id,
            bytes,
        }
    }

    pub fn backend(&self) -> BackendId {
        self.backend
    }

    pub fn key_id(&self) -> KeyId {
        KeyId::of(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Serialize with backend tag and parameter digest
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = header(self.backend, self.parms_id);
        out.extend(&self.bytes);
        out
    }

    pub fn from_bytes(bytes: &[u8], params: &EncryptionParams) -> HeResult<Self> {
        let mut reader = Reader::new(bytes, "public key");
        let (backend, parms_id) = reader.header(params)?;
        let bytes = reader.rest();
        if bytes.is_empty() {
            return Err(HeError::Deserialization("Empty public key".into()));
        }
        Ok(Self {
            backend,
            parms_id,
            bytes,
        })
    }
}

/// An HE secret key (zeroized on drop, never leaves the client)
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    #[zeroize(skip)]
    pub(crate) backend: BackendId,
    #[zeroize(skip)]
    pub(crate) parms_id: ParmsId,
    #[zeroize(skip)]
    pub(crate) key_id: KeyId,
    pub(crate) bytes: Vec<u8>,
}

impl SecretKey {
    pub fn new(backend: BackendId, parms_id: ParmsId, key_id: KeyId, bytes: Vec<u8>) -> Self {
        Self {
            backend,
            parms_id,
            key_id,
            bytes,
        }
    }

    pub fn backend(&self) -> BackendId {
        self.backend
    }

    /// Id of the public key generated alongside this secret
    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = header(self.backend, self.parms_id);
        out.extend(self.key_id.0);
        out.extend(&self.bytes);
        out
    }

    pub fn from_bytes(bytes: &[u8], params: &EncryptionParams) -> HeResult<Self> {
        let mut reader = Reader::new(bytes, "secret key");
        let (backend, parms_id) = reader.header(params)?;
        let key_id = reader.key_id()?;
        let bytes = reader.rest();
        if bytes.is_empty() {
            return Err(HeError::Deserialization("Empty secret key".into()));
        }
        Ok(Self::new(backend, parms_id, key_id, bytes))
    }
}

/// A keypair (public + secret)
pub struct KeyPair {
    pub public: PublicKey,
    pub secret: SecretKey,
}

/// Galois (rotation) keys for a fixed set of power-of-two steps
#[derive(Clone, Debug)]
pub struct GaloisKeys {
    pub(crate) backend: BackendId,
    pub(crate) parms_id: ParmsId,
    pub(crate) key_id: KeyId,
    pub(crate) decomposition_bits: u8,
    pub(crate) steps: Vec<usize>,
    pub(crate) bytes: Vec<u8>,
}

impl GaloisKeys {
    pub fn new(
        backend: BackendId,
        parms_id: ParmsId,
        key_id: KeyId,
        decomposition_bits: u8,
        steps: Vec<usize>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            backend,
            parms_id,
            key_id,
            decomposition_bits,
            steps,
            bytes,
        }
    }

    pub fn backend(&self) -> BackendId {
        self.backend
    }

    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub fn decomposition_bits(&self) -> u8 {
        self.decomposition_bits
    }

    pub fn steps(&self) -> &[usize] {
        &self.steps
    }

    pub fn has_step(&self, step: usize) -> bool {
        self.steps.contains(&step)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = header(self.backend, self.parms_id);
        out.extend(self.key_id.0);
        out.push(self.decomposition_bits);
        out.extend((self.steps.len() as u32).to_le_bytes());
        for step in &self.steps {
            out.extend((*step as u32).to_le_bytes());
        }
        out.extend(&self.bytes);
        out
    }

    pub fn from_bytes(bytes: &[u8], params: &EncryptionParams) -> HeResult<Self> {
        let mut reader = Reader::new(bytes, "Galois keys");
        let (backend, parms_id) = reader.header(params)?;
        let key_id = reader.key_id()?;
        let decomposition_bits = reader.u8()?;
        let count = reader.u32()? as usize;
        if count > usize::BITS as usize {
            return Err(HeError::Deserialization(format!(
                "Galois keys claim {count} steps"
            )));
        }
        let steps = (0..count)
            .map(|_| reader.u32().map(|s| s as usize))
            .collect::<HeResult<Vec<_>>>()?;
        Ok(Self::new(
            backend,
            parms_id,
            key_id,
            decomposition_bits,
            steps,
            reader.rest(),
        ))
    }
}

/// Relinearization key
#[derive(Clone, Debug)]
pub struct RelinKeys {
    pub(crate) backend: BackendId,
    pub(crate) parms_id: ParmsId,
    pub(crate) key_id: KeyId,
    pub(crate) decomposition_bits: u8,
    pub(crate) bytes: Vec<u8>,
}

impl RelinKeys {
    pub fn new(
        backend: BackendId,
        parms_id: ParmsId,
        key_id: KeyId,
        decomposition_bits: u8,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            backend,
            parms_id,
            key_id,
            decomposition_bits,
            bytes,
        }
    }

    pub fn backend(&self) -> BackendId {
        self.backend
    }

    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub fn decomposition_bits(&self) -> u8 {
        self.decomposition_bits
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = header(self.backend, self.parms_id);
        out.extend(self.key_id.0);
        out.push(self.decomposition_bits);
        out.extend(&self.bytes);
        out
    }

    pub fn from_bytes(bytes: &[u8], params: &EncryptionParams) -> HeResult<Self> {
        let mut reader = Reader::new(bytes, "relinearization keys");
        let (backend, parms_id) = reader.header(params)?;
        let key_id = reader.key_id()?;
        let decomposition_bits = reader.u8()?;
        Ok(Self::new(
            backend,
            parms_id,
            key_id,
            decomposition_bits,
            reader.rest(),
        ))
    }
}

/// Encoded (not encrypted) slot vector at a given scale and level
#[derive(Clone, Debug)]
pub struct Plaintext {
    pub(crate) backend: BackendId,
    pub(crate) slot_count: usize,
    pub(crate) scale: f64,
    pub(crate) level: usize,
    pub(crate) bytes: Vec<u8>,
}

impl Plaintext {
    pub fn new(
        backend: BackendId,
        slot_count: usize,
        scale: f64,
        level: usize,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            backend,
            slot_count,
            scale,
            level,
            bytes,
        }
    }

    pub fn backend(&self) -> BackendId {
        self.backend
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// An HE ciphertext with the scale/level metadata tracked alongside its bytes
#[derive(Clone, Debug)]
pub struct Ciphertext {
    pub(crate) backend: BackendId,
    pub(crate) parms_id: ParmsId,
    pub(crate) key_id: KeyId,
    pub(crate) slot_count: usize,
    pub(crate) scale: f64,
    pub(crate) level: usize,
    /// Number of polynomials: 2 when relinearized, 3 right after a multiply
    pub(crate) size: u8,
    pub(crate) bytes: Vec<u8>,
}

impl Ciphertext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        backend: BackendId,
        parms_id: ParmsId,
        key_id: KeyId,
        slot_count: usize,
        scale: f64,
        level: usize,
        size: u8,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            backend,
            parms_id,
            key_id,
            slot_count,
            scale,
            level,
            size,
            bytes,
        }
    }

    pub fn backend(&self) -> BackendId {
        self.backend
    }

    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn size(&self) -> u8 {
        self.size
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = header(self.backend, self.parms_id);
        out.extend(self.key_id.0);
        out.extend((self.slot_count as u32).to_le_bytes());
        out.push(self.level as u8);
        out.push(self.size);
        out.extend(self.scale.to_le_bytes());
        out.extend(&self.bytes);
        out
    }

    pub fn from_bytes(bytes: &[u8], params: &EncryptionParams) -> HeResult<Self> {
        let mut reader = Reader::new(bytes, "ciphertext");
        let (backend, parms_id) = reader.header(params)?;
        let key_id = reader.key_id()?;
        let slot_count = reader.u32()? as usize;
        let level = reader.u8()? as usize;
        let size = reader.u8()?;
        let scale = reader.f64()?;
        if level > params.top_level() {
            return Err(HeError::Deserialization(format!(
                "ciphertext level {level} above top level {}",
                params.top_level()
            )));
        }
        if size < 2 {
            return Err(HeError::Deserialization(format!(
                "ciphertext size {size} < 2"
            )));
        }
        Ok(Self::new(
            backend,
            parms_id,
            key_id,
            slot_count,
            scale,
            level,
            size,
            reader.rest(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> EncryptionParams {
        EncryptionParams::new(64).unwrap()
    }

    #[test]
    fn test_ciphertext_header_roundtrip() {
        let params = params();
        let ct = Ciphertext::new(
            BackendId::Mock,
            params.parms_id(),
            KeyId([7u8; 32]),
            32,
            params.scale(),
            3,
            2,
            vec![1, 2, 3],
        );

        let parsed = Ciphertext::from_bytes(&ct.to_bytes(), &params).unwrap();
        assert_eq!(parsed.key_id(), ct.key_id());
        assert_eq!(parsed.slot_count(), 32);
        assert_eq!(parsed.scale(), params.scale());
        assert_eq!(parsed.level(), 3);
        assert_eq!(parsed.as_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn test_artifact_for_other_parameters_is_rejected() {
        let params = params();
        let other = EncryptionParams::new(128).unwrap();
        let pk = PublicKey::new(BackendId::Mock, params.parms_id(), vec![9u8; 32]);

        assert!(PublicKey::from_bytes(&pk.to_bytes(), &params).is_ok());
        assert!(matches!(
            PublicKey::from_bytes(&pk.to_bytes(), &other),
            Err(HeError::Deserialization(_))
        ));
    }

    #[test]
    fn test_galois_keys_keep_step_set() {
        let params = params();
        let keys = GaloisKeys::new(
            BackendId::Mock,
            params.parms_id(),
            KeyId([1u8; 32]),
            15,
            vec![1],
            vec![0xaa; 32],
        );
        let parsed = GaloisKeys::from_bytes(&keys.to_bytes(), &params).unwrap();
        assert_eq!(parsed.steps(), &[1]);
        assert_eq!(parsed.decomposition_bits(), 15);
        assert!(parsed.has_step(1));
        assert!(!parsed.has_step(2));
    }

    #[test]
    fn test_truncated_secret_key_is_rejected() {
        let params = params();
        let sk = SecretKey::new(BackendId::Mock, params.parms_id(), KeyId([3u8; 32]), vec![5; 32]);
        let bytes = sk.to_bytes();
        assert!(SecretKey::from_bytes(&bytes[..20], &params).is_err());
    }
}
