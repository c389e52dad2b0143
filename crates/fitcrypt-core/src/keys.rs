//! Key hierarchy lifecycle: generate, persist, load.
//!
//! A bundle is five artifacts written as armored files. Loading is
//! all-or-nothing: any missing, corrupt or foreign artifact fails the whole
//! load and the caller regenerates the full bundle.

use crate::armor::{ArmorType, armor, dearmor};
use crate::error::{CoreError, CoreResult, HeError};
use crate::he::{
    GENERIC_DECOMPOSITION_BITS, GaloisKeys, HeBackend, KeyId, PublicKey, RELIN_DECOMPOSITION_BITS,
    RelinKeys, SINGLE_STEP_DECOMPOSITION_BITS, SecretKey, generic_rotation_steps,
    single_step_rotation_steps,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// File locations of the five artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPaths {
    pub public_key: PathBuf,
    pub secret_key: PathBuf,
    pub galois_keys: PathBuf,
    pub single_step_galois_keys: PathBuf,
    pub relin_keys: PathBuf,
}

impl KeyPaths {
    /// Standard file names inside one directory
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            public_key: dir.join("publicKey"),
            secret_key: dir.join("secretKey"),
            galois_keys: dir.join("galoisKey"),
            single_step_galois_keys: dir.join("galoisSingleStepKey"),
            relin_keys: dir.join("relinearizeKey"),
        }
    }

    pub fn all(&self) -> [(ArmorType, &Path); 5] {
        [
            (ArmorType::PublicKey, &self.public_key),
            (ArmorType::SecretKey, &self.secret_key),
            (ArmorType::GaloisKeys, &self.galois_keys),
            (ArmorType::SingleStepGaloisKeys, &self.single_step_galois_keys),
            (ArmorType::RelinKeys, &self.relin_keys),
        ]
    }
}

/// The server-side read-only subset of a bundle
#[derive(Clone, Debug)]
pub struct EvaluationKeys {
    pub galois: GaloisKeys,
    pub single_step: GaloisKeys,
    pub relin: RelinKeys,
}

impl EvaluationKeys {
    pub fn key_id(&self) -> KeyId {
        self.relin.key_id()
    }

    /// Armored `(galois, single_step, relin)` texts
    pub fn to_armored(&self) -> (String, String, String) {
        (
            armor(&self.galois.to_bytes()),
            armor(&self.single_step.to_bytes()),
            armor(&self.relin.to_bytes()),
        )
    }

    pub fn from_armored(
        backend: &dyn HeBackend,
        galois: &str,
        single_step: &str,
        relin: &str,
    ) -> CoreResult<Self> {
        let params = backend.params();
        let galois = parse(ArmorType::GaloisKeys, galois, |b| {
            GaloisKeys::from_bytes(b, params)
        })?;
        let single_step = parse(ArmorType::SingleStepGaloisKeys, single_step, |b| {
            GaloisKeys::from_bytes(b, params)
        })?;
        let relin = parse(ArmorType::RelinKeys, relin, |b| RelinKeys::from_bytes(b, params))?;

        let keys = Self {
            galois,
            single_step,
            relin,
        };
        keys.check(backend)?;
        Ok(keys)
    }

    fn check(&self, backend: &dyn HeBackend) -> CoreResult<()> {
        let id = self.key_id();
        for (artifact, key_id, backend_id) in [
            (ArmorType::GaloisKeys, self.galois.key_id(), self.galois.backend()),
            (
                ArmorType::SingleStepGaloisKeys,
                self.single_step.key_id(),
                self.single_step.backend(),
            ),
            (ArmorType::RelinKeys, self.relin.key_id(), self.relin.backend()),
        ] {
            if backend_id != backend.backend_id() {
                return Err(load_error(
                    artifact,
                    format!("produced by {backend_id}, expected {}", backend.backend_id()),
                ));
            }
            if key_id != id {
                return Err(load_error(
                    artifact,
                    format!("belongs to key {key_id}, bundle is {id}"),
                ));
            }
        }
        Ok(())
    }
}

/// Full key hierarchy, owned by the client
pub struct KeyBundle {
    pub public: PublicKey,
    pub secret: SecretKey,
    pub evaluation: EvaluationKeys,
}

impl KeyBundle {
    pub fn key_id(&self) -> KeyId {
        self.public.key_id()
    }

    pub fn evaluation_keys(&self) -> &EvaluationKeys {
        &self.evaluation
    }

    /// Every artifact must descend from the same key generation
    fn check(&self, backend: &dyn HeBackend) -> CoreResult<()> {
        let id = self.key_id();
        if self.secret.key_id() != id {
            return Err(load_error(
                ArmorType::SecretKey,
                format!("belongs to key {}, public key is {id}", self.secret.key_id()),
            ));
        }
        if self.public.backend() != backend.backend_id() {
            return Err(load_error(
                ArmorType::PublicKey,
                format!("produced by {}", self.public.backend()),
            ));
        }
        if self.evaluation.key_id() != id {
            return Err(load_error(
                ArmorType::RelinKeys,
                format!("belongs to key {}, public key is {id}", self.evaluation.key_id()),
            ));
        }
        self.evaluation.check(backend)
    }
}

/// Which path `load_or_generate` took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Loaded,
    Generated,
}

/// Generate a fresh bundle and write every artifact, overwriting prior files.
///
/// Ciphertexts produced under a previous bundle can no longer be decrypted.
pub fn generate_keys(backend: &dyn HeBackend, paths: &KeyPaths) -> CoreResult<KeyBundle> {
    let slots = backend.params().slot_count();
    info!(backend = backend.name(), slots, "Generating key bundle");

    let kp = backend.generate_keypair()?;
    let galois = backend.generate_galois_keys(
        &kp.secret,
        &generic_rotation_steps(slots),
        GENERIC_DECOMPOSITION_BITS,
    )?;
    let single_step = backend.generate_galois_keys(
        &kp.secret,
        &single_step_rotation_steps(),
        SINGLE_STEP_DECOMPOSITION_BITS,
    )?;
    let relin = backend.generate_relin_keys(&kp.secret, RELIN_DECOMPOSITION_BITS)?;

    let bundle = KeyBundle {
        public: kp.public,
        secret: kp.secret,
        evaluation: EvaluationKeys {
            galois,
            single_step,
            relin,
        },
    };

    let secret_text = Zeroizing::new(armor(&bundle.secret.to_bytes()));
    let (galois_text, single_text, relin_text) = bundle.evaluation.to_armored();
    write(&paths.public_key, &armor(&bundle.public.to_bytes()))?;
    write(&paths.secret_key, &secret_text)?;
    write(&paths.galois_keys, &galois_text)?;
    write(&paths.single_step_galois_keys, &single_text)?;
    write(&paths.relin_keys, &relin_text)?;

    info!(key_id = %bundle.key_id(), "Key bundle written");
    Ok(bundle)
}

/// Load all five artifacts; any failure fails the whole load
pub fn load_keys(backend: &dyn HeBackend, paths: &KeyPaths) -> CoreResult<KeyBundle> {
    let params = backend.params();

    let public = parse(
        ArmorType::PublicKey,
        &read(ArmorType::PublicKey, &paths.public_key)?,
        |b| PublicKey::from_bytes(b, params),
    )?;
    let secret_text = Zeroizing::new(read(ArmorType::SecretKey, &paths.secret_key)?);
    let secret = parse(ArmorType::SecretKey, &secret_text, |b| {
        SecretKey::from_bytes(b, params)
    })?;
    let evaluation = load_evaluation_keys(backend, paths)?;

    let bundle = KeyBundle {
        public,
        secret,
        evaluation,
    };
    bundle.check(backend)?;

    info!(key_id = %bundle.key_id(), "Key bundle loaded");
    Ok(bundle)
}

/// Load the bundle, or regenerate all of it when any artifact fails to load
pub fn load_or_generate(
    backend: &dyn HeBackend,
    paths: &KeyPaths,
) -> CoreResult<(KeyBundle, KeySource)> {
    match load_keys(backend, paths) {
        Ok(bundle) => Ok((bundle, KeySource::Loaded)),
        Err(err) => {
            warn!(error = %err, "Key bundle unusable, regenerating all artifacts");
            Ok((generate_keys(backend, paths)?, KeySource::Generated))
        }
    }
}

/// Load only the three evaluation artifacts (server side)
pub fn load_evaluation_keys(
    backend: &dyn HeBackend,
    paths: &KeyPaths,
) -> CoreResult<EvaluationKeys> {
    let keys = EvaluationKeys::from_armored(
        backend,
        &read(ArmorType::GaloisKeys, &paths.galois_keys)?,
        &read(ArmorType::SingleStepGaloisKeys, &paths.single_step_galois_keys)?,
        &read(ArmorType::RelinKeys, &paths.relin_keys)?,
    )?;
    debug!(key_id = %keys.key_id(), "Evaluation keys loaded");
    Ok(keys)
}

fn load_error(artifact: ArmorType, reason: impl Into<String>) -> CoreError {
    CoreError::KeyLoad {
        artifact: artifact.label(),
        reason: reason.into(),
    }
}

fn read(artifact: ArmorType, path: &Path) -> CoreResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| load_error(artifact, format!("{}: {e}", path.display())))
}

fn parse<T>(
    artifact: ArmorType,
    text: &str,
    from_bytes: impl FnOnce(&[u8]) -> Result<T, HeError>,
) -> CoreResult<T> {
    let bytes = Zeroizing::new(
        dearmor(text).map_err(|e| load_error(artifact, e.to_string()))?,
    );
    from_bytes(&bytes).map_err(|e| load_error(artifact, e.to_string()))
}

fn write(path: &Path, text: &str) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)?;
    Ok(())
}
