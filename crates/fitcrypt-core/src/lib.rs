//! # fitcrypt-core: Encrypted Fitness Statistics
//!
//! Clients encrypt run telemetry under a leveled approximate-arithmetic HE
//! scheme; the server computes distance, duration, a movement score and a
//! calendar summary without ever holding the secret key.
//!
//! ## Features
//!
//! - **Pluggable HE providers** behind [`HeBackend`], with a strict mock for tests
//! - **Key lifecycle**: five armored artifacts, all-or-nothing loading
//! - **Statically budgeted circuit**: the pipeline is data, validated against
//!   the modulus chain before the first ciphertext is touched
//!
//! ## Example: Encrypted Sum
//!
//! ```rust
//! use fitcrypt_core::{ClientCodec, EncryptionParams, KeyPaths, StatsCircuit, generate_keys};
//! use fitcrypt_core::he::backends::MockBackend;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dir = tempfile::tempdir()?;
//! let backend = MockBackend::new(EncryptionParams::new(64)?);
//! let bundle = generate_keys(&backend, &KeyPaths::in_dir(dir.path()))?;
//!
//! // Client side
//! let codec = ClientCodec::new(&backend, &bundle);
//! let a = codec.encrypt(&[1.0, 2.0, 3.0])?;
//! let b = codec.encrypt(&[10.0, 20.0, 30.0])?;
//!
//! // Server side: evaluation keys only
//! let server_backend = MockBackend::new(EncryptionParams::new(64)?);
//! let mut circuit = StatsCircuit::new(server_backend, bundle.evaluation_keys().clone())?;
//! let sum = circuit.add_ciphers(&a, &b)?;
//!
//! let out = codec.decrypt(&sum)?;
//! assert!((out[2] - 33.0).abs() < 1e-4);
//! # Ok(())
//! # }
//! ```
//!
//! ## Approximation
//!
//! Decrypted values carry encoding and noise error that grows with the
//! levels consumed. Compare against a tolerance, never for equality.

pub mod armor;
pub mod circuit;
pub mod codec;
pub mod error;
pub mod he;
pub mod keys;
pub mod masks;
pub mod params;
pub mod plan;
pub mod report;
pub mod telemetry;

// Re-exports for convenience
pub use circuit::{StatsCircuit, StatsOutput, WireStats};
pub use codec::{ClientCodec, ciphertext_from_wire, ciphertext_to_wire};
pub use error::{CoreError, CoreResult, HeError, HeResult};
pub use he::{BackendId, Ciphertext, HeBackend, KeyId};
pub use keys::{
    EvaluationKeys, KeyBundle, KeyPaths, KeySource, generate_keys, load_evaluation_keys,
    load_keys, load_or_generate,
};
pub use params::EncryptionParams;
pub use report::{RunReport, SummaryBreakdown};
pub use telemetry::{RunDate, RunFrames, RunRecording, WireRun};
