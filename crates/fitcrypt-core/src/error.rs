use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("HE provider error: {0}")]
    He(#[from] HeError),

    #[error("Invalid encryption parameters: {0}")]
    Parameter(String),

    #[error("Failed to load {artifact}: {reason}")]
    KeyLoad {
        artifact: &'static str,
        reason: String,
    },

    #[error("Dimension mismatch: expected {expected} slots, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("No rotation key covers step {step}")]
    RotationKeyMissing { step: usize },

    #[error("Level budget violated at step {step}: {reason}")]
    Budget { step: usize, reason: String },

    #[error("Unexpected input layout: {0}")]
    InputLayout(String),

    #[error("Key mismatch: {0}")]
    KeyMismatch(String),

    #[error("Armor decoding failed: {0}")]
    Armor(#[from] base64::DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by an HE provider while sequencing primitive operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HeError {
    #[error("Scale mismatch: {left} != {right}")]
    ScaleMismatch { left: f64, right: f64 },

    #[error("Level mismatch: {left} != {right}")]
    LevelMismatch { left: usize, right: usize },

    #[error("Slot count mismatch: {left} != {right}")]
    SlotMismatch { left: usize, right: usize },

    #[error("No modulus left to drop at level {0}")]
    LevelExhausted(usize),

    #[error("Scale out of bounds: {scale_bits} bits >= {modulus_bits} modulus bits")]
    ScaleOutOfBounds { scale_bits: u32, modulus_bits: u32 },

    #[error("Ciphertext has size {0}, relinearize first")]
    NotRelinearized(u8),

    #[error("No Galois key for rotation step {0}")]
    MissingRotationKey(usize),

    #[error("Key mismatch: {0}")]
    KeyMismatch(String),

    #[error("Encoding failed: {0}")]
    Encoding(String),

    #[error("Deserialization failed: {0}")]
    Deserialization(String),

    #[error("Backend not available: {0}")]
    BackendUnavailable(String),
}

pub type HeResult<T> = Result<T, HeError>;
