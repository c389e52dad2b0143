//! Storage error types

use fitcrypt_core::CoreError;
use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("No evaluation keys cached for {0}")]
    NotFound(String),

    #[error("Key id mismatch: expected {expected}, got {actual}")]
    KeyIdMismatch { expected: String, actual: String },

    #[error("Invalid key id: {0}")]
    InvalidKeyId(String),

    #[error("Cached keys do not load: {0}")]
    Core(#[from] CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}
