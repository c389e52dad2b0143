//! fitcrypt-storage: Server-side evaluation key cache
//!
//! A client publishes its Galois, single-step Galois and relinearization
//! keys once; the server looks them up by key id whenever a request for
//! that client arrives. The secret key never reaches this crate.
//!
//! ## Backends
//!
//! | Backend            | Use Case          |
//! |--------------------|-------------------|
//! | `InMemoryKeyCache` | Unit tests        |
//! | `LocalKeyCache`    | Single-host server, CLI |
//!
//! ## Example
//!
//! ```rust,ignore
//! use fitcrypt_storage::{InMemoryKeyCache, fetch, publish};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = InMemoryKeyCache::new();
//!
//!     let id = publish(&cache, bundle.evaluation_keys()).await?;
//!     let keys = fetch(&cache, &backend, &id).await?;
//!     assert_eq!(keys.key_id(), id);
//!
//!     Ok(())
//! }
//! ```

mod error;
mod traits;

mod local;
mod memory;

// Re-exports
pub use error::{StorageError, StorageResult};
pub use traits::{EvaluationKeyStore, StoredKeys, fetch, key_id_from_base58, publish};

pub use local::LocalKeyCache;
pub use memory::InMemoryKeyCache;
