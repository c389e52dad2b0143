pub mod mock;

pub use mock::MockBackend;
