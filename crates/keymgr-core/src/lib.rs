//! Core abstractions for keymgr: the key store contract every backend honors,
//! private-key encryption at rest, and the backend registry.
//! This crate is intentionally small and knows nothing about storage media.

pub mod config;
pub mod crypt;
pub mod error;
pub mod manager;
pub mod registry;

pub use config::KeyManagerConfig;
pub use error::KeyManagerError;
pub use manager::{KeyManager, KeyPair};
