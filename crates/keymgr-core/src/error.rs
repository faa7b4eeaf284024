use std::fmt;

use thiserror::Error;

/// Which half of a key pair an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Public,
    Private,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Artifact::Public => f.write_str("public"),
            Artifact::Private => f.write_str("private"),
        }
    }
}

/// Errors produced by key managers and their configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyManagerError {
    /// Missing or invalid configuration; fatal at construction time.
    #[error("key manager configuration error: {reason}")]
    Config { reason: String },
    /// A save would overwrite an existing artifact.
    #[error("a {artifact} key for {key_type}/{key_name} already exists in the store")]
    KeyExists {
        key_type: String,
        key_name: String,
        artifact: Artifact,
    },
    /// No public key is stored for the requested pair.
    #[error("no public key was found for {key_type}/{key_name}")]
    KeyNotFound { key_type: String, key_name: String },
    /// A key type or key name that cannot be mapped to a storage location.
    #[error("invalid key identifier: {reason}")]
    InvalidIdentifier { reason: String },
    /// Encryption or decryption of private material failed.
    #[error("private key crypto failure: {reason}")]
    Crypto { reason: String },
    /// Underlying storage failure.
    #[error("storage failure: {reason}")]
    Storage { reason: String },
}

impl KeyManagerError {
    pub fn config(reason: impl Into<String>) -> Self {
        KeyManagerError::Config {
            reason: reason.into(),
        }
    }

    pub fn key_exists(key_type: &str, key_name: &str, artifact: Artifact) -> Self {
        KeyManagerError::KeyExists {
            key_type: key_type.to_string(),
            key_name: key_name.to_string(),
            artifact,
        }
    }

    pub fn key_not_found(key_type: &str, key_name: &str) -> Self {
        KeyManagerError::KeyNotFound {
            key_type: key_type.to_string(),
            key_name: key_name.to_string(),
        }
    }

    pub fn storage<E: ToString>(err: E) -> Self {
        KeyManagerError::Storage {
            reason: err.to_string(),
        }
    }

    pub fn crypto<E: ToString>(err: E) -> Self {
        KeyManagerError::Crypto {
            reason: err.to_string(),
        }
    }

    /// True for errors a caller may recover from (duplicate or missing keys).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            KeyManagerError::KeyExists { .. } | KeyManagerError::KeyNotFound { .. }
        )
    }
}
