use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::KeyManagerError;

/// Process-wide key manager settings. Read once when a backend is built.
#[derive(Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct KeyManagerConfig {
    /// Encrypt private keys at rest with `keystore_secret`.
    #[serde(default)]
    pub encrypt_private_keys: bool,
    /// Shared secret for private key encryption; required when encryption is on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keystore_secret: Option<String>,
    /// Root of the local file backend's key tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pki_dir: Option<PathBuf>,
    /// Registry identifier of the backend to construct.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keystore_module: Option<String>,
}

impl KeyManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_encryption(mut self, secret: impl Into<String>) -> Self {
        self.encrypt_private_keys = true;
        self.keystore_secret = Some(secret.into());
        self
    }

    pub fn with_pki_dir(mut self, pki_dir: impl Into<PathBuf>) -> Self {
        self.pki_dir = Some(pki_dir.into());
        self
    }

    pub fn with_keystore_module(mut self, module: impl Into<String>) -> Self {
        self.keystore_module = Some(module.into());
        self
    }

    /// The secret to key the cipher with, if encryption is enabled.
    ///
    /// Returns `Ok(None)` when encryption is disabled and fails when it is
    /// enabled without a secret.
    pub fn encryption_secret(&self) -> Result<Option<&str>, KeyManagerError> {
        if !self.encrypt_private_keys {
            return Ok(None);
        }
        self.keystore_secret
            .as_deref()
            .map(Some)
            .ok_or_else(|| {
                KeyManagerError::config(
                    "keystore_secret must be set when private key encryption is enabled",
                )
            })
    }
}

impl fmt::Debug for KeyManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManagerConfig")
            .field("encrypt_private_keys", &self.encrypt_private_keys)
            .field(
                "keystore_secret",
                &self.keystore_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("pki_dir", &self.pki_dir)
            .field("keystore_module", &self.keystore_module)
            .finish()
    }
}
