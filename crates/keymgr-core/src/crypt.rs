//! Private key encryption at rest.
//! Backends never call a cipher directly; they go through `PrivateKeyCrypt`
//! so the same policy applies whatever the storage medium.

use std::fmt;

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use sha2::Sha256;
use tracing::debug;

use crate::{config::KeyManagerConfig, error::KeyManagerError};

/// AES-GCM standard nonce length in bytes.
const NONCE_LEN: usize = 12;

/// HKDF salt and info binding derived keys to private key storage.
const KDF_SALT: &[u8] = b"keymgr/keystore-secret/v1";
const KDF_INFO: &[u8] = b"keymgr private key encryption aes-256-gcm";

/// Symmetric cipher keyed by a shared secret.
pub trait CipherAdapter: Send + Sync {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KeyManagerError>;

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, KeyManagerError>;
}

/// AES-256-GCM keyed by HKDF-SHA256 over the keystore secret.
/// Output layout is `nonce || ciphertext || tag`.
pub struct AesGcmCipher {
    cipher: Aes256Gcm,
}

impl AesGcmCipher {
    pub fn from_secret(secret: &str) -> Result<Self, KeyManagerError> {
        if secret.is_empty() {
            return Err(KeyManagerError::config("keystore_secret must not be empty"));
        }
        let key = derive_key(secret.as_bytes())?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| KeyManagerError::config(format!("cipher init failed: {e}")))?;
        Ok(Self { cipher })
    }
}

fn derive_key(secret: &[u8]) -> Result<[u8; 32], KeyManagerError> {
    let hk = Hkdf::<Sha256>::new(Some(KDF_SALT), secret);
    let mut key = [0u8; 32];
    hk.expand(KDF_INFO, &mut key)
        .map_err(|e| KeyManagerError::config(format!("HKDF-SHA256 expansion failed: {e}")))?;
    Ok(key)
}

impl CipherAdapter for AesGcmCipher {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KeyManagerError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| KeyManagerError::crypto(format!("encrypt failed: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, KeyManagerError> {
        if ciphertext.len() < NONCE_LEN {
            return Err(KeyManagerError::crypto(format!(
                "payload too short: expected at least {NONCE_LEN} bytes, got {}",
                ciphertext.len()
            )));
        }
        let (nonce, body) = ciphertext.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), body)
            .map_err(|e| KeyManagerError::crypto(format!("decrypt failed: {e}")))
    }
}

/// Encryption policy for private key material, shared by every backend.
///
/// Without a cipher both directions pass bytes through unchanged.
#[derive(Default)]
pub struct PrivateKeyCrypt {
    cipher: Option<Box<dyn CipherAdapter>>,
}

impl PrivateKeyCrypt {
    /// Build the policy from configuration, eagerly keying the cipher when
    /// `encrypt_private_keys` is set.
    pub fn from_config(config: &KeyManagerConfig) -> Result<Self, KeyManagerError> {
        match config.encryption_secret()? {
            Some(secret) => {
                debug!("private key encryption enabled");
                Ok(Self::with_cipher(AesGcmCipher::from_secret(secret)?))
            }
            None => Ok(Self::disabled()),
        }
    }

    pub fn with_cipher(cipher: impl CipherAdapter + 'static) -> Self {
        Self {
            cipher: Some(Box::new(cipher)),
        }
    }

    pub fn disabled() -> Self {
        Self { cipher: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn encrypt_private(&self, material: &[u8]) -> Result<Vec<u8>, KeyManagerError> {
        match &self.cipher {
            Some(cipher) => cipher.encrypt(material),
            None => Ok(material.to_vec()),
        }
    }

    pub fn decrypt_private(&self, stored: &[u8]) -> Result<Vec<u8>, KeyManagerError> {
        match &self.cipher {
            Some(cipher) => cipher.decrypt(stored),
            None => Ok(stored.to_vec()),
        }
    }
}

impl fmt::Debug for PrivateKeyCrypt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeyCrypt")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
