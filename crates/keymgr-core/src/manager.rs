use crate::{config::KeyManagerConfig, crypt::PrivateKeyCrypt, error::KeyManagerError};

/// A stored key pair. The public half is mandatory; the private half may be absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub public_material: Vec<u8>,
    pub private_material: Option<Vec<u8>>,
}

impl KeyPair {
    pub fn new(public_material: impl Into<Vec<u8>>, private_material: Option<Vec<u8>>) -> Self {
        Self {
            public_material: public_material.into(),
            private_material,
        }
    }
}

/// Contract for key pair storage. Keys are classified by `key_type` and
/// stored by `key_name`; names are unique within a type.
///
/// Every backend must implement all operations; there are no default bodies
/// for persistence.
pub trait KeyManager: Send + Sync {
    /// Backend-specific setup, run after the encryption policy is validated.
    /// Failures abort construction.
    fn initialize(
        config: &KeyManagerConfig,
        crypt: PrivateKeyCrypt,
    ) -> Result<Self, KeyManagerError>
    where
        Self: Sized;

    /// Validate the encryption settings, then hand off to `initialize`.
    fn from_config(config: &KeyManagerConfig) -> Result<Self, KeyManagerError>
    where
        Self: Sized,
    {
        let crypt = PrivateKeyCrypt::from_config(config)?;
        Self::initialize(config, crypt)
    }

    /// Persist a new key pair. Fails with `KeyExists` rather than overwrite
    /// either half of an existing pair.
    fn save(
        &self,
        key_type: &str,
        key_name: &str,
        public_material: &[u8],
        private_material: Option<&[u8]>,
    ) -> Result<(), KeyManagerError>;

    /// Retrieve a key pair. With `decrypt_private` false the private half is
    /// returned exactly as stored, which may be ciphertext.
    fn get(
        &self,
        key_type: &str,
        key_name: &str,
        decrypt_private: bool,
    ) -> Result<KeyPair, KeyManagerError>;

    /// Remove both halves of a key pair (idempotent).
    fn remove(&self, key_type: &str, key_name: &str) -> Result<(), KeyManagerError>;
}

/// Reject identifiers that could escape a backend's partition.
pub fn validate_identifier(kind: &str, value: &str) -> Result<(), KeyManagerError> {
    let reason = if value.is_empty() {
        Some("must not be empty")
    } else if value == "." || value == ".." {
        Some("must not be a relative path component")
    } else if value.contains(['/', '\\']) {
        Some("must not contain path separators")
    } else if value.contains('\0') {
        Some("must not contain NUL bytes")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(KeyManagerError::InvalidIdentifier {
            reason: format!("{kind} {value:?} {reason}"),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Mutex};

    use super::*;
    use crate::error::Artifact;

    /// Minimal in-memory backend proving the contract is implementable
    /// without touching a filesystem.
    struct MemoryKeyManager {
        crypt: PrivateKeyCrypt,
        keys: Mutex<HashMap<(String, String), (Vec<u8>, Option<Vec<u8>>)>>,
    }

    impl KeyManager for MemoryKeyManager {
        fn initialize(
            _config: &KeyManagerConfig,
            crypt: PrivateKeyCrypt,
        ) -> Result<Self, KeyManagerError> {
            Ok(Self {
                crypt,
                keys: Mutex::new(HashMap::new()),
            })
        }

        fn save(
            &self,
            key_type: &str,
            key_name: &str,
            public_material: &[u8],
            private_material: Option<&[u8]>,
        ) -> Result<(), KeyManagerError> {
            let mut keys = self.keys.lock().map_err(KeyManagerError::storage)?;
            let id = (key_type.to_string(), key_name.to_string());
            if keys.contains_key(&id) {
                return Err(KeyManagerError::key_exists(key_type, key_name, Artifact::Public));
            }
            let private = private_material
                .map(|p| self.crypt.encrypt_private(p))
                .transpose()?;
            keys.insert(id, (public_material.to_vec(), private));
            Ok(())
        }

        fn get(
            &self,
            key_type: &str,
            key_name: &str,
            decrypt_private: bool,
        ) -> Result<KeyPair, KeyManagerError> {
            let keys = self.keys.lock().map_err(KeyManagerError::storage)?;
            let (public, private) = keys
                .get(&(key_type.to_string(), key_name.to_string()))
                .cloned()
                .ok_or_else(|| KeyManagerError::key_not_found(key_type, key_name))?;
            let private = match private {
                Some(stored) if decrypt_private => Some(self.crypt.decrypt_private(&stored)?),
                other => other,
            };
            Ok(KeyPair::new(public, private))
        }

        fn remove(&self, key_type: &str, key_name: &str) -> Result<(), KeyManagerError> {
            let mut keys = self.keys.lock().map_err(KeyManagerError::storage)?;
            keys.remove(&(key_type.to_string(), key_name.to_string()));
            Ok(())
        }
    }

    #[test]
    fn from_config_validates_encryption_before_initialize() {
        let cfg = KeyManagerConfig {
            encrypt_private_keys: true,
            ..Default::default()
        };
        let err = MemoryKeyManager::from_config(&cfg)
            .err()
            .expect("secret is required");
        assert!(matches!(err, KeyManagerError::Config { .. }));
    }

    #[test]
    fn contract_round_trip_through_trait_object() {
        let manager: Box<dyn KeyManager> = Box::new(
            MemoryKeyManager::from_config(&KeyManagerConfig::new().with_encryption("s"))
                .expect("build"),
        );
        manager
            .save("minion", "node1", b"PUBKEY", Some(b"PRIVKEY"))
            .expect("save");

        let pair = manager.get("minion", "node1", true).expect("get");
        assert_eq!(pair, KeyPair::new(b"PUBKEY".to_vec(), Some(b"PRIVKEY".to_vec())));

        let raw = manager.get("minion", "node1", false).expect("get raw");
        assert_ne!(raw.private_material.as_deref(), Some(&b"PRIVKEY"[..]));

        manager.remove("minion", "node1").expect("remove");
        manager.remove("minion", "node1").expect("remove again");
        let err = manager.get("minion", "node1", true).expect_err("gone");
        assert!(matches!(err, KeyManagerError::KeyNotFound { .. }));
    }

    #[test]
    fn identifiers_are_validated() {
        assert!(validate_identifier("key_name", "node1").is_ok());
        assert!(validate_identifier("key_name", "node.example.com").is_ok());

        for bad in ["", ".", "..", "a/b", "a\\b", "nul\0byte"] {
            let err = validate_identifier("key_name", bad).expect_err("should reject");
            assert!(matches!(err, KeyManagerError::InvalidIdentifier { .. }));
        }
    }
}
