use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use keymgr_core::{
    crypt::PrivateKeyCrypt,
    error::Artifact,
    manager::{validate_identifier, KeyManager, KeyPair},
    KeyManagerConfig, KeyManagerError,
};
use tracing::{debug, info, instrument, warn};

use crate::file_mask::{FileMaskGuard, KEY_FILE_MASK};

const PUBLIC_SUFFIX: &str = "pub";
const PRIVATE_SUFFIX: &str = "pem";

/// Key manager storing files in the local `pki_dir`.
/// Key types correspond to directories within `pki_dir`.
#[derive(Debug)]
pub struct LocalFileKeyManager {
    base_dir: PathBuf,
    crypt: PrivateKeyCrypt,
}

impl LocalFileKeyManager {
    pub fn new(base_dir: impl Into<PathBuf>, crypt: PrivateKeyCrypt) -> Self {
        Self {
            base_dir: base_dir.into(),
            crypt,
        }
    }

    /// Filesystem path for one half of a key pair. Creates the key type
    /// directory if it is missing.
    fn key_path(
        &self,
        key_type: &str,
        key_name: &str,
        artifact: Artifact,
    ) -> Result<PathBuf, KeyManagerError> {
        validate_identifier("key_name", key_name)?;
        let type_dir = self.type_dir(key_type)?;
        let suffix = match artifact {
            Artifact::Public => PUBLIC_SUFFIX,
            Artifact::Private => PRIVATE_SUFFIX,
        };
        Ok(type_dir.join(format!("{key_name}.{suffix}")))
    }

    fn type_dir(&self, key_type: &str) -> Result<PathBuf, KeyManagerError> {
        validate_identifier("key_type", key_type)?;
        let type_dir = self.base_dir.join(key_type);
        if !type_dir.exists() {
            debug!(dir = %type_dir.display(), "creating key type directory");
            fs::create_dir_all(&type_dir).map_err(|err| io_err(&type_dir, err))?;
        }
        Ok(type_dir)
    }

    /// True if a public key is stored for the pair.
    pub fn key_exists(&self, key_type: &str, key_name: &str) -> Result<bool, KeyManagerError> {
        Ok(self.key_path(key_type, key_name, Artifact::Public)?.is_file())
    }

    /// Names of every pair with a stored public key under `key_type`, sorted.
    pub fn list(&self, key_type: &str) -> Result<Vec<String>, KeyManagerError> {
        let type_dir = self.type_dir(key_type)?;
        let mut names = Vec::new();
        for entry in fs::read_dir(&type_dir).map_err(|err| io_err(&type_dir, err))? {
            let path = entry.map_err(|err| io_err(&type_dir, err))?.path();
            let is_public = path.extension().and_then(|e| e.to_str()) == Some(PUBLIC_SUFFIX);
            if !path.is_file() || !is_public {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Best-effort removal of artifacts written by a save that failed midway.
    fn rollback(&self, paths: &[&Path]) {
        for path in paths {
            if let Err(err) = remove_if_present(path) {
                warn!(path = %path.display(), "rollback failed: {err}");
            }
        }
    }
}

impl KeyManager for LocalFileKeyManager {
    fn initialize(
        config: &KeyManagerConfig,
        crypt: PrivateKeyCrypt,
    ) -> Result<Self, KeyManagerError> {
        let base_dir = config.pki_dir.clone().ok_or_else(|| {
            KeyManagerError::config("LocalFileKeyManager requires pki_dir to be set")
        })?;
        debug!(
            base_dir = %base_dir.display(),
            encrypted = crypt.is_enabled(),
            "initialized local key store"
        );
        Ok(Self::new(base_dir, crypt))
    }

    #[instrument(skip_all, fields(key_type = %key_type, key_name = %key_name))]
    fn save(
        &self,
        key_type: &str,
        key_name: &str,
        public_material: &[u8],
        private_material: Option<&[u8]>,
    ) -> Result<(), KeyManagerError> {
        let private_to_store = match private_material {
            Some(material) if !material.is_empty() => Some(self.crypt.encrypt_private(material)?),
            _ => None,
        };

        let pub_path = self.key_path(key_type, key_name, Artifact::Public)?;
        let priv_path = self.key_path(key_type, key_name, Artifact::Private)?;
        if pub_path.is_file() {
            return Err(KeyManagerError::key_exists(key_type, key_name, Artifact::Public));
        }
        if private_to_store.is_some() && priv_path.is_file() {
            return Err(KeyManagerError::key_exists(key_type, key_name, Artifact::Private));
        }

        let _mask = FileMaskGuard::narrow(KEY_FILE_MASK);

        write_new(&pub_path, public_material)
            .map_err(|err| write_err(err, &pub_path, key_type, key_name, Artifact::Public))?;

        let has_private = private_to_store.is_some();
        if let Some(stored) = private_to_store {
            if let Err(err) = write_new(&priv_path, &stored) {
                // A private file that already existed belongs to someone else.
                if err.kind() == io::ErrorKind::AlreadyExists {
                    self.rollback(&[&pub_path]);
                } else {
                    self.rollback(&[&pub_path, &priv_path]);
                }
                return Err(write_err(err, &priv_path, key_type, key_name, Artifact::Private));
            }
            if let Err(err) = set_owner_read_only(&priv_path) {
                self.rollback(&[&pub_path, &priv_path]);
                return Err(io_err(&priv_path, err));
            }
        }

        info!(private = has_private, "stored key pair");
        Ok(())
    }

    #[instrument(skip_all, fields(key_type = %key_type, key_name = %key_name))]
    fn get(
        &self,
        key_type: &str,
        key_name: &str,
        decrypt_private: bool,
    ) -> Result<KeyPair, KeyManagerError> {
        let pub_path = self.key_path(key_type, key_name, Artifact::Public)?;
        let priv_path = self.key_path(key_type, key_name, Artifact::Private)?;

        if !pub_path.is_file() {
            return Err(KeyManagerError::key_not_found(key_type, key_name));
        }
        let public_material = fs::read(&pub_path).map_err(|err| io_err(&pub_path, err))?;

        let private_material = if priv_path.is_file() {
            let stored = fs::read(&priv_path).map_err(|err| io_err(&priv_path, err))?;
            if decrypt_private {
                Some(self.crypt.decrypt_private(&stored)?)
            } else {
                Some(stored)
            }
        } else {
            None
        };

        Ok(KeyPair {
            public_material,
            private_material,
        })
    }

    #[instrument(skip_all, fields(key_type = %key_type, key_name = %key_name))]
    fn remove(&self, key_type: &str, key_name: &str) -> Result<(), KeyManagerError> {
        let pub_path = self.key_path(key_type, key_name, Artifact::Public)?;
        let priv_path = self.key_path(key_type, key_name, Artifact::Private)?;

        let removed_pub = remove_if_present(&pub_path).map_err(|err| io_err(&pub_path, err))?;
        let removed_priv =
            remove_if_present(&priv_path).map_err(|err| io_err(&priv_path, err))?;
        if removed_pub || removed_priv {
            info!("removed key pair");
        }
        Ok(())
    }
}

/// Create `path` exclusively and write `bytes` in full.
fn write_new(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file: File = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(bytes)?;
    file.flush()
}

/// Unlink `path` if it is a regular file; anything else is left alone.
fn remove_if_present(path: &Path) -> io::Result<bool> {
    if !path.is_file() {
        return Ok(false);
    }
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(unix)]
fn set_owner_read_only(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o400))
}

#[cfg(not(unix))]
fn set_owner_read_only(path: &Path) -> io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(true);
    fs::set_permissions(path, perms)
}

fn write_err(
    err: io::Error,
    path: &Path,
    key_type: &str,
    key_name: &str,
    artifact: Artifact,
) -> KeyManagerError {
    if err.kind() == io::ErrorKind::AlreadyExists {
        KeyManagerError::key_exists(key_type, key_name, artifact)
    } else {
        io_err(path, err)
    }
}

fn io_err(path: &Path, err: io::Error) -> KeyManagerError {
    KeyManagerError::Storage {
        reason: format!("{}: {err}", path.display()),
    }
}
