//! Concrete key manager backends.
//! `local_files` keeps key pairs under a `pki_dir` tree, one directory per key type.

pub mod file_mask;
pub mod local_files;

use keymgr_core::{
    registry::{self, factory_for},
    KeyManagerError,
};

use crate::local_files::LocalFileKeyManager;

/// Identifier of the local file backend in `keystore_module`.
pub const LOCAL_FILES: &str = "local_files";

/// Register the built-in backends in the process-wide registry.
pub fn register_builtin_backends() -> Result<(), KeyManagerError> {
    registry::register_backend(LOCAL_FILES, factory_for::<LocalFileKeyManager>)
}
