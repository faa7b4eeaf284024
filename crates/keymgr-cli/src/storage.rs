use std::path::PathBuf;

use color_eyre::Result;
use dirs::data_dir;
use keymgr_core::{registry, KeyManager, KeyManagerConfig};
use keymgr_storage::LOCAL_FILES;
use tracing::debug;

/// Resolve the default key tree for the local backend.
pub fn default_pki_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("keymgr").join("pki"))
}

/// Fill in the backend and key tree when the config leaves them unset.
pub fn with_defaults(mut config: KeyManagerConfig) -> Result<KeyManagerConfig> {
    if config.keystore_module.is_none() {
        config.keystore_module = Some(LOCAL_FILES.to_string());
    }
    if config.pki_dir.is_none() {
        config.pki_dir = Some(default_pki_dir()?);
    }
    Ok(config)
}

/// Build the configured backend through the process-wide registry.
pub fn manager_from_config(config: &KeyManagerConfig) -> Result<Box<dyn KeyManager>> {
    keymgr_storage::register_builtin_backends()?;
    let config = with_defaults(config.clone())?;
    debug!(?config, "resolving key manager backend");
    Ok(registry::get_key_manager(&config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_settings_are_kept() {
        let cfg = KeyManagerConfig::new()
            .with_pki_dir("/srv/pki")
            .with_keystore_module("custom");
        let resolved = with_defaults(cfg.clone()).expect("defaults");
        assert_eq!(resolved, cfg);
    }

    #[test]
    fn unset_module_defaults_to_local_files() {
        let cfg = KeyManagerConfig::new().with_pki_dir("/srv/pki");
        let resolved = with_defaults(cfg).expect("defaults");
        assert_eq!(resolved.keystore_module.as_deref(), Some(LOCAL_FILES));
    }

    #[test]
    fn unknown_backend_is_reported() {
        let cfg = KeyManagerConfig::new()
            .with_pki_dir("/srv/pki")
            .with_keystore_module("no-such-backend");
        let err = manager_from_config(&cfg).err().expect("should fail");
        assert!(err.to_string().contains("no-such-backend"));
    }
}
