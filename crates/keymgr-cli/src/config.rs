use std::{
    env, fs,
    path::{Path, PathBuf},
};

use color_eyre::Result;
use dirs::config_dir;
use keymgr_core::KeyManagerConfig;

pub const SECRET_ENV: &str = "KEYMGR_KEYSTORE_SECRET";
pub const PKI_DIR_ENV: &str = "KEYMGR_PKI_DIR";

/// Load config from the default path, then apply environment overrides.
pub fn load() -> Result<KeyManagerConfig> {
    let path = default_path()?;
    load_from_path(path)
}

/// Load config from a given path (defaults if missing or empty), then apply
/// environment overrides.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<KeyManagerConfig> {
    let cfg = read_file(path.as_ref())?;
    Ok(apply_overrides(
        cfg,
        env::var(SECRET_ENV).ok(),
        env::var_os(PKI_DIR_ENV).map(PathBuf::from),
    ))
}

fn read_file(path: &Path) -> Result<KeyManagerConfig> {
    if !path.exists() {
        return Ok(KeyManagerConfig::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(KeyManagerConfig::default());
    }
    let cfg: KeyManagerConfig = toml::from_str(&contents)?;
    Ok(cfg)
}

/// Environment values win over file values when present and non-empty.
pub fn apply_overrides(
    mut cfg: KeyManagerConfig,
    secret: Option<String>,
    pki_dir: Option<PathBuf>,
) -> KeyManagerConfig {
    if let Some(secret) = secret.filter(|s| !s.is_empty()) {
        cfg.keystore_secret = Some(secret);
    }
    if let Some(dir) = pki_dir.filter(|d| !d.as_os_str().is_empty()) {
        cfg.pki_dir = Some(dir);
    }
    cfg
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join("keymgr").join("config.toml"))
}

/// Write the given config unless a file already exists at `path`, so user
/// edits are never clobbered. Returns the path either way.
pub fn write_default_if_missing(config: &KeyManagerConfig, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}
