//! Maps `keystore_module` identifiers to backend constructors.

use std::{collections::BTreeMap, sync::RwLock};

use once_cell::sync::Lazy;
use tracing::{debug, instrument};

use crate::{config::KeyManagerConfig, error::KeyManagerError, manager::KeyManager};

/// Builds a ready-to-use backend from the full configuration.
pub type BackendFactory = fn(&KeyManagerConfig) -> Result<Box<dyn KeyManager>, KeyManagerError>;

/// Identifier-to-constructor table for key manager backends.
#[derive(Debug, Default, Clone)]
pub struct BackendRegistry {
    factories: BTreeMap<String, BackendFactory>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend under `name`, replacing any previous registration.
    pub fn register(&mut self, name: impl Into<String>, factory: BackendFactory) {
        let name = name.into();
        debug!(backend = %name, "registering key manager backend");
        self.factories.insert(name, factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered identifiers in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Construct the backend named by `config.keystore_module`.
    #[instrument(skip_all, fields(backend = config.keystore_module.as_deref()))]
    pub fn resolve(
        &self,
        config: &KeyManagerConfig,
    ) -> Result<Box<dyn KeyManager>, KeyManagerError> {
        let name = config
            .keystore_module
            .as_deref()
            .ok_or_else(|| KeyManagerError::config("no keystore_module was provided"))?;
        let factory = self.factories.get(name).ok_or_else(|| {
            KeyManagerError::config(format!(
                "unable to load keystore backend {name:?}; registered backends: [{}]",
                self.names().join(", ")
            ))
        })?;
        factory(config)
    }
}

/// Adapter turning any `KeyManager` type into a `BackendFactory`.
pub fn factory_for<M: KeyManager + 'static>(
    config: &KeyManagerConfig,
) -> Result<Box<dyn KeyManager>, KeyManagerError> {
    Ok(Box::new(M::from_config(config)?))
}

static GLOBAL: Lazy<RwLock<BackendRegistry>> = Lazy::new(|| RwLock::new(BackendRegistry::new()));

/// Register a backend in the process-wide registry. Call during startup.
pub fn register_backend(
    name: impl Into<String>,
    factory: BackendFactory,
) -> Result<(), KeyManagerError> {
    let mut registry = GLOBAL.write().map_err(|err| KeyManagerError::Config {
        reason: format!("registry lock poisoned: {err}"),
    })?;
    registry.register(name, factory);
    Ok(())
}

/// Resolve and construct the configured backend from the process-wide registry.
pub fn get_key_manager(config: &KeyManagerConfig) -> Result<Box<dyn KeyManager>, KeyManagerError> {
    let registry = GLOBAL.read().map_err(|err| KeyManagerError::Config {
        reason: format!("registry lock poisoned: {err}"),
    })?;
    registry.resolve(config)
}
