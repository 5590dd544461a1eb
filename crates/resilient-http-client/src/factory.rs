//! A name → client registry, so a component deep in a call tree can
//! resolve `"payments-api"` to the same configured client every caller
//! gets, without threading a `ResilientHttpClient` through every layer of
//! the program.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::builder::{ClientBuildError, ClientBuilder};
use crate::client::ResilientHttpClient;

/// Failure resolving a named client.
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    /// No builder was ever registered under this name.
    #[error("no client registered under name '{0}'")]
    Unknown(String),
    /// A builder was registered, but building it failed.
    #[error("failed to build client '{name}': {source}")]
    Build {
        name: String,
        #[source]
        source: ClientBuildError,
    },
}

/// Builds and caches named clients.
///
/// Registering a name stores a constructor, not a client: the first
/// [`ClientFactory::get_or_build`] call for a name builds and caches the
/// client; later calls return the cached `Arc` until [`ClientFactory::reset`]
/// evicts it.
pub struct ClientFactory {
    builders: Mutex<HashMap<String, Arc<dyn Fn() -> ClientBuilder + Send + Sync>>>,
    cache: Mutex<HashMap<String, Arc<ResilientHttpClient>>>,
}

impl Default for ClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientFactory {
    /// A fresh, empty factory.
    pub fn new() -> Self {
        Self {
            builders: Mutex::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide factory instance.
    pub fn global() -> &'static ClientFactory {
        static INSTANCE: OnceLock<ClientFactory> = OnceLock::new();
        INSTANCE.get_or_init(ClientFactory::new)
    }

    /// Registers a constructor under `name`, replacing any prior
    /// registration. Does not build or evict a cached client for that name;
    /// call [`Self::reset`] afterward if a stale cached client should be
    /// rebuilt from the new constructor.
    pub fn register(&self, name: impl Into<String>, builder_fn: impl Fn() -> ClientBuilder + Send + Sync + 'static) {
        self.builders.lock().unwrap().insert(name.into(), Arc::new(builder_fn));
    }

    /// Returns the cached client for `name`, building and caching it from
    /// the registered constructor on first access.
    pub fn get_or_build(&self, name: &str) -> Result<Arc<ResilientHttpClient>, FactoryError> {
        if let Some(client) = self.cache.lock().unwrap().get(name) {
            return Ok(Arc::clone(client));
        }

        let ctor = self
            .builders
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| FactoryError::Unknown(name.to_string()))?;

        let client = Arc::new(ctor().build().map_err(|source| FactoryError::Build {
            name: name.to_string(),
            source,
        })?);

        self.cache.lock().unwrap().insert(name.to_string(), Arc::clone(&client));
        Ok(client)
    }

    /// Evicts the cached client for `name`, if any; the next
    /// [`Self::get_or_build`] call rebuilds it from the registered
    /// constructor.
    pub fn reset(&self, name: &str) {
        self.cache.lock().unwrap().remove(name);
    }

    /// Names with a registered constructor.
    pub fn names(&self) -> Vec<String> {
        self.builders.lock().unwrap().keys().cloned().collect()
    }
}
