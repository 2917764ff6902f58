//! Namespaced property source under the polling backend.

use crate::polling::AppConfig;
use parking_lot::Mutex;
use relay_rpc_core::error::ConfigError;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

/// Properties of one namespace
pub type Namespace = BTreeMap<String, String>;

/// Client of an apollo-like server, which serves namespaces of key/value properties.
pub trait ConfigSource: Send + Sync + 'static {
    /// The current content of a namespace, None when the server does not know it.
    fn fetch(&self, app: &AppConfig, namespace: &str) -> Result<Option<Namespace>, ConfigError>;

    fn is_connected(&self) -> bool;

    fn close(&self);
}

/// A [ConfigSource] kept in memory, shared by every app id.
#[derive(Default)]
pub struct MemoryConfigSource {
    namespaces: Mutex<HashMap<String, Namespace>>,
    closed: AtomicBool,
}

impl MemoryConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, namespace: &str, key: &str, value: &str) {
        self.namespaces
            .lock()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    pub fn remove(&self, namespace: &str, key: &str) -> Option<String> {
        self.namespaces.lock().get_mut(namespace).and_then(|ns| ns.remove(key))
    }

    pub fn remove_namespace(&self, namespace: &str) -> Option<Namespace> {
        self.namespaces.lock().remove(namespace)
    }
}

impl ConfigSource for MemoryConfigSource {
    fn fetch(&self, _app: &AppConfig, namespace: &str) -> Result<Option<Namespace>, ConfigError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ConfigError::Backend("source closed".to_string()));
        }
        Ok(self.namespaces.lock().get(namespace).cloned())
    }

    #[inline]
    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    #[inline]
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
