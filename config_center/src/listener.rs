use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
pub enum ConfigChangeType {
    #[strum(serialize = "added")]
    Added,
    #[strum(serialize = "modified")]
    Modified,
    #[strum(serialize = "deleted")]
    Deleted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigChangeEvent {
    pub key: String,
    /// None on deletion
    pub value: Option<String>,
    pub change_type: ConfigChangeType,
}

impl fmt::Display for ConfigChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ConfigChangeEvent({} {})", self.change_type, self.key)
    }
}

/// Receives the changes of the keys it is registered on.
///
/// Called from the background loop of the backend, should not block.
pub trait ConfigurationListener: Send + Sync + 'static {
    fn process(&self, event: &ConfigChangeEvent);
}

/// Listeners by key, several per key, removed by identity.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<HashMap<String, Vec<Arc<dyn ConfigurationListener>>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, key: &str, listener: Arc<dyn ConfigurationListener>) {
        self.listeners.write().entry(key.to_string()).or_default().push(listener);
    }

    /// Return true if the listener was registered on the key
    pub fn remove(&self, key: &str, listener: &Arc<dyn ConfigurationListener>) -> bool {
        let mut listeners = self.listeners.write();
        let Some(list) = listeners.get_mut(key) else {
            return false;
        };
        let before = list.len();
        list.retain(|l| !std::ptr::addr_eq(Arc::as_ptr(l), Arc::as_ptr(listener)));
        let removed = list.len() != before;
        if list.is_empty() {
            listeners.remove(key);
        }
        removed
    }

    #[inline]
    pub fn count(&self, key: &str) -> usize {
        self.listeners.read().get(key).map(|l| l.len()).unwrap_or(0)
    }

    /// Deliver the event to the listeners of `key`, return how many were called.
    pub fn notify(&self, key: &str, event: &ConfigChangeEvent) -> usize {
        // listeners may register others while processing
        let list = match self.listeners.read().get(key) {
            Some(l) => l.clone(),
            None => return 0,
        };
        for l in list.iter() {
            l.process(event);
        }
        list.len()
    }

    pub fn clear(&self) {
        self.listeners.write().clear();
    }
}
