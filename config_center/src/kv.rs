//! Hierarchical key/value store under the watch backend.

use crate::listener::ConfigChangeType;
use crossfire::{AsyncRx, MTx, mpsc};
use parking_lot::Mutex;
use relay_rpc_core::error::ConfigError;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// A change of one node, pushed by the store
#[derive(Debug, Clone, PartialEq)]
pub struct KvEvent {
    pub path: String,
    pub change_type: ConfigChangeType,
    pub value: Option<String>,
}

/// Client of a zookeeper-like store: nodes addressed by slash separated absolute paths.
pub trait KvStore: Send + Sync + 'static {
    /// Content of the node, `NotFound` when absent
    fn get(&self, path: &str) -> Result<String, ConfigError>;

    /// Write the node, missing parents are created empty.
    fn put(&self, path: &str, value: &str) -> Result<(), ConfigError>;

    /// Create the node and its parents when absent, existing content is kept.
    fn create(&self, path: &str) -> Result<(), ConfigError>;

    /// Names of the direct children, `NotFound` when the node is absent
    fn children(&self, path: &str) -> Result<Vec<String>, ConfigError>;

    fn delete(&self, path: &str) -> Result<(), ConfigError>;

    /// Stream the changes of every node below `prefix`. The stream ends when the store closes.
    fn watch(&self, prefix: &str) -> Result<AsyncRx<KvEvent>, ConfigError>;

    fn is_connected(&self) -> bool;

    fn close(&self);
}

/// A [KvStore] kept in memory
#[derive(Default)]
pub struct MemoryKvStore {
    inner: Mutex<MemoryKvInner>,
    closed: AtomicBool,
}

#[derive(Default)]
struct MemoryKvInner {
    nodes: BTreeMap<String, String>,
    watchers: Vec<(String, MTx<KvEvent>)>,
}

fn parents(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/').filter(|(i, _)| *i > 0).map(move |(i, _)| &path[..i])
}

fn under(path: &str, prefix: &str) -> bool {
    path.len() > prefix.len() && path.starts_with(prefix) && path.as_bytes()[prefix.len()] == b'/'
}

impl MemoryKvInner {
    fn emit(&mut self, path: &str, change_type: ConfigChangeType, value: Option<&str>) {
        self.watchers.retain(|(prefix, tx)| {
            if !under(path, prefix) {
                return true;
            }
            let event = KvEvent {
                path: path.to_string(),
                change_type,
                value: value.map(|v| v.to_string()),
            };
            // the receiver is gone
            tx.send(event).is_ok()
        });
    }

    fn ensure_parents(&mut self, path: &str) {
        for p in parents(path) {
            if !self.nodes.contains_key(p) {
                self.nodes.insert(p.to_string(), String::new());
            }
        }
    }
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn check(&self) -> Result<(), ConfigError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ConfigError::Backend("store closed".to_string()));
        }
        Ok(())
    }

    /// Number of live watch streams
    pub fn watcher_count(&self) -> usize {
        self.inner.lock().watchers.len()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, path: &str) -> Result<String, ConfigError> {
        self.check()?;
        match self.inner.lock().nodes.get(path) {
            Some(v) => Ok(v.clone()),
            None => Err(ConfigError::NotFound(path.to_string())),
        }
    }

    fn put(&self, path: &str, value: &str) -> Result<(), ConfigError> {
        self.check()?;
        let mut inner = self.inner.lock();
        inner.ensure_parents(path);
        let change_type = match inner.nodes.insert(path.to_string(), value.to_string()) {
            Some(_) => ConfigChangeType::Modified,
            None => ConfigChangeType::Added,
        };
        inner.emit(path, change_type, Some(value));
        Ok(())
    }

    fn create(&self, path: &str) -> Result<(), ConfigError> {
        self.check()?;
        let mut inner = self.inner.lock();
        inner.ensure_parents(path);
        inner.nodes.entry(path.to_string()).or_default();
        Ok(())
    }

    fn children(&self, path: &str) -> Result<Vec<String>, ConfigError> {
        self.check()?;
        let inner = self.inner.lock();
        if !inner.nodes.contains_key(path) {
            return Err(ConfigError::NotFound(path.to_string()));
        }
        let prefix = format!("{}/", path);
        Ok(inner
            .nodes
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter_map(|(k, _)| {
                let name = &k[prefix.len()..];
                if name.contains('/') { None } else { Some(name.to_string()) }
            })
            .collect())
    }

    fn delete(&self, path: &str) -> Result<(), ConfigError> {
        self.check()?;
        let mut inner = self.inner.lock();
        if inner.nodes.remove(path).is_none() {
            return Err(ConfigError::NotFound(path.to_string()));
        }
        let prefix = format!("{}/", path);
        inner.nodes.retain(|k, _| !k.starts_with(&prefix));
        inner.emit(path, ConfigChangeType::Deleted, None);
        Ok(())
    }

    fn watch(&self, prefix: &str) -> Result<AsyncRx<KvEvent>, ConfigError> {
        self.check()?;
        let (tx, rx) = mpsc::unbounded_async::<KvEvent>();
        self.inner.lock().watchers.push((prefix.trim_end_matches('/').to_string(), tx.into()));
        Ok(rx)
    }

    #[inline]
    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // ends every watch stream
        self.inner.lock().watchers.clear();
    }
}
