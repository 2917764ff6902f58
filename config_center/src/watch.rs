use crate::kv::{KvEvent, KvStore};
use crate::listener::{ConfigChangeEvent, ConfigurationListener, ListenerRegistry};
use crate::DynamicConfiguration;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use captains_log::filter::LogFilter;
use crossfire::AsyncRx;
use futures::{FutureExt, pin_mut};
use relay_rpc_core::constant::*;
use relay_rpc_core::error::ConfigError;
use relay_rpc_core::lifecycle::{DestroyOnce, Latch};
use relay_rpc_core::runtime::AsyncIO;
use relay_rpc_core::url::parse_bool;
use relay_rpc_core::Url;
use sync_utils::waitgroup::{WaitGroup, WaitGroupGuard};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Backend over a zookeeper-like [KvStore], everything lives below
/// `/<config.namespace>/config`.
///
/// Changes are pushed by the store and dispatched to listeners by a background loop.
pub struct WatchConfiguration {
    inner: Arc<WatchInner>,
}

struct WatchInner {
    url: Url,
    root_path: String,
    base64_enabled: bool,
    store: Arc<dyn KvStore>,
    listeners: ListenerRegistry,
    /// Released on destroy, stops the watch loop
    done: Latch,
    /// Held by the watch loop
    running: WaitGroup,
    destroy_once: DestroyOnce,
    logger: Arc<LogFilter>,
}

impl WatchConfiguration {
    pub fn new<IO: AsyncIO>(
        url: Url, store: Arc<dyn KvStore>, rt: &IO,
    ) -> Result<Self, ConfigError> {
        let root_path =
            format!("/{}/config", url.get_param_or(CONFIG_NAMESPACE_KEY, DEFAULT_GROUP));
        let base64_enabled = match url.get_param(CONFIG_BASE64_KEY) {
            None => false,
            Some(v) => parse_bool(v).map_err(|_| ConfigError::InvalidParam {
                key: CONFIG_BASE64_KEY.to_string(),
                value: v.to_string(),
            })?,
        };
        store.create(&root_path)?;
        let events = store.watch(&root_path)?;
        let inner = Arc::new(WatchInner {
            url,
            root_path,
            base64_enabled,
            store,
            listeners: ListenerRegistry::new(),
            done: Latch::new(),
            running: WaitGroup::new(),
            destroy_once: DestroyOnce::new(),
            logger: Arc::new(LogFilter::new()),
        });
        let guard = inner.running.add_guard();
        rt.spawn_detach(watch_loop(inner.clone(), events, guard));
        logger_info!(inner.logger, "{} started", inner);
        Ok(Self { inner })
    }

    #[inline]
    pub fn root_path(&self) -> &str {
        &self.inner.root_path
    }

    #[inline]
    pub fn set_log_level(&self, level: log::Level) {
        self.inner.logger.set_level(level);
    }

    /// Path of an entry: `root/group/key` with a group, otherwise a governance key is split
    /// at its last `.` into `root/<service>/<rule>`.
    pub fn resolve_path(&self, key: &str, group: Option<&str>) -> String {
        let root = &self.inner.root_path;
        match group.filter(|g| !g.is_empty()) {
            Some(group) => format!("{}/{}/{}", root, group, key),
            None => match key.rfind('.') {
                Some(i) => format!("{}/{}/{}", root, &key[..i], &key[i + 1..]),
                None => format!("{}/{}", root, key),
            },
        }
    }

    /// `root/<group or dubbo>[/key]`, where published entries and group listings live.
    pub fn group_path(&self, key: &str, group: &str) -> String {
        let group = if group.is_empty() { DEFAULT_GROUP } else { group };
        if key.is_empty() {
            format!("{}/{}", self.inner.root_path, group)
        } else {
            format!("{}/{}/{}", self.inner.root_path, group, key)
        }
    }
}

impl WatchInner {
    fn decode(&self, content: String) -> Result<String, ConfigError> {
        if !self.base64_enabled {
            return Ok(content);
        }
        let bytes = STANDARD.decode(content.as_bytes())?;
        String::from_utf8(bytes).map_err(|e| ConfigError::Backend(e.to_string()))
    }

    /// `root/a/b/c` is reported to the listeners of `a.b.c`
    fn path_to_key(&self, path: &str) -> Option<String> {
        let rest = path.strip_prefix(self.root_path.as_str())?.strip_prefix('/')?;
        if rest.is_empty() {
            return None;
        }
        Some(rest.replace('/', "."))
    }

    fn dispatch(&self, event: KvEvent) {
        let Some(key) = self.path_to_key(&event.path) else {
            return;
        };
        let value = match event.value {
            Some(v) => match self.decode(v) {
                Ok(v) => Some(v),
                Err(e) => {
                    logger_warn!(self.logger, "{} skip change of {}: {}", self, event.path, e);
                    return;
                }
            },
            None => None,
        };
        let event = ConfigChangeEvent { key, value, change_type: event.change_type };
        let n = self.listeners.notify(&event.key, &event);
        logger_debug!(self.logger, "{} {} delivered to {} listeners", self, event, n);
    }
}

async fn watch_loop(inner: Arc<WatchInner>, events: AsyncRx<KvEvent>, _guard: WaitGroupGuard) {
    let done = inner.done.subscribe();
    loop {
        let done_f = done.recv().fuse();
        pin_mut!(done_f);
        let event_f = events.recv().fuse();
        pin_mut!(event_f);
        futures::select! {
            _ = done_f => {
                logger_trace!(inner.logger, "{} watch loop exit", inner);
                return;
            },
            r = event_f => {
                match r {
                    Ok(event) => inner.dispatch(event),
                    Err(_) => {
                        logger_warn!(inner.logger, "{} watch stream closed by the store", inner);
                        return;
                    }
                }
            },
        }
    }
}

impl fmt::Display for WatchInner {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "WatchConfiguration({})", self.root_path)
    }
}

impl DynamicConfiguration for WatchConfiguration {
    #[inline]
    fn get_url(&self) -> &Url {
        &self.inner.url
    }

    fn get_properties(&self, key: &str, group: Option<&str>) -> Result<String, ConfigError> {
        let content = self.inner.store.get(&self.resolve_path(key, group))?;
        self.inner.decode(content)
    }

    #[inline]
    fn get_rule(&self, key: &str, group: Option<&str>) -> Result<String, ConfigError> {
        self.get_properties(key, group)
    }

    #[inline]
    fn get_internal_property(
        &self, key: &str, group: Option<&str>,
    ) -> Result<String, ConfigError> {
        self.get_properties(key, group)
    }

    fn publish_config(&self, key: &str, group: &str, value: &str) -> Result<(), ConfigError> {
        let path = self.group_path(key, group);
        if self.inner.base64_enabled {
            self.inner.store.put(&path, &STANDARD.encode(value))
        } else {
            self.inner.store.put(&path, value)
        }
    }

    fn get_config_keys_by_group(&self, group: &str) -> Result<BTreeSet<String>, ConfigError> {
        let children = self.inner.store.children(&self.group_path("", group))?;
        if children.is_empty() {
            return Err(ConfigError::NotFound(format!("could not find keys with group: {}", group)));
        }
        Ok(children.into_iter().collect())
    }

    /// The group is ignored, events carry the dotted path below the root.
    #[inline]
    fn add_listener(
        &self, key: &str, listener: Arc<dyn ConfigurationListener>, _group: Option<&str>,
    ) {
        self.inner.listeners.add(key, listener);
    }

    #[inline]
    fn remove_listener(
        &self, key: &str, listener: &Arc<dyn ConfigurationListener>, _group: Option<&str>,
    ) {
        self.inner.listeners.remove(key, listener);
    }

    #[inline]
    fn is_available(&self) -> bool {
        !self.inner.done.is_released() && self.inner.store.is_connected()
    }

    async fn destroy(&self) {
        let inner = &self.inner;
        inner
            .destroy_once
            .call_once(|| async move {
                inner.done.release();
                // the loop may be dispatching, wait for it before closing the store
                inner.running.wait().await;
                inner.store.close();
                inner.listeners.clear();
                logger_info!(inner.logger, "{} destroyed", inner);
            })
            .await;
    }
}

impl Drop for WatchConfiguration {
    fn drop(&mut self) {
        self.inner.done.release();
    }
}
