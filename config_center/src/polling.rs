use crate::DynamicConfiguration;
use crate::listener::{
    ConfigChangeEvent, ConfigChangeType, ConfigurationListener, ListenerRegistry,
};
use crate::source::{ConfigSource, Namespace};
use arc_swap::ArcSwap;
use captains_log::filter::LogFilter;
use relay_rpc_core::Url;
use relay_rpc_core::constant::*;
use relay_rpc_core::error::ConfigError;
use relay_rpc_core::lifecycle::{DestroyOnce, Latch};
use relay_rpc_core::runtime::AsyncIO;
use sync_utils::waitgroup::{WaitGroup, WaitGroupGuard};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

const HTTP_PREFIX: &str = "http://";
/// A namespace holding a whole file keeps it under this key
const CONTENT_KEY: &str = "content";

/// Client identity and server address of an apollo-like config server
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub app_id: String,
    pub cluster: String,
    pub namespace: String,
    /// Comma separated, each with the http scheme
    pub server_address: String,
    pub secret: String,
    pub is_backup_config: bool,
    pub backup_config_path: String,
}

impl AppConfig {
    pub fn from_url(url: &Url) -> Self {
        Self {
            app_id: url.get_param_or(CONFIG_APP_ID_KEY, "").to_string(),
            cluster: url.get_param_or(CONFIG_CLUSTER_KEY, "").to_string(),
            namespace: url.get_param_or(CONFIG_NAMESPACE_KEY, DEFAULT_GROUP).to_string(),
            server_address: server_address(url.location()),
            secret: url.get_param_or(CONFIG_SECRET_KEY, "").to_string(),
            is_backup_config: url.get_param_bool(CONFIG_BACKUP_CONFIG_KEY, true),
            backup_config_path: url.get_param_or(CONFIG_BACKUP_CONFIG_PATH_KEY, "").to_string(),
        }
    }
}

/// Strip whitespace and add the http scheme to every address of the list
pub fn server_address(location: &str) -> String {
    if location.is_empty() {
        return String::new();
    }
    let addr: String = location.chars().filter(|c| !c.is_whitespace()).collect();
    addr.split(',')
        .map(|part| {
            if part.starts_with(HTTP_PREFIX) {
                part.to_string()
            } else {
                format!("{}{}", HTTP_PREFIX, part)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Backend over an apollo-like [ConfigSource].
///
/// The configured namespace is cached and refreshed every `config.poll_interval`, listeners
/// receive the differences between two snapshots. Publishing is not supported.
pub struct PollingConfiguration {
    inner: Arc<PollingInner>,
}

struct PollingInner {
    url: Url,
    app: AppConfig,
    interval: Duration,
    source: Arc<dyn ConfigSource>,
    snapshot: ArcSwap<Namespace>,
    listeners: ListenerRegistry,
    done: Latch,
    running: WaitGroup,
    destroy_once: DestroyOnce,
    logger: Arc<LogFilter>,
}

impl PollingConfiguration {
    /// Fails when the first fetch of the namespace fails
    pub fn new<IO: AsyncIO>(
        url: Url, source: Arc<dyn ConfigSource>, rt: &IO,
    ) -> Result<Self, ConfigError> {
        let app = AppConfig::from_url(&url);
        let interval = url.get_param_duration(CONFIG_POLL_INTERVAL_KEY, Duration::from_secs(1));
        let first = source.fetch(&app, &app.namespace)?.unwrap_or_default();
        let inner = Arc::new(PollingInner {
            url,
            app,
            interval,
            source,
            snapshot: ArcSwap::from_pointee(first),
            listeners: ListenerRegistry::new(),
            done: Latch::new(),
            running: WaitGroup::new(),
            destroy_once: DestroyOnce::new(),
            logger: Arc::new(LogFilter::new()),
        });
        let guard = inner.running.add_guard();
        rt.spawn_detach(poll_loop::<IO>(inner.clone(), guard));
        logger_info!(inner.logger, "{} started, poll every {:?}", inner, interval);
        Ok(Self { inner })
    }

    #[inline]
    pub fn app_config(&self) -> &AppConfig {
        &self.inner.app
    }

    #[inline]
    pub fn set_log_level(&self, level: log::Level) {
        self.inner.logger.set_level(level);
    }

    /// Fetch the namespace now and notify the changes, normally done by the poll loop.
    #[inline]
    pub fn refresh(&self) -> Result<usize, ConfigError> {
        self.inner.refresh()
    }

    fn namespace(&self, name: &str) -> Result<Option<Arc<Namespace>>, ConfigError> {
        if name == self.inner.app.namespace {
            return Ok(Some(self.inner.snapshot.load_full()));
        }
        Ok(self.inner.source.fetch(&self.inner.app, name)?.map(Arc::new))
    }
}

/// Changes from `old` to `new`, ordered by key
fn diff(old: &Namespace, new: &Namespace) -> Vec<ConfigChangeEvent> {
    let mut events = Vec::new();
    for (k, v) in new.iter() {
        let change_type = match old.get(k) {
            None => ConfigChangeType::Added,
            Some(prev) if prev != v => ConfigChangeType::Modified,
            Some(_) => continue,
        };
        events.push(ConfigChangeEvent { key: k.clone(), value: Some(v.clone()), change_type });
    }
    for k in old.keys().filter(|k| !new.contains_key(*k)) {
        events.push(ConfigChangeEvent {
            key: k.clone(),
            value: None,
            change_type: ConfigChangeType::Deleted,
        });
    }
    events.sort_by(|a, b| a.key.cmp(&b.key));
    events
}

impl PollingInner {
    /// Return the number of changes
    fn refresh(&self) -> Result<usize, ConfigError> {
        let new = Arc::new(self.source.fetch(&self.app, &self.app.namespace)?.unwrap_or_default());
        let old = self.snapshot.swap(new.clone());
        let events = diff(&old, &new);
        for event in events.iter() {
            let n = self.listeners.notify(&event.key, event);
            logger_debug!(self.logger, "{} {} delivered to {} listeners", self, event, n);
        }
        Ok(events.len())
    }
}

async fn poll_loop<IO: AsyncIO>(inner: Arc<PollingInner>, _guard: WaitGroupGuard) {
    let done = inner.done.subscribe();
    loop {
        // done only resolves on release
        if IO::timeout(inner.interval, done.recv()).await.is_ok() {
            logger_trace!(inner.logger, "{} poll loop exit", inner);
            return;
        }
        if let Err(e) = inner.refresh() {
            logger_warn!(inner.logger, "{} poll failed: {}", inner, e);
        }
    }
}

impl fmt::Display for PollingInner {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PollingConfiguration({}/{})", self.app.app_id, self.app.namespace)
    }
}

impl DynamicConfiguration for PollingConfiguration {
    #[inline]
    fn get_url(&self) -> &Url {
        &self.inner.url
    }

    /// `key` names a namespace, empty for the configured one.
    ///
    /// A namespace holding a single file returns it as is, otherwise its properties are
    /// rendered as `key=value` lines.
    fn get_properties(&self, key: &str, _group: Option<&str>) -> Result<String, ConfigError> {
        let name = if key.is_empty() { self.inner.app.namespace.as_str() } else { key };
        let not_found = || ConfigError::NotFound(format!("nothing in namespace: {}", name));
        let ns = self.namespace(name)?.ok_or_else(not_found)?;
        if ns.is_empty() {
            return Err(not_found());
        }
        if ns.len() == 1 {
            if let Some(content) = ns.get(CONTENT_KEY) {
                return Ok(content.clone());
            }
        }
        let mut content = String::new();
        for (k, v) in ns.iter() {
            content.push_str(k);
            content.push('=');
            content.push_str(v);
            content.push('\n');
        }
        Ok(content)
    }

    #[inline]
    fn get_rule(&self, key: &str, group: Option<&str>) -> Result<String, ConfigError> {
        self.get_internal_property(key, group)
    }

    /// The property `key` of the configured namespace, empty when absent
    fn get_internal_property(
        &self, key: &str, _group: Option<&str>,
    ) -> Result<String, ConfigError> {
        let ns = self.inner.snapshot.load();
        Ok(ns.get(key).cloned().unwrap_or_default())
    }

    #[inline]
    fn publish_config(&self, _key: &str, _group: &str, _value: &str) -> Result<(), ConfigError> {
        Err(ConfigError::Unsupported("publish_config"))
    }

    #[inline]
    fn get_config_keys_by_group(&self, _group: &str) -> Result<BTreeSet<String>, ConfigError> {
        Err(ConfigError::Unsupported("get_config_keys_by_group"))
    }

    /// Registered under `group + key`
    fn add_listener(
        &self, key: &str, listener: Arc<dyn ConfigurationListener>, group: Option<&str>,
    ) {
        let key = format!("{}{}", group.unwrap_or(""), key);
        self.inner.listeners.add(&key, listener);
    }

    fn remove_listener(
        &self, key: &str, listener: &Arc<dyn ConfigurationListener>, group: Option<&str>,
    ) {
        let key = format!("{}{}", group.unwrap_or(""), key);
        self.inner.listeners.remove(&key, listener);
    }

    #[inline]
    fn is_available(&self) -> bool {
        !self.inner.done.is_released() && self.inner.source.is_connected()
    }

    async fn destroy(&self) {
        let inner = &self.inner;
        inner
            .destroy_once
            .call_once(|| async move {
                inner.done.release();
                inner.running.wait().await;
                inner.source.close();
                inner.listeners.clear();
                logger_info!(inner.logger, "{} destroyed", inner);
            })
            .await;
    }
}

impl Drop for PollingConfiguration {
    fn drop(&mut self) {
        self.inner.done.release();
    }
}
