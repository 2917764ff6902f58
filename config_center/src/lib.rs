//! # relay-rpc-config-center
//!
//! Dynamic configuration backends: startup configuration and governance rules pulled from a
//! key/value store, with listeners notified on change.
//!
//! Three variants share the [DynamicConfiguration] contract:
//!
//! - [WatchConfiguration]: a zookeeper-like store which pushes node changes ([KvStore]).
//! - [PollingConfiguration]: an apollo-like namespace server, polled for changes ([ConfigSource]).
//! - [NopConfiguration]: nothing stored, nothing published.
//!
//! [ConfigCenter] selects the variant once from the scheme of the config center url.

#[macro_use]
extern crate captains_log;

pub mod kv;
mod listener;
mod nop;
mod polling;
pub mod source;
mod watch;

pub use kv::{KvEvent, KvStore, MemoryKvStore};
pub use listener::*;
pub use nop::NopConfiguration;
pub use polling::{AppConfig, PollingConfiguration};
pub use source::{ConfigSource, MemoryConfigSource};
pub use watch::WatchConfiguration;

use relay_rpc_core::Url;
use relay_rpc_core::error::ConfigError;
use relay_rpc_core::runtime::AsyncIO;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

pub trait DynamicConfiguration: Send + Sync + 'static {
    fn get_url(&self) -> &Url;

    /// Raw value of a configuration entry.
    ///
    /// With a group this is a startup configuration (`dubbo` / `dubbo.properties`), without
    /// it a governance rule (`org.apache.dubbo.DemoService.configurators`).
    fn get_properties(&self, key: &str, group: Option<&str>) -> Result<String, ConfigError>;

    fn get_rule(&self, key: &str, group: Option<&str>) -> Result<String, ConfigError>;

    fn get_internal_property(&self, key: &str, group: Option<&str>)
    -> Result<String, ConfigError>;

    /// An empty group means the default one
    fn publish_config(&self, key: &str, group: &str, value: &str) -> Result<(), ConfigError>;

    /// `NotFound` when the group holds no key
    fn get_config_keys_by_group(&self, group: &str) -> Result<BTreeSet<String>, ConfigError>;

    fn add_listener(
        &self, key: &str, listener: Arc<dyn ConfigurationListener>, group: Option<&str>,
    );

    fn remove_listener(
        &self, key: &str, listener: &Arc<dyn ConfigurationListener>, group: Option<&str>,
    );

    fn is_available(&self) -> bool;

    /// Stop background work and close the store.
    ///
    /// Only the first call tears down, concurrent callers return after it completes.
    fn destroy(&self) -> impl Future<Output = ()> + Send;
}

/// The stores a [ConfigCenter] may be built on
#[derive(Default, Clone)]
pub struct Backends {
    pub kv: Option<Arc<dyn KvStore>>,
    pub source: Option<Arc<dyn ConfigSource>>,
}

impl Backends {
    #[inline]
    pub fn with_kv(kv: Arc<dyn KvStore>) -> Self {
        Self { kv: Some(kv), source: None }
    }

    #[inline]
    pub fn with_source(source: Arc<dyn ConfigSource>) -> Self {
        Self { kv: None, source: Some(source) }
    }
}

pub enum ConfigCenter {
    Watch(WatchConfiguration),
    Polling(PollingConfiguration),
    Nop(NopConfiguration),
}

macro_rules! dispatch {
    ($self: expr, $c: ident => $e: expr) => {
        match $self {
            ConfigCenter::Watch($c) => $e,
            ConfigCenter::Polling($c) => $e,
            ConfigCenter::Nop($c) => $e,
        }
    };
}

impl ConfigCenter {
    /// Choose the backend by the scheme of `url`:
    /// `zookeeper`, `etcd`, `watch` over `backends.kv`; `apollo`, `polling` over
    /// `backends.source`; `nop`, `none` without store.
    pub fn new<IO: AsyncIO>(url: Url, rt: &IO, backends: Backends) -> Result<Self, ConfigError> {
        match url.protocol() {
            "zookeeper" | "etcd" | "watch" => {
                let Some(kv) = backends.kv else {
                    return Err(ConfigError::Backend(format!("no kv store for {}", url)));
                };
                Ok(Self::Watch(WatchConfiguration::new(url, kv, rt)?))
            }
            "apollo" | "polling" => {
                let Some(source) = backends.source else {
                    return Err(ConfigError::Backend(format!("no config source for {}", url)));
                };
                Ok(Self::Polling(PollingConfiguration::new(url, source, rt)?))
            }
            "nop" | "none" => Ok(Self::Nop(NopConfiguration::new(url))),
            _ => Err(ConfigError::Unsupported("config center protocol")),
        }
    }
}

impl DynamicConfiguration for ConfigCenter {
    #[inline]
    fn get_url(&self) -> &Url {
        dispatch!(self, c => c.get_url())
    }

    #[inline]
    fn get_properties(&self, key: &str, group: Option<&str>) -> Result<String, ConfigError> {
        dispatch!(self, c => c.get_properties(key, group))
    }

    #[inline]
    fn get_rule(&self, key: &str, group: Option<&str>) -> Result<String, ConfigError> {
        dispatch!(self, c => c.get_rule(key, group))
    }

    #[inline]
    fn get_internal_property(
        &self, key: &str, group: Option<&str>,
    ) -> Result<String, ConfigError> {
        dispatch!(self, c => c.get_internal_property(key, group))
    }

    #[inline]
    fn publish_config(&self, key: &str, group: &str, value: &str) -> Result<(), ConfigError> {
        dispatch!(self, c => c.publish_config(key, group, value))
    }

    #[inline]
    fn get_config_keys_by_group(&self, group: &str) -> Result<BTreeSet<String>, ConfigError> {
        dispatch!(self, c => c.get_config_keys_by_group(group))
    }

    #[inline]
    fn add_listener(
        &self, key: &str, listener: Arc<dyn ConfigurationListener>, group: Option<&str>,
    ) {
        dispatch!(self, c => c.add_listener(key, listener, group))
    }

    #[inline]
    fn remove_listener(
        &self, key: &str, listener: &Arc<dyn ConfigurationListener>, group: Option<&str>,
    ) {
        dispatch!(self, c => c.remove_listener(key, listener, group))
    }

    #[inline]
    fn is_available(&self) -> bool {
        dispatch!(self, c => c.is_available())
    }

    async fn destroy(&self) {
        dispatch!(self, c => c.destroy().await)
    }
}
