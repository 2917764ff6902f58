use crate::DynamicConfiguration;
use crate::listener::ConfigurationListener;
use relay_rpc_core::Url;
use relay_rpc_core::error::ConfigError;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Holds nothing: reads find nothing, publishing is accepted and dropped, listeners never fire.
pub struct NopConfiguration {
    url: Url,
    destroyed: AtomicBool,
}

impl NopConfiguration {
    pub fn new(url: Url) -> Self {
        Self { url, destroyed: AtomicBool::new(false) }
    }
}

impl DynamicConfiguration for NopConfiguration {
    #[inline]
    fn get_url(&self) -> &Url {
        &self.url
    }

    #[inline]
    fn get_properties(&self, key: &str, _group: Option<&str>) -> Result<String, ConfigError> {
        Err(ConfigError::NotFound(key.to_string()))
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

    #[inline]
    fn publish_config(&self, _key: &str, _group: &str, _value: &str) -> Result<(), ConfigError> {
        Ok(())
    }

    #[inline]
    fn get_config_keys_by_group(&self, group: &str) -> Result<BTreeSet<String>, ConfigError> {
        Err(ConfigError::NotFound(format!("could not find keys with group: {}", group)))
    }

    #[inline]
    fn add_listener(
        &self, _key: &str, _listener: Arc<dyn ConfigurationListener>, _group: Option<&str>,
    ) {
    }

    #[inline]
    fn remove_listener(
        &self, _key: &str, _listener: &Arc<dyn ConfigurationListener>, _group: Option<&str>,
    ) {
    }

    #[inline]
    fn is_available(&self) -> bool {
        !self.destroyed.load(Ordering::Acquire)
    }

    async fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
    }
}
