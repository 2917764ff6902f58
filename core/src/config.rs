use crate::constant::*;
use crate::url::{Url, parse_duration};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::time::Duration;

/// Consumer-level defaults, the outermost layer of the timeout cascade
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Default timeout of an invocation, overridden by the `timeout` param of the target url
    #[serde(deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self { request_timeout: Duration::from_secs(3) }
    }
}

/// Handed to the transport when an exchange client is built
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// A transport not connected within this time reports itself unavailable
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { connect_timeout: Duration::from_secs(10) }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::AsRefStr)]
pub enum Role {
    #[strum(serialize = "0")]
    Consumer,
    #[strum(serialize = "1")]
    Provider,
}

/// Connection settings of one registry, keyed by registry id in the user configuration
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub protocol: String,
    pub timeout: String,
    pub group: String,
    pub namespace: String,
    /// A single address or a comma separated list, optionally with a scheme
    pub address: String,
    pub username: String,
    pub password: String,
    pub params: HashMap<String, String>,
}

impl RegistryConfig {
    /// Split an address like `nacos://127.0.0.1:8848` into protocol and address.
    pub fn translate_registry_address(&mut self) {
        if let Some((protocol, address)) = self.address.split_once("://") {
            self.protocol = protocol.to_string();
            self.address = address.to_string();
        }
    }

    /// Build the registry url, the location keeps the address list verbatim.
    pub fn to_url(&self, role: Role) -> Url {
        let mut url = Url::new(REGISTRY_PROTOCOL, &self.address)
            .with_credentials(&self.username, &self.password)
            .with_param(REGISTRY_KEY, &self.protocol)
            .with_param(REGISTRY_ROLE_KEY, role.as_ref());
        for (k, v) in [
            (REGISTRY_GROUP_KEY, &self.group),
            (REGISTRY_TIMEOUT_KEY, &self.timeout),
            (REGISTRY_NAMESPACE_KEY, &self.namespace),
        ] {
            if !v.is_empty() {
                url.set_param(k, v);
            }
        }
        for (k, v) in self.params.iter() {
            url.set_param(k, v);
        }
        url
    }
}

/// Select the registries named in `targets` and build their urls, ordered by registry id.
///
/// An empty target list (or a single empty id) selects every registry.
pub fn load_registries(
    targets: &[String], registries: &HashMap<String, RegistryConfig>, role: Role,
) -> Vec<Url> {
    let select_all = targets.is_empty() || (targets.len() == 1 && targets[0].is_empty());
    let mut ids: Vec<&String> = registries
        .keys()
        .filter(|id| select_all || targets.iter().any(|t| t == *id))
        .collect();
    ids.sort();
    let mut urls = Vec::with_capacity(ids.len());
    for id in ids {
        let mut reg = registries[id].clone();
        reg.translate_registry_address();
        if reg.address.is_empty() {
            log::warn!("registry {} has empty address, skipped", id);
            continue;
        }
        urls.push(reg.to_url(role));
    }
    urls
}

fn deserialize_duration<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    let s = String::deserialize(d)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}
