//! The target identity of an invoker, a registry or a configuration backend.
//!
//! A [Url] looks like `protocol://[user[:password]@]location[/path][?k=v&k2=v2]`, where the
//! location is `host:port`, or a verbatim comma separated address list for clusters such as
//! `127.0.0.2:2181,128.0.0.1:2181`.
//!
//! The query is `application/x-www-form-urlencoded`: params are decoded on parse and encoded
//! on display, the location is kept verbatim.

use crate::constant::*;
use crate::error::UrlError;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use ::url::form_urlencoded;

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Url {
    protocol: String,
    location: String,
    path: String,
    username: String,
    password: String,
    params: BTreeMap<String, String>,
}

impl Url {
    #[inline]
    pub fn new(protocol: &str, location: &str) -> Self {
        Self { protocol: protocol.to_string(), location: location.to_string(), ..Default::default() }
    }

    pub fn parse(s: &str) -> Result<Self, UrlError> {
        let s = s.trim();
        let Some((protocol, rest)) = s.split_once("://") else {
            return Err(UrlError::MissingScheme(s.to_string()));
        };
        if protocol.is_empty() {
            return Err(UrlError::MissingScheme(s.to_string()));
        }
        let (rest, query) = match rest.split_once('?') {
            Some((r, q)) => (r, Some(q)),
            None => (rest, None),
        };
        let (authority, path) = match rest.split_once('/') {
            Some((a, p)) => (a, p),
            None => (rest, ""),
        };
        let mut url = Self::new(protocol, authority);
        if let Some((user_info, location)) = authority.rsplit_once('@') {
            url.location = location.to_string();
            match user_info.split_once(':') {
                Some((user, password)) => {
                    url.username = user.to_string();
                    url.password = password.to_string();
                }
                None => url.username = user_info.to_string(),
            }
        }
        url.path = path.to_string();
        if let Some(query) = query {
            for (k, v) in form_urlencoded::parse(query.as_bytes()) {
                if k.is_empty() {
                    return Err(UrlError::InvalidParam(format!("={}", v)));
                }
                url.params.insert(k.into_owned(), v.into_owned());
            }
        }
        Ok(url)
    }

    #[inline]
    pub fn with_path(mut self, path: &str) -> Self {
        self.path = path.trim_start_matches('/').to_string();
        self
    }

    #[inline]
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.username = username.to_string();
        self.password = password.to_string();
        self
    }

    #[inline]
    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.set_param(key, value);
        self
    }

    #[inline]
    pub fn set_param(&mut self, key: &str, value: &str) {
        self.params.insert(key.to_string(), value.to_string());
    }

    #[inline]
    pub fn remove_param(&mut self, key: &str) -> Option<String> {
        self.params.remove(key)
    }

    #[inline]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    #[inline]
    pub fn location(&self) -> &str {
        &self.location
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[inline]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// The host part of a single-address location
    pub fn ip(&self) -> &str {
        match self.location.rsplit_once(':') {
            Some((ip, _)) => ip,
            None => &self.location,
        }
    }

    /// The port of a single-address location, None when absent or not numeric
    pub fn port(&self) -> Option<u16> {
        self.location.rsplit_once(':').and_then(|(_, p)| p.parse().ok())
    }

    /// Parameters in key order
    #[inline]
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[inline]
    pub fn get_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|v| v.as_str())
    }

    #[inline]
    pub fn get_param_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_param(key).unwrap_or(default)
    }

    /// Returns `default` when the parameter is absent or not a boolean
    pub fn get_param_bool(&self, key: &str, default: bool) -> bool {
        match self.get_param(key) {
            Some(v) => parse_bool(v).unwrap_or(default),
            None => default,
        }
    }

    /// Returns `default` when the parameter is absent or not a duration
    pub fn get_param_duration(&self, key: &str, default: Duration) -> Duration {
        match self.get_param(key) {
            Some(v) => parse_duration(v).unwrap_or(default),
            None => default,
        }
    }

    /// Lookup the method-level parameter `methods.<method>.<key>`
    #[inline]
    pub fn get_method_param(&self, method: &str, key: &str) -> Option<&str> {
        self.get_param(&format!("{}.{}.{}", METHOD_KEYS, method, key))
    }

    /// Identity of the remote endpoint, which decides connection sharing.
    #[inline]
    pub fn endpoint_key(&self) -> String {
        format!("{}://{}", self.protocol, self.location)
    }

    /// `[group/]interface[:version]`, interface falls back to the path
    pub fn service_key(&self) -> String {
        let interface = match self.get_param(INTERFACE_KEY) {
            Some(i) if !i.is_empty() => i,
            _ => self.path.as_str(),
        };
        let mut key = String::with_capacity(interface.len() + 16);
        if let Some(group) = self.get_param(GROUP_KEY).filter(|g| !g.is_empty()) {
            key.push_str(group);
            key.push('/');
        }
        key.push_str(interface);
        if let Some(version) = self.get_param(VERSION_KEY).filter(|v| !v.is_empty()) {
            key.push(':');
            key.push_str(version);
        }
        key
    }
}

impl FromStr for Url {
    type Err = UrlError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}://", self.protocol)?;
        if !self.username.is_empty() {
            write!(f, "{}", self.username)?;
            if !self.password.is_empty() {
                write!(f, ":{}", self.password)?;
            }
            write!(f, "@")?;
        }
        write!(f, "{}", self.location)?;
        if !self.path.is_empty() {
            write!(f, "/{}", self.path)?;
        }
        if !self.params.is_empty() {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.params.iter())
                .finish();
            write!(f, "?{}", query)?;
        }
        Ok(())
    }
}

// Credentials never reach the logs
impl fmt::Debug for Url {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}://{}/{}", self.protocol, self.location, self.path)
    }
}

/// Accepts 1, t, T, TRUE, true, True, 0, f, F, FALSE, false, False.
pub fn parse_bool(s: &str) -> Result<bool, UrlError> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(UrlError::InvalidBool(s.to_string())),
    }
}

/// Parse a duration string such as `300ms`, `1.5s` or `1m30s`.
///
/// Every number must carry a unit among `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`,
/// except for a bare `0`. Negative durations are rejected.
pub fn parse_duration(s: &str) -> Result<Duration, UrlError> {
    let input = s.trim();
    let invalid = || UrlError::InvalidDuration(s.to_string());
    if input == "0" {
        return Ok(Duration::ZERO);
    }
    if input.is_empty() {
        return Err(invalid());
    }
    let mut rest = input.strip_prefix('+').unwrap_or(input);
    let mut nanos = 0f64;
    while !rest.is_empty() {
        let num_end = rest.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(rest.len());
        if num_end == 0 {
            return Err(invalid());
        }
        let (num, tail) = rest.split_at(num_end);
        let unit_end = tail.find(|c: char| c.is_ascii_digit() || c == '.').unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        let scale = match unit {
            "ns" => 1f64,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return Err(invalid()),
        };
        let value: f64 = num.parse().map_err(|_| invalid())?;
        nanos += value * scale;
        rest = tail;
    }
    if !nanos.is_finite() || nanos > u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(Duration::from_nanos(nanos.round() as u64))
}
