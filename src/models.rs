//! Shared data models: client configuration and mail sender.

use crate::constants::{
    BASE_URL, DEFAULT_USER_AGENT, ENV_PROXIES, ENV_REQUEST_TIMEOUT, ENV_USER_AGENT,
    default_page_delay, default_timeout,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Transport and behaviour settings for a [`crate::YopmailClient`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Site origin, without trailing slash.
    pub base_url: String,
    /// Per-request timeout. `None` lets a request wait indefinitely.
    pub timeout: Option<Duration>,
    /// Proxy applied to every request.
    pub proxy_url: Option<String>,
    pub user_agent: String,
    /// Dump every request and response through the `log` facade.
    pub debug: bool,
    /// How long harvested tokens stay valid. `None` re-derives them before
    /// every protected request.
    pub token_ttl: Option<Duration>,
    /// Pause between two listing page fetches.
    pub page_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            timeout: Some(default_timeout()),
            proxy_url: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            debug: false,
            token_ttl: None,
            page_delay: default_page_delay(),
        }
    }
}

impl Config {
    /// Build a configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Reads the request timeout override (integer seconds, 0 disables it), the user agent
    /// override and the first non-empty proxy variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT).filter(|v| !v.is_empty()) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                Error::Config(format!("{ENV_REQUEST_TIMEOUT} must be an integer, got {raw:?}"))
            })?;
            config.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(agent) = lookup(ENV_USER_AGENT).filter(|v| !v.is_empty()) {
            config.user_agent = agent;
        }

        config.proxy_url = ENV_PROXIES
            .iter()
            .filter_map(|key| lookup(key))
            .find(|value| !value.is_empty());

        Ok(config)
    }
}

/// Sender of a message. Either part may be empty when the site only shows one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mail: String,
}

impl Sender {
    /// Human display: `name <mail>`, `name`, `mail`, or `None` when both are empty.
    pub fn display(&self) -> Option<String> {
        match (self.name.is_empty(), self.mail.is_empty()) {
            (false, false) => Some(format!("{} <{}>", self.name, self.mail)),
            (false, true) => Some(self.name.clone()),
            (true, false) => Some(self.mail.clone()),
            (true, true) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.base_url, BASE_URL);
        assert_eq!(config.timeout, Some(Duration::from_secs(10)));
        assert!(config.proxy_url.is_none());
        assert!(config.token_ttl.is_none());
    }

    #[test]
    fn environment_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("YOGO_REQUEST_TIMEOUT", "3"),
            ("YOGO_USER_AGENT", "test-agent"),
            ("http_proxy", ""),
            ("HTTPS_PROXY", "http://127.0.0.1:3128"),
        ]))
        .unwrap();
        assert_eq!(config.timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.proxy_url.as_deref(), Some("http://127.0.0.1:3128"));
    }

    #[test]
    fn http_proxy_wins_over_https_proxy() {
        let config = Config::from_lookup(lookup(&[
            ("HTTP_PROXY", "http://first:1"),
            ("HTTPS_PROXY", "http://second:2"),
        ]))
        .unwrap();
        assert_eq!(config.proxy_url.as_deref(), Some("http://first:1"));
    }

    #[test]
    fn zero_timeout_disables_it() {
        let config = Config::from_lookup(lookup(&[("YOGO_REQUEST_TIMEOUT", "0")])).unwrap();
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn non_integer_timeout_is_rejected() {
        let err = Config::from_lookup(lookup(&[("YOGO_REQUEST_TIMEOUT", "ten")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn sender_display() {
        let both = Sender { name: "John".into(), mail: "john@doe.com".into() };
        assert_eq!(both.display().as_deref(), Some("John <john@doe.com>"));
        let mail = Sender { name: String::new(), mail: "john@doe.com".into() };
        assert_eq!(mail.display().as_deref(), Some("john@doe.com"));
        assert_eq!(Sender::default().display(), None);
    }

    #[test]
    fn sender_json_omits_empty_parts() {
        let sender = Sender { name: String::new(), mail: "a@b.c".into() };
        let json = serde_json::to_string(&sender).unwrap();
        assert_eq!(json, r#"{"mail":"a@b.c"}"#);
        let back: Sender = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sender);
    }
}
