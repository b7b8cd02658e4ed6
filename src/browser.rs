//! Browser emulation: a plain GET transport plus an explicit cookie jar.
//!
//! The site authorizes mailbox-scoped requests from cookies a real browser
//! would have accumulated after opening that mailbox, so the jar keeps those
//! values per mailbox identity instead of relying on a transport-level store.

use crate::constants::DEFAULT_HEADERS;
use crate::error::{Error, Result};
use crate::models::Config;
use chrono::Local;
use reqwest::{
    Client, ClientBuilder,
    StatusCode,
    header::{COOKIE, HeaderMap, HeaderName, HeaderValue, USER_AGENT},
};
use std::collections::{BTreeMap, HashMap};

fn build_headers(base: &[(&str, &str)], extras: &[(&str, &str)]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (k, v) in base.iter().chain(extras.iter()) {
        if let Ok(name) = HeaderName::from_bytes(k.as_bytes()) {
            if let Ok(val) = HeaderValue::from_str(v) {
                headers.insert(name, val);
            }
        }
    }
    headers
}

/// Cookies for one browsing session.
///
/// `session` holds whatever the site set through `Set-Cookie`. `identities`
/// maps a mailbox name to the values the webmail page would have stored for
/// it; the active identity is laid over the session cookies.
#[derive(Debug, Default)]
pub struct CookieJar {
    session: BTreeMap<String, String>,
    identities: HashMap<String, BTreeMap<&'static str, String>>,
    active: Option<String>,
}

impl CookieJar {
    /// Rebuild the identity cookies of `mailbox` and make it the active one.
    pub fn enter_mailbox(&mut self, mailbox: &str) {
        let time = Local::now().format("%H:%M").to_string();
        let values = BTreeMap::from([
            ("compte", mailbox.to_string()),
            ("ywm", mailbox.to_string()),
            ("ytime", time),
        ]);
        self.identities.insert(mailbox.to_string(), values);
        self.active = Some(mailbox.to_string());
    }

    /// Record a cookie received from the site.
    pub fn store(&mut self, name: &str, value: &str) {
        self.session.insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.active_identity()
            .and_then(|values| values.get(name))
            .or_else(|| self.session.get(name))
            .map(String::as_str)
    }

    fn active_identity(&self) -> Option<&BTreeMap<&'static str, String>> {
        self.active
            .as_ref()
            .and_then(|mailbox| self.identities.get(mailbox))
    }

    /// Value of the `Cookie` request header, `None` when the jar is empty.
    pub fn header(&self) -> Option<String> {
        let mut merged: BTreeMap<&str, &str> = self
            .session
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if let Some(values) = self.active_identity() {
            for (k, v) in values {
                merged.insert(k, v.as_str());
            }
        }
        if merged.is_empty() {
            return None;
        }
        Some(
            merged
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// HTTP transport that behaves like one continuous browser session.
#[derive(Debug)]
pub struct Browser {
    client: Client,
    jar: CookieJar,
    user_agent: String,
    debug: bool,
    sequence: u64,
}

impl Browser {
    pub fn new(config: &Config) -> Result<Self> {
        // Proxying is decided by the config alone, not by reqwest's env detection.
        let mut builder = ClientBuilder::new().no_proxy();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(proxy) = &config.proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            jar: CookieJar::default(),
            user_agent: config.user_agent.clone(),
            debug: config.debug,
            sequence: 0,
        })
    }

    pub fn enter_mailbox(&mut self, mailbox: &str) {
        self.jar.enter_mailbox(mailbox);
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.jar
    }

    /// GET `url` and return the response body.
    ///
    /// The running cookie jar is attached to the request and every cookie set
    /// by a successful response is merged back into it.
    pub async fn fetch(&mut self, url: &str, extra_headers: &[(&str, &str)]) -> Result<String> {
        self.sequence += 1;
        let id = self.sequence;

        let mut headers = build_headers(DEFAULT_HEADERS, extra_headers);
        if let Ok(agent) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(USER_AGENT, agent);
        }
        if let Some(cookie) = self.jar.header() {
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                headers.insert(COOKIE, value);
            }
        }

        if self.debug {
            log::debug!("{}", request_dump(id, url, &headers));
        }

        let transport = |source| Error::Transport {
            url: url.to_string(),
            source,
        };
        let resp = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(transport)?;
        let status = resp.status();
        let received: Vec<(String, String)> = resp
            .cookies()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();
        let response_headers = self.debug.then(|| resp.headers().clone());
        let body = resp.text().await.map_err(transport)?;

        if let Some(response_headers) = response_headers {
            log::debug!("{}", response_dump(id, status, &response_headers, &body));
        }

        if !(status.is_success() || status.as_u16() == 300) {
            return Err(Error::Status {
                url: url.to_string(),
                status,
                body,
            });
        }

        for (name, value) in &received {
            self.jar.store(name, value);
        }
        log::trace!("fetched {url} ({} bytes, {} cookies)", body.len(), received.len());
        Ok(body)
    }
}

fn request_dump(id: u64, url: &str, headers: &HeaderMap) -> String {
    format!("---- REQUEST {id} ----\nGET {url}\n{}", dump_headers(headers))
}

fn response_dump(id: u64, status: StatusCode, headers: &HeaderMap, body: &str) -> String {
    format!("---- RESPONSE {id} ----\n{status}\n{}\n{body}", dump_headers(headers))
}

fn dump_headers(headers: &HeaderMap) -> String {
    headers
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v.to_str().unwrap_or("<binary>")))
        .collect::<Vec<_>>()
        .join("\n")
}
