//! Authenticated URL construction for token-protected endpoints.

use crate::browser::Browser;
use crate::constants::LOCALE;
use crate::error::{Error, Result};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use url::Url;

static YJ_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&yj=(.*?)&").unwrap());

/// The two anti-automation tokens the site expects on protected requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokens {
    /// Hidden form field of the root page.
    pub yp: String,
    /// Embedded in the versioned webmail script.
    pub yj: String,
}

#[derive(Debug)]
struct CachedTokens {
    tokens: Tokens,
    harvested_at: Instant,
}

/// Builds URLs carrying freshly harvested tokens.
#[derive(Debug)]
pub struct Decorator {
    base_url: String,
    version: String,
    ttl: Option<Duration>,
    cached: Option<CachedTokens>,
}

impl Decorator {
    pub fn new(base_url: impl Into<String>, version: impl Into<String>, ttl: Option<Duration>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            version: version.into(),
            ttl,
            cached: None,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Return the tokens to use now, harvesting them unless a cached pair is
    /// still inside its validity window.
    pub async fn tokens(&mut self, browser: &mut Browser) -> Result<Tokens> {
        if let (Some(ttl), Some(cached)) = (self.ttl, &self.cached) {
            if cached.harvested_at.elapsed() < ttl {
                return Ok(cached.tokens.clone());
            }
        }

        let root = browser.fetch(&self.base_url, &[]).await?;
        let yp = extract_yp(&root).ok_or_else(|| Error::TokenMissing {
            token: "yp",
            url: self.base_url.clone(),
        })?;

        let script_url = format!("{}/ver/{}/webmail.js", self.base_url, self.version);
        let script = browser.fetch(&script_url, &[]).await?;
        let yj = extract_yj(&script).ok_or_else(|| Error::TokenMissing {
            token: "yj",
            url: script_url.clone(),
        })?;

        let tokens = Tokens { yp, yj };
        if self.ttl.is_some() {
            self.cached = Some(CachedTokens {
                tokens: tokens.clone(),
                harvested_at: Instant::now(),
            });
        }
        Ok(tokens)
    }

    /// Turn a relative endpoint path (optionally carrying its own base query)
    /// into an absolute authenticated URL.
    ///
    /// Tokens and version are merged first unless `with_defaults` is false,
    /// then `params`, which overwrite any key already present.
    pub async fn decorate(
        &mut self,
        browser: &mut Browser,
        path: &str,
        with_defaults: bool,
        params: &[(&str, &str)],
    ) -> Result<String> {
        let tokens = self.tokens(browser).await?;
        self.assemble(path, with_defaults.then_some(&tokens), params)
    }

    fn assemble(&self, path: &str, tokens: Option<&Tokens>, params: &[(&str, &str)]) -> Result<String> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, path.trim_start_matches('/')))?;

        let mut query: BTreeMap<String, String> = url.query_pairs().into_owned().collect();
        if let Some(tokens) = tokens {
            query.insert("yp".into(), tokens.yp.clone());
            query.insert("yj".into(), tokens.yj.clone());
            query.insert("v".into(), self.version.clone());
        }
        for (k, v) in params {
            query.insert(k.to_string(), v.to_string());
        }

        let localized = format!("/{}{}", LOCALE, url.path());
        url.set_path(&localized);
        url.query_pairs_mut().clear().extend_pairs(query.iter());
        Ok(url.to_string())
    }
}

fn extract_yp(body: &str) -> Option<String> {
    let doc = Html::parse_document(body);
    let selector = Selector::parse("#yp").ok()?;
    doc.select(&selector)
        .filter_map(|node| node.value().attr("value"))
        .last()
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn extract_yj(body: &str) -> Option<String> {
    YJ_RE
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
