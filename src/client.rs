use crate::browser::Browser;
use crate::constants::*;
use crate::decorator::Decorator;
use crate::error::{Error, Result};
use crate::models::Config;
use regex::Regex;
use scraper::Html;
use std::sync::LazyLock;
use std::time::Duration;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<script src="/ver/([0-9.]+)/webmail.js">"#).unwrap());

// Emitted by the webmail page whenever the listing renders normally.
static INBOX_OK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"w\.finrmail\(\d+,\s*\d+,\s*\d+,\s*\d+,\s*\d+,\s*'alt\.[^']+',\s*'.*?'\)|Loading \.\.\.")
        .unwrap()
});

const MAIL_CHALLENGE: &str = "window.showRc()";

/// Rendering of a message requested from the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MailKind {
    /// Site-rendered HTML view.
    #[default]
    Html,
    /// Raw MIME source.
    Source,
}

impl MailKind {
    /// One-letter prefix the message endpoint expects in front of the id.
    pub fn prefix(self) -> &'static str {
        match self {
            MailKind::Html => "m",
            MailKind::Source => "s",
        }
    }
}

/// A fetched message page, tagged with the rendering it was requested in.
#[derive(Debug)]
pub enum MailDocument {
    Html(Html),
    Source(Html),
}

impl MailDocument {
    pub fn kind(&self) -> MailKind {
        match self {
            MailDocument::Html(_) => MailKind::Html,
            MailDocument::Source(_) => MailKind::Source,
        }
    }
}

/// Typed façade over the Yopmail webmail endpoints.
///
/// Every protected call harvests fresh tokens through the [`Decorator`],
/// refreshes the mailbox cookies and checks the answer for a CAPTCHA.
#[derive(Debug)]
pub struct YopmailClient {
    base_url: String,
    browser: Browser,
    decorator: Decorator,
    page_delay: Duration,
}

impl YopmailClient {
    /// Create a builder for configuring the client.
    pub fn builder() -> YopmailClientBuilder {
        YopmailClientBuilder::new()
    }

    /// Create a client from the process environment.
    pub async fn new() -> Result<Self> {
        YopmailClientBuilder::from_config(Config::from_env()?).build().await
    }

    /// Site version negotiated at construction time.
    pub fn api_version(&self) -> &str {
        self.decorator.version()
    }

    pub fn page_delay(&self) -> Duration {
        self.page_delay
    }

    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Fetch listing page `page` (1-based) of `mailbox`.
    pub async fn get_mails_page(&mut self, mailbox: &str, page: usize) -> Result<Html> {
        let page = page.to_string();
        let url = self
            .decorator
            .decorate(
                &mut self.browser,
                LIST_QUERY,
                true,
                &[("login", mailbox), ("p", page.as_str())],
            )
            .await?;
        let body = self.fetch_inbox(mailbox, &url).await?;
        log::debug!("fetched page {page} of {mailbox}");
        Ok(Html::parse_document(&body))
    }

    /// Fetch message `mail_id` of `mailbox` in the requested rendering.
    pub async fn get_mail_page(
        &mut self,
        mailbox: &str,
        mail_id: &str,
        kind: MailKind,
    ) -> Result<MailDocument> {
        let id = format!("{}{}", kind.prefix(), mail_id);
        let url = self
            .decorator
            .decorate(&mut self.browser, MAIL_PATH, false, &[("b", mailbox), ("id", id.as_str())])
            .await?;

        self.browser.enter_mailbox(mailbox);
        let referer = format!("{}/{}/wm", self.base_url, LOCALE);
        let mut headers = vec![("referer", referer.as_str())];
        headers.extend_from_slice(MAIL_HEADERS);
        let body = self.browser.fetch(&url, &headers).await?;
        check_mail_captcha(&url, &body)?;

        let doc = Html::parse_document(&body);
        Ok(match kind {
            MailKind::Html => MailDocument::Html(doc),
            MailKind::Source => MailDocument::Source(doc),
        })
    }

    /// Delete message `mail_id` of `mailbox`.
    pub async fn delete_mail(&mut self, mailbox: &str, mail_id: &str) -> Result<()> {
        let url = self
            .decorator
            .decorate(
                &mut self.browser,
                DELETE_QUERY,
                true,
                &[("login", mailbox), ("d", inbox_id(mail_id))],
            )
            .await?;
        self.fetch_inbox(mailbox, &url).await?;
        log::info!("deleted mail {mail_id} from {mailbox}");
        Ok(())
    }

    /// Delete every message of `mailbox`.
    ///
    /// The endpoint refuses to flush without a control id, so one existing
    /// message id must be supplied.
    pub async fn flush_mail(&mut self, mailbox: &str, any_mail_id: &str) -> Result<()> {
        let url = self
            .decorator
            .decorate(
                &mut self.browser,
                FLUSH_QUERY,
                true,
                &[("login", mailbox), ("ctrl", inbox_id(any_mail_id))],
            )
            .await?;
        self.fetch_inbox(mailbox, &url).await?;
        log::info!("flushed {mailbox}");
        Ok(())
    }

    async fn fetch_inbox(&mut self, mailbox: &str, url: &str) -> Result<String> {
        self.browser.enter_mailbox(mailbox);
        let referer = format!("{}/wm", self.base_url);
        let mut headers = vec![("referer", referer.as_str())];
        headers.extend_from_slice(INBOX_HEADERS);
        let body = self.browser.fetch(url, &headers).await?;
        check_inbox_captcha(url, &body)?;
        Ok(body)
    }
}

/// Inbox endpoints address a message without the kind letter the message
/// endpoint uses, so leading `m` characters are dropped.
fn inbox_id(mail_id: &str) -> &str {
    mail_id.trim_start_matches('m')
}

fn parse_api_version(body: &str) -> Result<String> {
    VERSION_RE
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or(Error::VersionMissing)
}

fn check_inbox_captcha(url: &str, body: &str) -> Result<()> {
    if INBOX_OK_RE.is_match(body) {
        Ok(())
    } else {
        log::warn!("listing page lacks its rendering marker, a CAPTCHA is likely active");
        Err(Error::Captcha { url: url.to_string() })
    }
}

fn check_mail_captcha(url: &str, body: &str) -> Result<()> {
    if body.contains(MAIL_CHALLENGE) {
        log::warn!("mail page asks for a CAPTCHA");
        Err(Error::Captcha { url: url.to_string() })
    } else {
        Ok(())
    }
}

/// Builder for configuring a [`YopmailClient`].
#[derive(Debug, Clone, Default)]
pub struct YopmailClientBuilder {
    config: Config,
}

impl YopmailClientBuilder {
    /// Builder with default settings, ignoring the environment.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Override the site origin. Useful for testing.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    /// Set a proxy URL (e.g., "http://127.0.0.1:8080").
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.config.proxy_url = Some(proxy.into());
        self
    }

    /// Per-request timeout. A zero duration disables it.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Override the default user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Dump every request and response at `debug` level.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    /// Reuse harvested tokens for `ttl` instead of re-deriving them before
    /// every protected request.
    pub fn token_ttl(mut self, ttl: Duration) -> Self {
        self.config.token_ttl = Some(ttl);
        self
    }

    pub fn page_delay(mut self, delay: Duration) -> Self {
        self.config.page_delay = delay;
        self
    }

    /// Build the client and negotiate the site version.
    ///
    /// This performs one request to the site root.
    pub async fn build(self) -> Result<YopmailClient> {
        let base_url = self.config.base_url.trim_end_matches('/').to_string();
        let mut browser = Browser::new(&self.config)?;

        let root = browser.fetch(&base_url, &[]).await?;
        let version = parse_api_version(&root)?;
        log::debug!("negotiated site version {version}");

        Ok(YopmailClient {
            decorator: Decorator::new(base_url.clone(), version, self.config.token_ttl),
            base_url,
            browser,
            page_delay: self.config.page_delay,
        })
    }
}
