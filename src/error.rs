//! Error types for the Yopmail client.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
/// Error type for all client and inbox operations.
pub enum Error {
    /// The HTTP client could not be set up (bad proxy URL, TLS backend).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// Connection, DNS, or timeout failure while talking to the site.
    #[error("failure when fetching {url} : {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// HTTP response returned a non-success status with body.
    #[error("failure when fetching {url} : request failed with error code {} and body {body}", .status.as_u16())]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
    /// An anti-automation token could not be harvested; the site markup changed.
    #[error("failure when fetching {token} value from {url}")]
    TokenMissing { token: &'static str, url: String },
    /// The site version could not be read from the root page.
    #[error("api version could not be extracted")]
    VersionMissing,
    /// A request URL could not be assembled.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    /// The site asks for an interactive verification.
    #[error(
        "failure when trying to access content at {url} : a CAPTCHA is probably activated, look to the web interface"
    )]
    Captcha { url: String },
    /// Offset supplied by the caller is not an integer.
    #[error(r#"offset "{0}" must be an integer"#)]
    InvalidOffset(String),
    /// Offset supplied by the caller is zero or negative.
    #[error(r#"offset "{0}" must be greater than 0"#)]
    OffsetNotPositive(i64),
    /// Offset points past the fetched inbox.
    #[error("lower your offset value")]
    OffsetOutOfRange { offset: usize, count: usize },
    #[error("inbox is empty")]
    EmptyInbox,
    /// JSON encoding of an in-memory value failed.
    #[error("something wrong occurred")]
    Serialization(#[source] serde_json::Error),
    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn is_captcha(&self) -> bool {
        matches!(self, Error::Captcha { .. })
    }

    /// Errors caused by caller input rather than by the remote site.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidOffset(_)
                | Error::OffsetNotPositive(_)
                | Error::OffsetOutOfRange { .. }
                | Error::EmptyInbox
        )
    }
}

/// Result type for Yopmail client operations.
pub type Result<T> = std::result::Result<T, Error>;
