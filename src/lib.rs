//! Unofficial client for Yopmail disposable inboxes.

pub mod browser;
pub mod client;
pub mod constants;
pub mod decorator;
pub mod error;
pub mod inbox;
pub mod mail;
pub mod models;
pub mod render;

pub use client::{MailDocument, MailKind, YopmailClient, YopmailClientBuilder};
pub use constants::{DEFAULT_HEADERS, DEFAULT_TIMEOUT_SECS, default_timeout};
pub use error::{Error, Result};
pub use inbox::{Inbox, InboxItem, check_offset, normalize_mailbox, parse_offset};
pub use mail::{HtmlMail, Mail, SourceMail};
pub use models::{Config, Sender};
pub use render::Render;
