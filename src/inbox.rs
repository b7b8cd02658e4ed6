//! A mailbox view: paginated listing plus the mutations that keep it in sync
//! with the site.

use crate::client::{MailKind, YopmailClient};
use crate::constants::{ITEMS_PER_PAGE, NO_DATA};
use crate::error::{Error, Result};
use crate::mail::{self, Mail};
use crate::models::Sender;
use crate::render::{Palette, Render, json};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

const SPAM_MARKER: &str = "[SPAM]";

/// Summary of one message as shown in the listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboxItem {
    /// Opaque message identifier.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Sender>,
    #[serde(default)]
    pub subject: String,
    #[serde(rename = "isSPAM", default)]
    pub is_spam: bool,
}

/// The current view of one mailbox.
#[derive(Debug, Serialize)]
pub struct Inbox {
    name: String,
    #[serde(rename = "mails")]
    items: Vec<InboxItem>,
    #[serde(skip)]
    client: YopmailClient,
}

impl Inbox {
    /// Open the view of `name`, normalized with [`normalize_mailbox`].
    pub fn new(name: &str, client: YopmailClient) -> Self {
        Self {
            name: normalize_mailbox(name),
            items: Vec::new(),
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of messages currently held.
    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[InboxItem] {
        &self.items
    }

    pub fn add(&mut self, item: InboxItem) {
        self.items.push(item);
    }

    /// Keep at most `limit` messages.
    pub fn shrink(&mut self, limit: usize) {
        self.items.truncate(limit);
    }

    /// Fetch listing pages until `limit` messages are held or the site runs
    /// out of them.
    ///
    /// At most `⌈limit / 15⌉ + 1` pages are requested, with a pause between
    /// two requests. The result is shrunk to `limit`.
    pub async fn parse_inbox_pages(&mut self, limit: usize) -> Result<()> {
        let max_pages = limit.div_ceil(ITEMS_PER_PAGE) + 1;
        let delay = self.client.page_delay();

        let mut page = 1;
        while page <= max_pages && self.items.len() < limit {
            if page > 1 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let found = {
                let doc = self.client.get_mails_page(&self.name, page).await?;
                parse_listing(&doc)
            };
            log::debug!("page {page} of {} holds {} mails", self.name, found.len());
            if found.is_empty() {
                break;
            }
            self.items.extend(found);
            page += 1;
        }

        self.shrink(limit);
        Ok(())
    }

    /// Retrieve the full message at `position` (0-based).
    pub async fn fetch(&mut self, kind: MailKind, position: usize) -> Result<Mail> {
        let item = self.item(position)?;
        let (id, is_spam) = (item.id.clone(), item.is_spam);

        let doc = self.client.get_mail_page(&self.name, &id, kind).await?;
        let mut mail = mail::parse(&doc);
        mail.set_id(&id);
        if let Mail::Html(html) = &mut mail {
            html.is_spam = is_spam;
        }
        Ok(mail)
    }

    /// Delete the message at `position` (0-based). The local list only changes
    /// once the site accepted the deletion.
    pub async fn delete(&mut self, position: usize) -> Result<()> {
        let id = self.item(position)?.id.clone();
        self.client.delete_mail(&self.name, &id).await?;
        self.items.remove(position);
        Ok(())
    }

    /// Delete every message. Does nothing when the view is already empty.
    pub async fn flush(&mut self) -> Result<()> {
        let Some(first) = self.items.first() else {
            return Ok(());
        };
        let id = first.id.clone();
        self.client.flush_mail(&self.name, &id).await?;
        self.items.clear();
        Ok(())
    }

    fn item(&self, position: usize) -> Result<&InboxItem> {
        self.items.get(position).ok_or(Error::OffsetOutOfRange {
            offset: position + 1,
            count: self.items.len(),
        })
    }
}

impl Render for Inbox {
    fn render(&self, colour: bool) -> Result<String> {
        render_listing(&self.items, colour)
    }

    fn to_json(&self) -> Result<String> {
        json(self)
    }
}

fn render_listing(items: &[InboxItem], colour: bool) -> Result<String> {
    if items.is_empty() {
        return Err(Error::EmptyInbox);
    }
    let palette = Palette::new(colour);

    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        let index = (i + 1).to_string();
        let sender = item
            .sender
            .as_ref()
            .and_then(Sender::display)
            .unwrap_or_else(|| NO_DATA.to_string());
        let subject = if item.subject.is_empty() {
            NO_DATA
        } else {
            item.subject.as_str()
        };
        let spam = if item.is_spam {
            format!(" {}", palette.red(SPAM_MARKER))
        } else {
            String::new()
        };

        out.push_str(&format!(
            " {index} {}{spam}\n  {}{}\n\n",
            palette.yellow(&sender),
            " ".repeat(index.len()),
            palette.cyan(subject),
        ));
    }
    Ok(out.trim_end_matches('\n').to_string())
}

/// Read every message summary of one listing page, in page order.
pub fn parse_listing(doc: &Html) -> Vec<InboxItem> {
    let (Ok(row), Ok(label), Ok(subject)) = (
        Selector::parse("div.m"),
        Selector::parse(".lmf"),
        Selector::parse(".lms, .lsub"),
    ) else {
        return Vec::new();
    };

    let mut items = Vec::new();
    for el in doc.select(&row) {
        let Some(id) = el.value().id().filter(|id| !id.is_empty()) else {
            continue;
        };

        let label_text = el
            .select(&label)
            .next()
            .map(|n| n.text().collect::<String>())
            .unwrap_or_default();
        let subject_text = el
            .select(&subject)
            .next()
            .map(|n| n.text().collect::<String>())
            .unwrap_or_default();

        let (label_spam, label_text) = strip_spam(label_text.trim());
        let (subject_spam, subject_text) = strip_spam(subject_text.trim());

        items.push(InboxItem {
            id: id.to_string(),
            sender: split_sender(label_text),
            subject: subject_text.to_string(),
            is_spam: label_spam || subject_spam,
        });
    }
    items
}

fn strip_spam(text: &str) -> (bool, &str) {
    match text.strip_prefix(SPAM_MARKER) {
        Some(rest) => (true, rest.trim_start()),
        None => (false, text),
    }
}

/// The listing shows either a display name or an address; a label holding an
/// `@` is taken as the address.
fn split_sender(label: &str) -> Option<Sender> {
    if label.is_empty() {
        return None;
    }
    Some(if label.contains('@') {
        Sender {
            name: String::new(),
            mail: label.to_string(),
        }
    } else {
        Sender {
            name: label.to_string(),
            mail: String::new(),
        }
    })
}

/// Lower-case a mailbox name and drop any `@domain` suffix, the way the
/// webmail redirects.
pub fn normalize_mailbox(name: &str) -> String {
    let name = name.trim().to_lowercase();
    match name.split_once('@') {
        Some((local, _)) => local.trim().to_string(),
        None => name,
    }
}

/// Parse a 1-based offset given by a user.
pub fn parse_offset(offset: &str) -> Result<usize> {
    let value: i64 = offset
        .trim()
        .parse()
        .map_err(|_| Error::InvalidOffset(offset.to_string()))?;
    if value < 1 {
        return Err(Error::OffsetNotPositive(value));
    }
    usize::try_from(value).map_err(|_| Error::InvalidOffset(offset.to_string()))
}

/// Check a 1-based offset against the number of fetched messages.
pub fn check_offset(count: usize, offset: usize) -> Result<()> {
    if count == 0 {
        return Err(Error::EmptyInbox);
    }
    if offset > count {
        return Err(Error::OffsetOutOfRange { offset, count });
    }
    Ok(())
}
