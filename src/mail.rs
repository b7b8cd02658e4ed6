//! Full message content and the parsers that extract it from fetched pages.

use crate::client::MailDocument;
use crate::constants::NO_DATA;
use crate::error::Result;
use crate::models::Sender;
use crate::render::{Palette, Render, json, terminal_width};
use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static NAMED_SENDER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)(.+?) <(.+?)>").unwrap());
static BARE_SENDER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<(.+?)>").unwrap());

const DATE_FORMAT: &str = "%A, %B %d, %Y %I:%M:%S %p";
const DISPLAY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";
const BODY_WIDTH: usize = 120;

/// A message as rendered by the site's HTML view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HtmlMail {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Sender>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
    #[serde(rename = "isSPAM", default)]
    pub is_spam: bool,
}

/// A message in its raw MIME form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMail {
    pub id: String,
    /// Header name to every value it carries, in document order.
    pub headers: IndexMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
}

/// A fetched message in whichever rendering was requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Mail {
    Html(HtmlMail),
    Source(SourceMail),
}

impl Mail {
    pub fn id(&self) -> &str {
        match self {
            Mail::Html(mail) => &mail.id,
            Mail::Source(mail) => &mail.id,
        }
    }

    pub(crate) fn set_id(&mut self, id: &str) {
        match self {
            Mail::Html(mail) => mail.id = id.to_string(),
            Mail::Source(mail) => mail.id = id.to_string(),
        }
    }
}

/// Extract a structured message from a fetched page.
///
/// Missing or unreadable fields are left empty rather than failing.
pub fn parse(doc: &MailDocument) -> Mail {
    match doc {
        MailDocument::Html(doc) => Mail::Html(parse_html(doc)),
        MailDocument::Source(doc) => Mail::Source(parse_source(doc)),
    }
}

fn parse_html(doc: &Html) -> HtmlMail {
    let mut mail = HtmlMail::default();

    if let Ok(labels) = Selector::parse("body div.fl .ellipsis") {
        for (i, node) in doc.select(&labels).take(3).enumerate() {
            let text = node.text().collect::<String>();
            match i {
                0 => mail.subject = text.trim().to_string(),
                1 => mail.sender = parse_from(&text),
                _ => mail.date = parse_date(&collapse_whitespace(&text)),
            }
        }
    }

    if let Ok(body) = Selector::parse("div#mail") {
        if let Some(node) = doc.select(&body).next() {
            mail.body = html_to_text(&node.inner_html());
        }
    }
    mail
}

fn parse_source(doc: &Html) -> SourceMail {
    let raw = ["div#mail pre", "pre", "div#mail"]
        .iter()
        .filter_map(|sel| Selector::parse(sel).ok())
        .find_map(|sel| {
            doc.select(&sel)
                .map(|node| node.text().collect::<String>())
                .find(|text| !text.trim().is_empty())
        })
        .unwrap_or_default();

    let raw = raw.trim_start();
    let mut mail = SourceMail::default();
    match mailparse::parse_headers(raw.as_bytes()) {
        Ok((headers, offset)) => {
            for header in &headers {
                let key = header.get_key();
                let value = unfold(&String::from_utf8_lossy(header.get_value_raw()));
                let slot = mail
                    .headers
                    .keys()
                    .find(|existing| existing.eq_ignore_ascii_case(&key))
                    .cloned()
                    .unwrap_or(key);
                mail.headers.entry(slot).or_default().push(value);
            }
            mail.body = raw.get(offset..).unwrap_or_default().to_string();
        }
        Err(err) => {
            log::debug!("mail source has no readable header block: {err}");
            mail.body = raw.to_string();
        }
    }
    mail
}

/// Split a sender line into name and address.
///
/// `name <address>` is tried first, then a bare `<address>`.
fn parse_from(s: &str) -> Option<Sender> {
    if let Some(caps) = NAMED_SENDER_RE.captures(s) {
        return Some(Sender {
            name: caps[1].trim().to_string(),
            mail: caps[2].to_string(),
        });
    }
    BARE_SENDER_RE.captures(s).map(|caps| Sender {
        name: String::new(),
        mail: caps[1].to_string(),
    })
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, DATE_FORMAT)
        .ok()
        .map(|date| date.and_utc())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn unfold(value: &str) -> String {
    value
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn html_to_text(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), BODY_WIDTH) {
        Ok(text) => text.trim_end().to_string(),
        Err(err) => {
            log::debug!("mail body could not be converted to text: {err}");
            String::new()
        }
    }
}

/// Cut `s` into pieces of at most `size` characters.
fn split_chunks(s: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= size {
        return vec![s.to_string()];
    }
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

impl Render for HtmlMail {
    fn render(&self, colour: bool) -> Result<String> {
        let palette = Palette::new(colour);
        let or_placeholder = |s: &str| if s.is_empty() { NO_DATA.to_string() } else { s.to_string() };

        let from = self
            .sender
            .as_ref()
            .and_then(Sender::display)
            .unwrap_or_else(|| NO_DATA.to_string());
        let date = self
            .date
            .map(|d| d.format(DISPLAY_DATE_FORMAT).to_string())
            .unwrap_or_else(|| NO_DATA.to_string());

        Ok(format!(
            "---\nFrom    : {}\nSubject : {}\nDate    : {}\n---\n{}\n---\n",
            palette.magenta(&from),
            palette.yellow(&or_placeholder(&self.subject)),
            palette.green(&date),
            palette.cyan(&or_placeholder(&self.body)),
        ))
    }

    fn to_json(&self) -> Result<String> {
        json(self)
    }
}

impl SourceMail {
    fn render_with_width(&self, colour: bool, width: usize) -> String {
        let palette = Palette::new(colour);

        let mut rows = Vec::new();
        for (name, values) in &self.headers {
            for (i, value) in values.iter().enumerate() {
                let key = if values.len() > 1 {
                    format!("{name}[{i}]")
                } else {
                    name.clone()
                };
                rows.push((key, value));
            }
        }
        let padding = rows.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
        let indent = " ".repeat(3 + padding);

        let mut out = String::from("---\n");
        for (key, value) in rows {
            let wrapped = split_chunks(value, width.saturating_sub(3 + padding)).join(&format!("\n{indent}"));
            out.push_str(&format!("{key:<padding$} : {}\n\n", palette.magenta(&wrapped)));
        }
        out.push_str(&format!("---\n{}\n---\n", palette.cyan(&self.body)));
        out
    }
}

impl Render for SourceMail {
    fn render(&self, colour: bool) -> Result<String> {
        Ok(self.render_with_width(colour, terminal_width()))
    }

    fn to_json(&self) -> Result<String> {
        json(self)
    }
}

impl Render for Mail {
    fn render(&self, colour: bool) -> Result<String> {
        match self {
            Mail::Html(mail) => mail.render(colour),
            Mail::Source(mail) => mail.render(colour),
        }
    }

    fn to_json(&self) -> Result<String> {
        json(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 10, 24, 23, 20, 0).unwrap()
    }

    fn regular() -> HtmlMail {
        HtmlMail {
            id: "test".into(),
            sender: Some(Sender { name: "test".into(), mail: "test@protonmail.com".into() }),
            subject: "A title".into(),
            date: Some(date()),
            body: "test".into(),
            is_spam: false,
        }
    }

    #[test]
    fn parse_from_variants() {
        let s = parse_from("John Doe <john.doe@unknown.com>").unwrap();
        assert_eq!((s.name.as_str(), s.mail.as_str()), ("John Doe", "john.doe@unknown.com"));

        let s = parse_from("Liana\n                <AnnaMartinezpisea@lionspest.com.au>").unwrap();
        assert_eq!((s.name.as_str(), s.mail.as_str()), ("Liana", "AnnaMartinezpisea@lionspest.com.au"));

        let s = parse_from("<john.doe@unknown.com>").unwrap();
        assert_eq!((s.name.as_str(), s.mail.as_str()), ("", "john.doe@unknown.com"));

        assert_eq!(parse_from(""), None);
        assert_eq!(parse_from("no address"), None);
    }

    #[test]
    fn parse_date_format() {
        let date = parse_date("Sunday, June 13, 2021 8:57:08 PM").unwrap();
        assert_eq!(date.to_string(), "2021-06-13 20:57:08 UTC");
        assert_eq!(parse_date("whatever"), None);
    }

    #[test]
    fn html_body_to_text() {
        assert_eq!(html_to_text("<html>text</html>"), "text");
    }

    #[test]
    fn chunks() {
        assert_eq!(split_chunks("abc", 5), vec!["abc"]);
        assert_eq!(split_chunks("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(split_chunks("ab", 0), vec!["a", "b"]);
    }

    #[test]
    fn html_mail_render() {
        let cases = [
            (regular(), "From    : test <test@protonmail.com>\nSubject : A title\nDate    : 2022-10-24 23:20\n---\ntest\n"),
            (
                HtmlMail { sender: Some(Sender { name: String::new(), mail: "test@protonmail.com".into() }), ..regular() },
                "From    : test@protonmail.com\nSubject : A title\nDate    : 2022-10-24 23:20\n---\ntest\n",
            ),
            (
                HtmlMail { sender: None, ..regular() },
                "From    : [no data to display]\nSubject : A title\nDate    : 2022-10-24 23:20\n---\ntest\n",
            ),
            (
                HtmlMail { subject: String::new(), ..regular() },
                "From    : test <test@protonmail.com>\nSubject : [no data to display]\nDate    : 2022-10-24 23:20\n---\ntest\n",
            ),
            (
                HtmlMail { date: None, ..regular() },
                "From    : test <test@protonmail.com>\nSubject : A title\nDate    : [no data to display]\n---\ntest\n",
            ),
            (
                HtmlMail { body: String::new(), ..regular() },
                "From    : test <test@protonmail.com>\nSubject : A title\nDate    : 2022-10-24 23:20\n---\n[no data to display]\n",
            ),
        ];
        for (mail, expected) in cases {
            assert_eq!(mail.render(false).unwrap(), format!("---\n{expected}---\n"));
        }
    }

    #[test]
    fn html_mail_json_omits_empty_fields() {
        let json: serde_json::Value = serde_json::from_str(&regular().to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "test",
                "isSPAM": false,
                "sender": {"name": "test", "mail": "test@protonmail.com"},
                "subject": "A title",
                "date": "2022-10-24T23:20:00Z",
                "body": "test"
            })
        );

        let bare = HtmlMail { id: "x".into(), ..HtmlMail::default() };
        let encoded = bare.to_json().unwrap();
        assert_eq!(encoded, r#"{"id":"x","isSPAM":false}"#);
        let decoded: HtmlMail = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, bare);
    }

    #[test]
    fn parse_html_page() {
        let page = r#"<html><body>
            <div class="fl">
              <div class="ellipsis nw b f18">  In any case, I am happy that we met </div>
              <div class="ellipsis b">Liana
                &lt;AnnaMartinezpisea@lionspest.com.au&gt;</div>
              <div class="ellipsis">Sunday, June 13, 2021
                 8:57:08 PM</div>
            </div>
            <div id="mail"><p>What such a gorgeous man is doing here?</p></div>
        </body></html>"#;
        let mail = parse(&MailDocument::Html(Html::parse_document(page)));
        let Mail::Html(mail) = mail else { panic!("expected an html mail") };

        assert_eq!(mail.subject, "In any case, I am happy that we met");
        let sender = mail.sender.unwrap();
        assert_eq!(sender.name, "Liana");
        assert_eq!(sender.mail, "AnnaMartinezpisea@lionspest.com.au");
        assert_eq!(mail.date.unwrap().format("%Y-%m-%d %H:%M").to_string(), "2021-06-13 20:57");
        assert_eq!(mail.body, "What such a gorgeous man is doing here?");
    }

    #[test]
    fn parse_html_page_without_labels() {
        let mail = parse(&MailDocument::Html(Html::parse_document("<html><body></body></html>")));
        let Mail::Html(mail) = mail else { panic!("expected an html mail") };
        assert_eq!(mail, HtmlMail::default());
    }

    #[test]
    fn parse_source_page_keeps_repeated_headers() {
        let page = "<html><body><div id=\"mail\"><pre>\nReceived: from a.example.com\nReceived: from b.example.com\n  by c.example.com\nSubject: =?utf-8?Q?Marcaci=C3=B3n?=\nTo: test@yopmail.com\n\nTEST\nTEST\n</pre></div></body></html>";
        let mail = parse(&MailDocument::Source(Html::parse_document(page)));
        let Mail::Source(mail) = mail else { panic!("expected a source mail") };

        assert_eq!(
            mail.headers.keys().collect::<Vec<_>>(),
            vec!["Received", "Subject", "To"]
        );
        assert_eq!(
            mail.headers["Received"],
            vec!["from a.example.com", "from b.example.com by c.example.com"]
        );
        assert_eq!(mail.headers["Subject"], vec!["=?utf-8?Q?Marcaci=C3=B3n?="]);
        assert_eq!(mail.body, "TEST\nTEST\n");
    }

    #[test]
    fn source_mail_render_wraps_long_values() {
        let mut headers = IndexMap::new();
        headers.insert("Content-Type".to_string(), vec!["text/html; charset=utf-8".to_string()]);
        headers.insert(
            "Message-Id".to_string(),
            vec!["<01000189f12beb37-090862b4-87cf-4a57-9071-9a39ade2308c-000000@email.amazonses.com>".to_string()],
        );
        headers.insert("Mime-Version".to_string(), vec!["1.0".to_string()]);
        headers.insert(
            "Content-Transfer-Encoding".to_string(),
            vec!["quoted-printable".to_string()],
        );
        let mail = SourceMail {
            id: "e_ZwZjBQRmZwZkZwR4ZQNjAQZ4ZQRlZt==".into(),
            headers,
            body: "TEST\nTEST\nTEST\n".into(),
        };

        assert_eq!(
            mail.render_with_width(false, 80),
            "---
Content-Type              : text/html; charset=utf-8

Message-Id                : <01000189f12beb37-090862b4-87cf-4a57-9071-9a39ade230
                            8c-000000@email.amazonses.com>

Mime-Version              : 1.0

Content-Transfer-Encoding : quoted-printable

---
TEST
TEST
TEST

---
"
        );
    }

    #[test]
    fn source_mail_render_indexes_repeated_headers() {
        let mut headers = IndexMap::new();
        headers.insert("To".to_string(), vec!["test@yopmail.com".to_string()]);
        headers.insert(
            "DKIM-Signature".to_string(),
            vec!["v=1; a=first".to_string(), "v=1; a=second".to_string()],
        );
        let mail = SourceMail { id: "x".into(), headers, body: String::new() };
        let out = mail.render_with_width(false, 80);
        assert!(out.contains("To                : test@yopmail.com\n"));
        assert!(out.contains("DKIM-Signature[0] : v=1; a=first\n"));
        assert!(out.contains("DKIM-Signature[1] : v=1; a=second\n"));
        assert!(out.find("[0]").unwrap() < out.find("[1]").unwrap());
    }

    #[test]
    fn source_mail_json_is_lossless() {
        let mut headers = IndexMap::new();
        headers.insert("Received".to_string(), vec!["a".to_string(), "b".to_string()]);
        let mail = SourceMail { id: "x".into(), headers, body: "TEST\n".into() };
        let encoded = mail.to_json().unwrap();
        assert_eq!(encoded, r#"{"id":"x","headers":{"Received":["a","b"]},"body":"TEST\n"}"#);
        let decoded: SourceMail = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, mail);
    }
}
