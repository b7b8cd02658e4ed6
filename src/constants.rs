use std::time::Duration;

pub const BASE_URL: &str = "https://yopmail.com";
/// Locale segment the site prefixes to every webmail endpoint.
pub const LOCALE: &str = "en";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PAGE_DELAY_MS: u64 = 1000;
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Number of messages the site renders on one listing page.
pub const ITEMS_PER_PAGE: usize = 15;

pub const ENV_REQUEST_TIMEOUT: &str = "YOGO_REQUEST_TIMEOUT";
pub const ENV_USER_AGENT: &str = "YOGO_USER_AGENT";
pub const ENV_PROXIES: &[&str] = &["HTTP_PROXY", "http_proxy", "HTTPS_PROXY", "https_proxy"];

pub const DEFAULT_HEADERS: &[(&str, &str)] = &[
    ("accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    ("accept-language", "en-US,en;q=0.5"),
    ("upgrade-insecure-requests", "1"),
];

pub const INBOX_HEADERS: &[(&str, &str)] = &[
    ("sec-fetch-dest", "iframe"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "same-origin"),
];

// Mail fetch headers (closer to browser)
pub const MAIL_HEADERS: &[(&str, &str)] = &[
    ("sec-fetch-dest", "iframe"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "same-origin"),
    ("sec-fetch-user", "?1"),
];

/// Base query string of the listing endpoint.
pub const LIST_QUERY: &str = "inbox?d=&ctrl=&scrl=&spam=true&ad=0&r_c=&id=";
/// Base query string of the single-message delete call.
pub const DELETE_QUERY: &str = "inbox?p=1&ctrl=&ad=0&r_c=&id=";
/// Base query string of the flush call.
pub const FLUSH_QUERY: &str = "inbox?p=1&d=all&ad=0&r_c=&id=";
pub const MAIL_PATH: &str = "mail";

pub const NO_DATA: &str = "[no data to display]";

pub fn default_timeout() -> Duration {
    Duration::from_secs(DEFAULT_TIMEOUT_SECS)
}

pub fn default_page_delay() -> Duration {
    Duration::from_millis(DEFAULT_PAGE_DELAY_MS)
}
