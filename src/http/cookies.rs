// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use crate::common::Error;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use cookie::Cookie;
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Format of the `expires` attribute, e.g. `Tue, 30 Dec 2003 09:18:16 GMT`.
const EXPIRES_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Second level labels that are registries under a two letter country code, e.g. `co.uk`.
const COUNTRY_REGISTRIES: [&str; 21] = [
    "co", "ac", "com", "edu", "org", "net", "gov", "mil", "int", "aero", "biz", "cat", "coop",
    "info", "jobs", "mobi", "museum", "name", "pro", "travel", "eu",
];

/// A cookie as held by [`CookieJar`] and as persisted between sessions.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct StoredCookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value, exactly as received.
    pub value: String,
    /// Lower case domain without a leading dot.
    pub domain: String,
    /// Path prefix the cookie applies to.
    pub path: String,
    /// No `Domain` attribute was given, so only the exact host matches.
    pub host_only: bool,
    /// Only sent over https.
    pub secure: bool,
    /// Not visible to scripts; kept for fidelity.
    pub http_only: bool,
    /// Unix timestamp after which the cookie is dropped; `None` for a session cookie.
    pub expires: Option<i64>,
}

impl StoredCookie {
    fn is_expired(&self, now: i64) -> bool {
        self.expires.map(|expires| expires <= now).unwrap_or(false)
    }

    fn matches(&self, host: &str, path: &str, https: bool) -> bool {
        let domain_ok = if self.host_only || is_ip_host(host) {
            host == self.domain
        } else {
            domain_match(host, &self.domain)
        };
        domain_ok && path_match(path, &self.path) && (https || !self.secure)
    }
}

/// Thread safe cookie jar that `reqwest` reads from and writes to.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: RwLock<Vec<StoredCookie>>,
}

impl CookieJar {
    /// Creates an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cookies held, expired ones included until they are next touched.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if the jar holds no cookies.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Adds `cookie`, replacing any cookie with the same name, domain and path.
    pub fn insert(&self, cookie: StoredCookie) {
        let mut cookies = self.write();
        cookies.retain(|c| !same_identity(c, &cookie));
        cookies.push(cookie);
    }

    /// Finds a live cookie by name.
    pub fn get(&self, name: &str) -> Option<StoredCookie> {
        let now = Utc::now().timestamp();
        self.read()
            .iter()
            .find(|c| c.name == name && !c.is_expired(now))
            .cloned()
    }

    /// Copies out every unexpired cookie.
    pub fn snapshot(&self) -> Vec<StoredCookie> {
        let now = Utc::now().timestamp();
        self.read()
            .iter()
            .filter(|c| !c.is_expired(now))
            .cloned()
            .collect()
    }

    /// Removes all cookies.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Serializes the unexpired cookies as base64 of a JSON array of [`StoredCookie`].
    pub fn to_b64(&self) -> Result<String, Error> {
        let json = serde_json::to_vec(&self.snapshot())
            .map_err(|e| Error::String(format!("cookie JSON: {e}")))?;
        Ok(STANDARD.encode(json))
    }

    /// Replaces the contents of the jar with cookies serialized by [`CookieJar::to_b64`].
    ///
    /// Empty input empties the jar. Input that does not decode leaves the jar untouched.
    pub fn load_b64(&self, data: &[u8]) -> Result<(), Error> {
        let cookies: Vec<StoredCookie> = if data.iter().all(u8::is_ascii_whitespace) {
            Vec::new()
        } else {
            let json = STANDARD
                .decode(data)
                .map_err(|e| Error::CookieDecoding(format!("base64: {e}")))?;
            serde_json::from_slice(&json)
                .map_err(|e| Error::CookieDecoding(format!("JSON: {e}")))?
        };
        *self.write() = cookies;
        Ok(())
    }

    /// Stores a single `Set-Cookie` header value received from `url`.
    ///
    /// A `Domain` must enclose the host and name a single site. Top level domains,
    /// country registries such as `co.uk` and IP hosts only ever get host-only cookies,
    /// and only when `Domain` is the host itself.
    pub fn store_response_cookie(&self, set_cookie: &str, url: &Url) {
        let Some(host) = url.host_str() else {
            return;
        };
        let host = host.to_ascii_lowercase();
        let Ok(parsed) = Cookie::parse(set_cookie) else {
            return;
        };
        let now = Utc::now().timestamp();

        let (domain, host_only) = match parsed
            .domain()
            .map(|d| d.trim_start_matches('.').to_ascii_lowercase())
            .filter(|d| !d.is_empty())
        {
            Some(domain) if allows_domain(&host, &domain) => (domain, false),
            Some(domain) if domain == host => (domain, true),
            Some(_) => return,
            None => (host, true),
        };
        let path = match parsed.path() {
            Some(path) if path.starts_with('/') => path.to_string(),
            _ => default_path(url.path()),
        };
        let expires = if let Some(max_age) = parsed.max_age() {
            Some(now.saturating_add(max_age.whole_seconds()))
        } else {
            parsed
                .expires_datetime()
                .map(|datetime| datetime.unix_timestamp())
        };

        let cookie = StoredCookie {
            name: parsed.name().to_string(),
            value: parsed.value().to_string(),
            domain,
            path,
            host_only,
            secure: parsed.secure().unwrap_or(false),
            http_only: parsed.http_only().unwrap_or(false),
            expires,
        };
        if cookie.is_expired(now) {
            self.write().retain(|c| !same_identity(c, &cookie));
        } else {
            self.insert(cookie);
        }
    }

    /// The `Cookie` header value for a request to `url`, if any cookie applies.
    pub fn header_for(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?.to_ascii_lowercase();
        let https = url.scheme() == "https";
        let now = Utc::now().timestamp();
        let mut cookies = self.write();
        cookies.retain(|c| !c.is_expired(now));
        let header = cookies
            .iter()
            .filter(|c| c.matches(&host, url.path(), https))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");
        (!header.is_empty()).then_some(header)
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<StoredCookie>> {
        self.cookies.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<StoredCookie>> {
        self.cookies
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        for header in cookie_headers {
            if let Ok(set_cookie) = header.to_str() {
                self.store_response_cookie(set_cookie, url);
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.header_for(url)
            .and_then(|header| HeaderValue::from_str(&header).ok())
    }
}

fn same_identity(a: &StoredCookie, b: &StoredCookie) -> bool {
    a.name == b.name && a.domain == b.domain && a.path == b.path
}

/// `host` is `domain` or a subdomain of it.
fn domain_match(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .map(|prefix| prefix.ends_with('.'))
            .unwrap_or(false)
}

/// `host` is an IPv4 or (bracketed) IPv6 literal.
fn is_ip_host(host: &str) -> bool {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .is_ok()
}

/// `domain` is shared by unrelated sites, e.g. `com` or `co.uk`.
fn is_public_domain(domain: &str) -> bool {
    let labels: Vec<&str> = domain.split('.').collect();
    match labels.as_slice() {
        [_] => true,
        [second, top] => top.len() == 2 && COUNTRY_REGISTRIES.contains(second),
        _ => labels.iter().any(|label| label.is_empty()),
    }
}

/// A `Domain` attribute received from `host` may widen the cookie to `domain`.
fn allows_domain(host: &str, domain: &str) -> bool {
    !is_ip_host(host) && !is_public_domain(domain) && domain_match(host, domain)
}

fn path_match(request_path: &str, cookie_path: &str) -> bool {
    request_path == cookie_path
        || request_path.strip_prefix(cookie_path).is_some_and(|rest| {
            cookie_path.ends_with('/') || rest.starts_with('/')
        })
}

/// Directory of the request path, used when `Set-Cookie` has no `Path`.
fn default_path(request_path: &str) -> String {
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => request_path[..i].to_string(),
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~:".contains(c)
}

/// Quote a cookie value that contains characters outside the token set.
fn quote_value(value: &str) -> String {
    if value.chars().all(is_token_char) {
        value.to_string()
    } else {
        let mut quoted = String::with_capacity(value.len() + 2);
        quoted.push('"');
        for c in value.chars() {
            if c == '"' || c == '\\' {
                quoted.push('\\');
            }
            quoted.push(c);
        }
        quoted.push('"');
        quoted
    }
}

/// `Expires` attribute value for a cookie that lives `seconds` from `now`.
pub fn expiry_timestamp(now: DateTime<Utc>, seconds: i64) -> String {
    Duration::try_seconds(seconds)
        .and_then(|duration| now.checked_add_signed(duration))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
        .format(EXPIRES_FORMAT)
        .to_string()
}

/// Build a complete `Set-Cookie` response header line.
///
/// # Example
///
/// `Set-Cookie: ipsum="lorem ipsum dolor sit"; Domain=.example.com; expires=Sat, 06 Sep 2003 15:33:28 GMT; Path=/`
pub fn build_set_cookie_header(
    name: &str,
    domain: &str,
    value: &str,
    path: &str,
    expires_in_seconds: i64,
    now: DateTime<Utc>,
) -> String {
    format!(
        "Set-Cookie: {name}={}; Domain={domain}; expires={}; Path={path}",
        quote_value(value),
        expiry_timestamp(now, expires_in_seconds)
    )
}
