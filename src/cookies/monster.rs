use crate::cookies::canonicalcookie::CanonicalCookie;
use crate::cookies::psl;
use parking_lot::RwLock;
use time::{Duration, OffsetDateTime};
use url::Url;

/// Longest lifetime accepted from `Max-Age`, so expiry arithmetic stays in range.
const MAX_COOKIE_AGE: Duration = Duration::days(365 * 100);

/// In-memory cookie store.
/// Modeled after Chromium's `net::CookieMonster`.
///
/// Cookies are kept in insertion order. Replacing a cookie with the same
/// (name, domain, path) identity keeps its original position.
#[derive(Debug, Default)]
pub struct CookieMonster {
    store: RwLock<Vec<CanonicalCookie>>,
}

impl CookieMonster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a cookie. An already-expired cookie deletes the
    /// stored entry with the same identity instead.
    pub fn set_canonical_cookie(&self, cookie: CanonicalCookie) {
        let mut store = self.store.write();
        let existing = store.iter().position(|c| c.same_identity(&cookie));

        if cookie.is_expired(OffsetDateTime::now_utc()) {
            if let Some(idx) = existing {
                store.remove(idx);
                tracing::debug!(name = %cookie.name, domain = %cookie.domain, "cookie expired by server");
            }
            return;
        }

        match existing {
            Some(idx) => store[idx] = cookie,
            None => store.push(cookie),
        }
    }

    /// Apply one `Set-Cookie` line received from `url`.
    ///
    /// Returns false when the line is unparsable or its `Domain` attribute is
    /// not acceptable for the request host.
    pub fn parse_and_save_cookie(&self, url: &Url, cookie_line: &str) -> bool {
        let parsed = match cookie::Cookie::parse(cookie_line) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(line = %cookie_line, error = %e, "failed to parse Set-Cookie");
                return false;
            }
        };

        let host = url.host_str().unwrap_or("").to_ascii_lowercase();
        let now = OffsetDateTime::now_utc();

        let (domain, host_only) = match parsed.domain() {
            Some(d) if !d.trim_start_matches('.').is_empty() => {
                let d = d.trim_start_matches('.').to_ascii_lowercase();
                if !psl::is_valid_cookie_domain(&d, &host) {
                    tracing::debug!(domain = %d, host = %host, "rejected cookie domain");
                    return false;
                }
                (d, false)
            }
            _ => (host, true),
        };

        let (path, path_specified) = match parsed.path() {
            Some(p) if p.starts_with('/') => (p.to_string(), true),
            _ => (default_path(url), false),
        };

        // Max-Age wins over Expires.
        let expiration_time = match parsed.max_age() {
            Some(age) if age <= Duration::ZERO => Some(OffsetDateTime::UNIX_EPOCH),
            Some(age) => Some(now + age.min(MAX_COOKIE_AGE)),
            None => parsed.expires().and_then(|e| e.datetime()),
        };

        let cookie = CanonicalCookie {
            name: parsed.name().to_string(),
            value: parsed.value().to_string(),
            domain,
            path,
            creation_time: now,
            expiration_time,
            secure: parsed.secure().unwrap_or(false),
            http_only: parsed.http_only().unwrap_or(false),
            host_only,
            discard: expiration_time.is_none(),
            path_specified,
        };

        self.set_canonical_cookie(cookie);
        true
    }

    /// Apply a `Set-Cookie` header value that may hold several cookies
    /// joined with commas. Returns how many cookies were accepted.
    pub fn update(&self, url: &Url, header: &str) -> usize {
        split_set_cookie(header)
            .into_iter()
            .filter(|line| self.parse_and_save_cookie(url, line))
            .count()
    }

    /// Cookies that apply to `url`: domain, path, secure flag and expiry
    /// all match. Longer paths sort first; ties keep insertion order.
    pub fn get_cookies_for_url(&self, url: &Url) -> Vec<CanonicalCookie> {
        let host = url.host_str().unwrap_or("");
        let request_path = url.path();
        let now = OffsetDateTime::now_utc();

        let mut result: Vec<CanonicalCookie> = self
            .store
            .read()
            .iter()
            .filter(|c| Self::domain_matches(&c.domain, host, c.host_only))
            .filter(|c| Self::path_matches(&c.path, request_path))
            .filter(|c| !c.secure || url.scheme() == "https")
            .filter(|c| !c.is_expired(now))
            .cloned()
            .collect();

        result.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        result
    }

    /// `Cookie` header value for a request to `url`, if any cookie applies.
    pub fn header_for_url(&self, url: &Url) -> Option<String> {
        let cookies = self.get_cookies_for_url(url);
        if cookies.is_empty() {
            return None;
        }
        Some(join_pairs(&cookies))
    }

    /// Every unexpired cookie as `name=value` pairs joined by `; `, in
    /// insertion order, regardless of domain or path.
    pub fn to_header(&self) -> String {
        let now = OffsetDateTime::now_utc();
        let store = self.store.read();
        let live: Vec<&CanonicalCookie> = store.iter().filter(|c| !c.is_expired(now)).collect();
        live.iter().map(|c| c.pair()).collect::<Vec<_>>().join("; ")
    }

    /// Value of the first unexpired cookie called `name`.
    pub fn get(&self, name: &str) -> Option<String> {
        let now = OffsetDateTime::now_utc();
        self.store
            .read()
            .iter()
            .find(|c| c.name == name && !c.is_expired(now))
            .map(|c| c.value.clone())
    }

    pub fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    /// Remove the cookie with this identity. Returns whether one existed.
    pub fn remove(&self, name: &str, domain: &str, path: &str) -> bool {
        let mut store = self.store.write();
        let before = store.len();
        store.retain(|c| !(c.name == name && c.path == path && c.domain.eq_ignore_ascii_case(domain)));
        store.len() != before
    }

    /// Drop expired cookies. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let mut store = self.store.write();
        let before = store.len();
        store.retain(|c| !c.is_expired(now));
        before - store.len()
    }

    /// Get total cookie count.
    pub fn total_cookie_count(&self) -> usize {
        self.store.read().len()
    }

    /// Clear all cookies.
    pub fn clear(&self) {
        self.store.write().clear();
    }

    /// Snapshot of all cookies in insertion order (for persistence).
    pub fn iter_all_cookies(&self) -> impl Iterator<Item = CanonicalCookie> {
        self.store.read().clone().into_iter()
    }

    /// Replace the whole store with `cookies`, skipping expired ones.
    pub fn replace_all(&self, cookies: impl IntoIterator<Item = CanonicalCookie>) -> usize {
        let now = OffsetDateTime::now_utc();
        let mut fresh: Vec<CanonicalCookie> = Vec::new();
        for cookie in cookies.into_iter().filter(|c| !c.is_expired(now)) {
            match fresh.iter().position(|c| c.same_identity(&cookie)) {
                Some(idx) => fresh[idx] = cookie,
                None => fresh.push(cookie),
            }
        }
        let count = fresh.len();
        *self.store.write() = fresh;
        count
    }

    /// Check if cookie domain matches request host.
    /// Implements RFC 6265 domain matching.
    fn domain_matches(cookie_domain: &str, request_host: &str, host_only: bool) -> bool {
        if host_only {
            // Host-only cookie: exact match required
            return cookie_domain.eq_ignore_ascii_case(request_host);
        }
        psl::domain_match(request_host, cookie_domain)
    }

    /// Check if request path matches cookie path.
    /// Implements RFC 6265 path matching.
    fn path_matches(cookie_path: &str, request_path: &str) -> bool {
        if request_path == cookie_path {
            return true;
        }

        if request_path.starts_with(cookie_path) {
            if cookie_path.ends_with('/') {
                return true;
            }
            return request_path.as_bytes().get(cookie_path.len()) == Some(&b'/');
        }

        false
    }
}

fn join_pairs(cookies: &[CanonicalCookie]) -> String {
    cookies.iter().map(|c| c.pair()).collect::<Vec<_>>().join("; ")
}

/// RFC 6265 §5.1.4 default-path: the request path up to, not including,
/// its last `/`, or `/` when that leaves nothing.
fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

/// Split a comma-joined `Set-Cookie` value into individual cookie lines.
///
/// A comma only separates two cookies when the text after it starts with
/// a `name=` token. Commas inside `Expires` dates or cookie values stay put.
pub fn split_set_cookie(header: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;

    for (idx, ch) in header.char_indices() {
        if ch == ',' && starts_new_cookie(&header[idx + 1..]) {
            lines.push(header[start..idx].trim());
            start = idx + 1;
        }
    }
    lines.push(header[start..].trim());
    lines.retain(|l| !l.is_empty());
    lines
}

fn starts_new_cookie(rest: &str) -> bool {
    let rest = rest.trim_start();
    let name_len = rest.bytes().take_while(|b| is_token_byte(*b)).count();
    name_len > 0 && rest.as_bytes().get(name_len) == Some(&b'=')
}

/// RFC 7230 `tchar`.
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}
