//! Cookie file formats.
//!
//! A [`CookieSerializer`] turns a cookie snapshot into file content and
//! back. The jar owns the file; serializers only deal in text.
//!
//! - [`LwpFormat`]: libwww-perl `Set-Cookie3` records (the default)
//! - [`NetscapeFormat`]: the curl/wget tab-separated format
//! - [`JsonFormat`]: a JSON array of cookie records

use crate::cookies::canonicalcookie::CanonicalCookie;
use serde::{Deserialize, Serialize};
use std::io;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Converts between a cookie snapshot and the text stored on disk.
pub trait CookieSerializer: Send + Sync {
    /// Render every cookie, session cookies included.
    fn serialize(&self, cookies: &[CanonicalCookie]) -> io::Result<String>;

    /// Parse file content. Malformed content is an `InvalidData` error;
    /// the caller decides whether that is fatal.
    fn deserialize(&self, content: &str) -> io::Result<Vec<CanonicalCookie>>;
}

fn invalid_data(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

const LWP_MAGIC: &str = "#LWP-Cookies-2.0";

/// `2026-10-17 09:30:00Z`
const LWP_TIME: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]Z");

/// libwww-perl cookie jar format.
///
/// ```text
/// #LWP-Cookies-2.0
/// Set-Cookie3: session=xyz; path="/"; domain="example.test"; path_spec; discard; version=0
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LwpFormat;

impl LwpFormat {
    fn record(cookie: &CanonicalCookie) -> String {
        let domain = if cookie.host_only {
            cookie.domain.clone()
        } else {
            format!(".{}", cookie.domain)
        };

        let mut words: Vec<(&str, Option<String>)> = vec![
            (cookie.name.as_str(), Some(cookie.value.clone())),
            ("path", Some(cookie.path.clone())),
            ("domain", Some(domain)),
        ];
        if cookie.path_specified {
            words.push(("path_spec", None));
        }
        if !cookie.host_only {
            words.push(("domain_dot", None));
        }
        if cookie.secure {
            words.push(("secure", None));
        }
        if let Some(expires) = cookie.expiration_time {
            if let Ok(formatted) = expires.to_offset(UtcOffset::UTC).format(LWP_TIME) {
                words.push(("expires", Some(formatted)));
            }
        }
        if cookie.discard {
            words.push(("discard", None));
        }
        if cookie.http_only {
            words.push(("HttpOnly", None));
        }
        words.push(("version", Some("0".to_string())));

        let joined: Vec<String> = words
            .into_iter()
            .map(|(k, v)| match v {
                Some(v) => format!("{}={}", k, quote_word(&v)),
                None => k.to_string(),
            })
            .collect();
        format!("Set-Cookie3: {}", joined.join("; "))
    }

    fn parse_record(line: &str, now: OffsetDateTime) -> Option<CanonicalCookie> {
        let mut words = split_header_words(line).into_iter();
        let (name, value) = words.next()?;

        let mut cookie = CanonicalCookie::new(name, value.unwrap_or_default(), "", "/");
        cookie.creation_time = now;
        cookie.path_specified = false;
        cookie.discard = false;
        let mut domain = None;

        for (key, value) in words {
            match (key.to_ascii_lowercase().as_str(), value) {
                ("path", Some(v)) => cookie.path = v,
                ("domain", Some(v)) => domain = Some(v),
                ("path_spec", _) => cookie.path_specified = true,
                ("secure", _) => cookie.secure = true,
                ("httponly", _) => cookie.http_only = true,
                ("discard", _) => cookie.discard = true,
                ("expires", Some(v)) => {
                    cookie.expiration_time = PrimitiveDateTime::parse(&v, LWP_TIME)
                        .ok()
                        .map(PrimitiveDateTime::assume_utc);
                }
                _ => {}
            }
        }

        let domain = domain?;
        cookie.host_only = !domain.starts_with('.');
        cookie.domain = domain.trim_start_matches('.').to_ascii_lowercase();
        if cookie.expiration_time.is_none() {
            cookie.discard = true;
        }
        Some(cookie)
    }
}

impl CookieSerializer for LwpFormat {
    fn serialize(&self, cookies: &[CanonicalCookie]) -> io::Result<String> {
        let mut out = String::from(LWP_MAGIC);
        out.push('\n');
        for cookie in cookies {
            out.push_str(&Self::record(cookie));
            out.push('\n');
        }
        Ok(out)
    }

    fn deserialize(&self, content: &str) -> io::Result<Vec<CanonicalCookie>> {
        let mut lines = content.lines();
        match lines.next() {
            Some(first) if first.trim_end().starts_with(LWP_MAGIC) => {}
            _ => return Err(invalid_data("not an LWP cookie file")),
        }

        let now = OffsetDateTime::now_utc();
        let mut cookies = Vec::new();
        for line in lines {
            let Some(record) = line.trim().strip_prefix("Set-Cookie3:") else {
                continue;
            };
            match Self::parse_record(record.trim(), now) {
                Some(cookie) => cookies.push(cookie),
                None => return Err(invalid_data(format!("bad Set-Cookie3 record: {line}"))),
            }
        }
        Ok(cookies)
    }
}

/// Quote a header word value unless it is a plain `\w+` token.
fn quote_word(value: &str) -> String {
    if !value.is_empty() && value.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return value.to_string();
    }
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

/// Split `k1=v1; k2="v 2"; flag` into words, undoing `quote_word`.
fn split_header_words(text: &str) -> Vec<(String, Option<String>)> {
    let mut words = Vec::new();
    let mut chars = text.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ';') {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ';' {
                break;
            }
            key.push(c);
            chars.next();
        }
        let key = key.trim().to_string();

        let value = if chars.peek() == Some(&'=') {
            chars.next();
            let mut value = String::new();
            if chars.peek() == Some(&'"') {
                chars.next();
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => value.extend(chars.next()),
                        '"' => break,
                        _ => value.push(c),
                    }
                }
                while matches!(chars.peek(), Some(c) if *c != ';') {
                    chars.next();
                }
            } else {
                while let Some(&c) = chars.peek() {
                    if c == ';' {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
                value = value.trim().to_string();
            }
            Some(value)
        } else {
            None
        };

        if !key.is_empty() {
            words.push((key, value));
        }
    }
    words
}

/// Netscape cookie format, as read and written by curl and wget.
///
/// `domain \t include_subdomains \t path \t secure \t expiry \t name \t value`
#[derive(Debug, Clone, Copy, Default)]
pub struct NetscapeFormat;

const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

impl CookieSerializer for NetscapeFormat {
    fn serialize(&self, cookies: &[CanonicalCookie]) -> io::Result<String> {
        let mut lines = vec![
            "# Netscape HTTP Cookie File".to_string(),
            "# https://curl.se/docs/http-cookies.html".to_string(),
            String::new(),
        ];

        for cookie in cookies {
            let include_subdomains = if cookie.host_only { "FALSE" } else { "TRUE" };
            let secure = if cookie.secure { "TRUE" } else { "FALSE" };
            let expiry = cookie
                .expiration_time
                .map(|t| t.unix_timestamp())
                .unwrap_or(0);

            // Domain should start with . for non-host-only cookies
            let domain = if cookie.host_only {
                cookie.domain.clone()
            } else {
                format!(".{}", cookie.domain)
            };
            let prefix = if cookie.http_only { HTTP_ONLY_PREFIX } else { "" };

            lines.push(format!(
                "{}{}\t{}\t{}\t{}\t{}\t{}\t{}",
                prefix, domain, include_subdomains, cookie.path, secure, expiry, cookie.name, cookie.value
            ));
        }

        let mut out = lines.join("\n");
        out.push('\n');
        Ok(out)
    }

    fn deserialize(&self, content: &str) -> io::Result<Vec<CanonicalCookie>> {
        let now = OffsetDateTime::now_utc();
        let mut cookies = Vec::new();

        for line in content.lines() {
            let (line, http_only) = match line.strip_prefix(HTTP_ONLY_PREFIX) {
                Some(rest) => (rest, true),
                None => (line, false),
            };

            // Skip comments and empty lines
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let parts: Vec<&str> = line.split('\t').collect();
            if parts.len() < 7 {
                return Err(invalid_data(format!("bad Netscape cookie line: {line}")));
            }

            let expiry: i64 = parts[4]
                .trim()
                .parse()
                .map_err(|_| invalid_data(format!("bad expiry: {}", parts[4])))?;
            let expiration_time = if expiry > 0 {
                OffsetDateTime::from_unix_timestamp(expiry).ok()
            } else {
                None
            };

            let mut cookie = CanonicalCookie::new(
                parts[5],
                parts[6],
                parts[0].trim_start_matches('.').to_ascii_lowercase(),
                parts[2],
            );
            cookie.creation_time = now;
            cookie.host_only = parts[1].eq_ignore_ascii_case("FALSE");
            cookie.secure = parts[3].eq_ignore_ascii_case("TRUE");
            cookie.http_only = http_only;
            if let Some(t) = expiration_time {
                cookie = cookie.with_expiration(t);
            }
            cookies.push(cookie);
        }

        Ok(cookies)
    }
}

/// Serializable representation of a cookie for persistence.
#[derive(Serialize, Deserialize, Debug, Clone)]
struct PersistentCookie {
    name: String,
    value: String,
    domain: String,
    path: String,
    secure: bool,
    http_only: bool,
    host_only: bool,
    #[serde(default)]
    path_specified: bool,
    expires_unix_secs: Option<i64>,
}

/// Pretty-printed JSON array of cookie records.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl CookieSerializer for JsonFormat {
    fn serialize(&self, cookies: &[CanonicalCookie]) -> io::Result<String> {
        let records: Vec<PersistentCookie> = cookies
            .iter()
            .map(|c| PersistentCookie {
                name: c.name.clone(),
                value: c.value.clone(),
                domain: c.domain.clone(),
                path: c.path.clone(),
                secure: c.secure,
                http_only: c.http_only,
                host_only: c.host_only,
                path_specified: c.path_specified,
                expires_unix_secs: c.expiration_time.map(|t| t.unix_timestamp()),
            })
            .collect();

        serde_json::to_string_pretty(&records).map_err(|e| invalid_data(e.to_string()))
    }

    fn deserialize(&self, content: &str) -> io::Result<Vec<CanonicalCookie>> {
        let records: Vec<PersistentCookie> =
            serde_json::from_str(content).map_err(|e| invalid_data(e.to_string()))?;
        let now = OffsetDateTime::now_utc();

        Ok(records
            .into_iter()
            .map(|pc| {
                let mut cookie = CanonicalCookie::new(pc.name, pc.value, pc.domain, pc.path);
                cookie.creation_time = now;
                cookie.secure = pc.secure;
                cookie.http_only = pc.http_only;
                cookie.host_only = pc.host_only;
                cookie.path_specified = pc.path_specified;
                match pc
                    .expires_unix_secs
                    .and_then(|s| OffsetDateTime::from_unix_timestamp(s).ok())
                {
                    Some(t) => cookie.with_expiration(t),
                    None => cookie,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn sample() -> Vec<CanonicalCookie> {
        let expires = OffsetDateTime::from_unix_timestamp(4_102_444_800).unwrap(); // 2100-01-01
        let session = CanonicalCookie::new("session", "xyz", "example.test", "/");
        let mut shared =
            CanonicalCookie::new("pref", "a b;\"c\"", "example.com", "/app").with_expiration(expires);
        shared.host_only = false;
        shared.secure = true;
        shared.http_only = true;
        vec![session, shared]
    }

    fn assert_same(loaded: &[CanonicalCookie], expected: &[CanonicalCookie]) {
        assert_eq!(loaded.len(), expected.len());
        for (l, e) in loaded.iter().zip(expected) {
            assert!(l.same_identity(e), "{l:?} vs {e:?}");
            assert_eq!(l.value, e.value);
            assert_eq!(l.host_only, e.host_only);
            assert_eq!(l.secure, e.secure);
            assert_eq!(l.expiration_time, e.expiration_time);
        }
    }

    #[test]
    fn test_lwp_layout() {
        let text = LwpFormat.serialize(&sample()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("#LWP-Cookies-2.0"));
        assert_eq!(
            lines.next(),
            Some("Set-Cookie3: session=xyz; path=\"/\"; domain=\"example.test\"; path_spec; discard; version=0")
        );
        let shared = lines.next().unwrap();
        assert!(shared.contains("domain=\".example.com\"; path_spec; domain_dot; secure"));
        assert!(shared.contains("expires=\"2100-01-01 00:00:00Z\""));
        assert!(!shared.contains("discard"));
    }

    #[test]
    fn test_lwp_reload_keeps_session_cookies() {
        let cookies = sample();
        let text = LwpFormat.serialize(&cookies).unwrap();
        let loaded = LwpFormat.deserialize(&text).unwrap();
        assert_same(&loaded, &cookies);
        assert!(loaded[0].discard);
        assert!(!loaded[1].discard);
        assert!(loaded[1].http_only);
    }

    #[test]
    fn test_lwp_rejects_missing_magic() {
        let err = LwpFormat.deserialize("Set-Cookie3: a=1; domain=x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(LwpFormat.deserialize("").is_err());
    }

    #[test]
    fn test_lwp_rejects_record_without_domain() {
        let text = "#LWP-Cookies-2.0\nSet-Cookie3: a=1; path=\"/\"\n";
        assert!(LwpFormat.deserialize(text).is_err());
    }

    #[test]
    fn test_split_header_words() {
        let words = split_header_words(r#"a="x \"y\""; path="/"; secure; version=0"#);
        assert_eq!(words[0], ("a".to_string(), Some("x \"y\"".to_string())));
        assert_eq!(words[2], ("secure".to_string(), None));
        assert_eq!(words[3], ("version".to_string(), Some("0".to_string())));
    }

    #[test]
    fn test_netscape_roundtrip() {
        let cookies = sample();
        let text = NetscapeFormat.serialize(&cookies).unwrap();
        assert!(text.starts_with("# Netscape HTTP Cookie File"));
        assert!(text.contains("example.test\tFALSE\t/\tFALSE\t0\tsession\txyz"));
        assert!(text.contains("#HttpOnly_.example.com\tTRUE\t/app\tTRUE\t4102444800\tpref"));

        let loaded = NetscapeFormat.deserialize(&text).unwrap();
        assert_same(&loaded, &cookies);
        assert!(loaded[1].http_only);
    }

    #[test]
    fn test_netscape_skips_comments() {
        let content = "# This is a comment\n\n.example.com\tTRUE\t/\tTRUE\t0\ttest\tvalue\n# More\n";
        let loaded = NetscapeFormat.deserialize(content).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].discard);
    }

    #[test]
    fn test_netscape_rejects_short_line() {
        assert!(NetscapeFormat.deserialize("example.com\tTRUE\t/\n").is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let mut cookies = sample();
        cookies[0] = cookies[0]
            .clone()
            .with_expiration(OffsetDateTime::from_unix_timestamp(4_102_444_800).unwrap() - Duration::days(1));
        let text = JsonFormat.serialize(&cookies).unwrap();
        let loaded = JsonFormat.deserialize(&text).unwrap();
        assert_same(&loaded, &cookies);
        assert!(JsonFormat.deserialize("{not json").is_err());
    }
}
