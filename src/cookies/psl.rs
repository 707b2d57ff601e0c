//! Domain rules for the `Domain` cookie attribute.
//!
//! A response may only widen a cookie to a parent domain of the host that
//! sent it, and never to a public suffix such as `com` or `co.uk`
//! (Mozilla's list via the `psl` crate).

use psl::{List, Psl};
use std::net::IpAddr;

/// Check if a domain is a public suffix (e.g., "com", "co.uk").
pub fn is_public_suffix(domain: &str) -> bool {
    let domain_lower = domain.to_lowercase();
    let domain_bytes = domain_lower.as_bytes();

    match List.suffix(domain_bytes) {
        Some(suffix) => suffix.as_bytes() == domain_bytes,
        None => false,
    }
}

/// RFC 6265 §5.1.3 domain matching.
///
/// `host` matches `domain` if they are equal, or if `host` ends with
/// `.domain` and is not an IP literal.
pub fn domain_match(host: &str, domain: &str) -> bool {
    let domain = domain.strip_prefix('.').unwrap_or(domain);
    if host.eq_ignore_ascii_case(domain) {
        return true;
    }
    if is_ip_literal(host) || host.len() <= domain.len() {
        return false;
    }

    let split = host.len() - domain.len();
    host.is_char_boundary(split)
        && host[split..].eq_ignore_ascii_case(domain)
        && host.as_bytes()[split - 1] == b'.'
}

/// Check if a cookie domain is valid for a given URL host.
/// The cookie domain must domain-match the host and must not be a
/// public suffix (unless it is the host itself).
pub fn is_valid_cookie_domain(cookie_domain: &str, url_host: &str) -> bool {
    let cookie_domain = cookie_domain.strip_prefix('.').unwrap_or(cookie_domain);
    if cookie_domain.is_empty() {
        return false;
    }

    if !domain_match(url_host, cookie_domain) {
        return false;
    }

    // A host may always set a cookie on itself, even when it is a suffix
    // on its own (e.g. an intranet name with an unknown TLD).
    if url_host.eq_ignore_ascii_case(cookie_domain) {
        return true;
    }

    !is_public_suffix(cookie_domain)
}

fn is_ip_literal(host: &str) -> bool {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_public_suffix() {
        assert!(is_public_suffix("com"));
        assert!(is_public_suffix("CO.UK"));
        assert!(is_public_suffix("github.io"));
        assert!(!is_public_suffix("example.com"));
        assert!(!is_public_suffix("sub.example.com"));
    }

    #[test]
    fn test_domain_match() {
        assert!(domain_match("example.com", "example.com"));
        assert!(domain_match("a.example.com", "example.com"));
        assert!(domain_match("a.example.com", ".example.com"));
        assert!(!domain_match("badexample.com", "example.com"));
        assert!(!domain_match("example.com", "a.example.com"));
        assert!(domain_match("127.0.0.1", "127.0.0.1"));
        assert!(!domain_match("1.0.0.1", "0.0.1"));
    }

    #[test]
    fn test_valid_cookie_domain() {
        assert!(is_valid_cookie_domain("example.com", "example.com"));
        assert!(is_valid_cookie_domain("example.com", "sub.example.com"));
        assert!(is_valid_cookie_domain(".example.com", "sub.example.com"));
    }

    #[test]
    fn test_invalid_cookie_domain_public_suffix() {
        assert!(!is_valid_cookie_domain("com", "example.com"));
        assert!(!is_valid_cookie_domain(".com", "example.com"));
        assert!(!is_valid_cookie_domain("co.uk", "example.co.uk"));
    }

    #[test]
    fn test_invalid_cookie_domain_mismatch() {
        assert!(!is_valid_cookie_domain("other.com", "example.com"));
        assert!(!is_valid_cookie_domain("", "example.com"));
    }
}
