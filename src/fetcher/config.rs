//! Fetcher configuration.

use crate::base::neterror::FetchError;
use crate::socket::tls::TlsConfig;
use std::time::Duration;
use url::Url;

/// Browser identities a fetcher can present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAgent {
    /// Opera 12 on the Presto engine.
    OperaPresto,
    /// Opera 26 on Blink.
    OperaBlink,
    Custom(String),
}

impl UserAgent {
    /// `"p"` or `"presto"` selects Presto; anything else selects Blink.
    pub fn opera(version: &str) -> Self {
        let version = version.trim();
        if version.eq_ignore_ascii_case("p") || version.eq_ignore_ascii_case("presto") {
            UserAgent::OperaPresto
        } else {
            UserAgent::OperaBlink
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            UserAgent::OperaPresto => "Opera/9.80 (Windows NT 6.1) Presto/2.12.388 Version/12.17",
            UserAgent::OperaBlink => {
                "Mozilla/5.0 (Windows NT 6.3; WOW64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/39.0.2171.95 Safari/537.36 OPR/26.0.1656.60"
            }
            UserAgent::Custom(ua) => ua,
        }
    }
}

/// Per-fetcher settings.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Host (with optional `:port`) relative paths resolve against.
    pub host: Option<String>,

    /// `http` or `https`.
    pub scheme: String,

    /// Deadline for one exchange, connect included.
    pub timeout: Duration,

    /// How long a released connection may sit idle in the pool.
    pub keep_alive_timeout: Duration,

    /// Sent with every request unless a per-call header overrides them.
    pub default_headers: Vec<(String, String)>,

    /// Reject absolute URLs that target another host.
    pub same_host_only: bool,

    /// Maximum redirects followed by one fetch.
    pub redirect_limit: usize,

    /// Charset used when `Content-Type` names none.
    pub charset: String,

    pub tls: TlsConfig,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            host: None,
            scheme: "http".to_string(),
            timeout: Duration::from_secs(10),
            keep_alive_timeout: Duration::from_secs(10),
            default_headers: vec![("Accept-Encoding".to_string(), "gzip".to_string())],
            same_host_only: false,
            redirect_limit: 200,
            charset: "utf-8".to_string(),
            tls: TlsConfig::default(),
        }
    }
}

impl FetcherConfig {
    /// `scheme://host/`, or `None` without a configured host.
    pub fn base_url(&self) -> Result<Option<Url>, FetchError> {
        let Some(host) = self.host.as_deref() else {
            return Ok(None);
        };
        let url = Url::parse(&format!("{}://{}/", self.scheme, host)).map_err(|_| FetchError::InvalidUrl)?;
        if url.host_str().is_none() {
            return Err(FetchError::InvalidUrl);
        }
        Ok(Some(url))
    }

    /// Set or replace a default header, case-insensitively.
    pub fn set_default_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .default_headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.default_headers.push((name, value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FetcherConfig::default();
        assert_eq!(config.scheme, "http");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.redirect_limit, 200);
        assert_eq!(config.default_headers, [("Accept-Encoding".to_string(), "gzip".to_string())]);
        assert!(config.base_url().unwrap().is_none());
    }

    #[test]
    fn test_base_url() {
        let config = FetcherConfig {
            host: Some("example.test:8080".into()),
            scheme: "https".into(),
            ..Default::default()
        };
        assert_eq!(config.base_url().unwrap().unwrap().as_str(), "https://example.test:8080/");

        let bad = FetcherConfig {
            host: Some("exa mple".into()),
            ..Default::default()
        };
        assert_eq!(bad.base_url().unwrap_err(), FetchError::InvalidUrl);
    }

    #[test]
    fn test_set_default_header_replaces() {
        let mut config = FetcherConfig::default();
        config.set_default_header("accept-encoding", "identity");
        config.set_default_header("User-Agent", "x");
        assert_eq!(config.default_headers.len(), 2);
        assert_eq!(config.default_headers[0].1, "identity");
    }

    #[test]
    fn test_opera_presets() {
        assert_eq!(UserAgent::opera("P"), UserAgent::OperaPresto);
        assert_eq!(UserAgent::opera("presto"), UserAgent::OperaPresto);
        assert_eq!(UserAgent::opera(""), UserAgent::OperaBlink);
        assert!(UserAgent::OperaPresto.as_str().contains("Presto/2.12.388"));
        assert!(UserAgent::OperaBlink.as_str().ends_with("OPR/26.0.1656.60"));
        assert!(UserAgent::OperaBlink.as_str().contains("AppleWebKit/537.36 (KHTML"));
    }
}
