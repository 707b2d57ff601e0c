use super::config::{FetcherConfig, UserAgent};
use super::Fetcher;
use crate::base::neterror::FetchError;
use crate::cookies::jar::CookieJar;
use crate::http::middleware::{Middleware, MiddlewareChain};
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::streamfactory::{HttpStream, HttpStreamFactory};
use crate::socket::pool::ConnectionPool;
use crate::socket::tls::TlsConfig;
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`Fetcher`].
///
/// # Example
///
/// ```rust,ignore
/// let fetcher = Fetcher::builder()
///     .host("example.test")
///     .user_agent(UserAgent::opera("blink"))
///     .persistent_cookies("alice", "example.test")
///     .build()?;
/// ```
pub struct FetcherBuilder {
    config: FetcherConfig,
    jar: Option<CookieJar>,
    pool: Option<Arc<ConnectionPool<HttpStream>>>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Default for FetcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FetcherBuilder {
    pub fn new() -> Self {
        Self::from_config(FetcherConfig::default())
    }

    /// Start from an existing configuration.
    pub fn from_config(config: FetcherConfig) -> Self {
        Self {
            config,
            jar: None,
            pool: None,
            middleware: Vec::new(),
        }
    }

    /// Host, optionally with `:port`, for relative paths.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = Some(host.into());
        self
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.config.scheme = scheme.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Idle window for released connections.
    pub fn keep_alive_timeout(mut self, timeout: Duration) -> Self {
        self.config.keep_alive_timeout = timeout;
        self
    }

    /// Add or replace a default header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.set_default_header(name, value);
        self
    }

    pub fn user_agent(self, ua: UserAgent) -> Self {
        let ua = ua.as_str().to_string();
        self.header("User-Agent", ua)
    }

    pub fn same_host_only(mut self, enabled: bool) -> Self {
        self.config.same_host_only = enabled;
        self
    }

    pub fn redirect_limit(mut self, limit: usize) -> Self {
        self.config.redirect_limit = limit;
        self
    }

    /// Fallback charset for text decoding.
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.config.charset = charset.into();
        self
    }

    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.config.tls = tls;
        self
    }

    pub fn cookie_jar(mut self, jar: CookieJar) -> Self {
        self.jar = Some(jar);
        self
    }

    /// Persist cookies to `<user>@<domain>.lwp`, loading it now.
    pub fn persistent_cookies(self, user: &str, domain: &str) -> Self {
        self.cookie_jar(CookieJar::for_user(user, domain))
    }

    /// Share an idle-connection pool with other fetchers.
    pub fn pool(mut self, pool: Arc<ConnectionPool<HttpStream>>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Append a middleware; it runs after the built-in stages.
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn build(self) -> Result<Fetcher, FetchError> {
        let base = self.config.base_url()?;
        if self.config.same_host_only && base.is_none() {
            return Err(FetchError::HostRequired);
        }
        let default_headers = OrderedHeaderMap::from_pairs(
            self.config
                .default_headers
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        )?;

        let jar = Arc::new(self.jar.unwrap_or_default());
        let pool = self.pool.unwrap_or_else(|| Arc::new(ConnectionPool::new()));
        let factory = Arc::new(HttpStreamFactory::new(pool, self.config.tls.clone()));
        let chain = MiddlewareChain::new(Arc::clone(&jar), self.middleware);

        Ok(Fetcher {
            config: Arc::new(self.config),
            base,
            default_headers,
            factory,
            jar,
            chain,
        })
    }

    /// Build a [`blocking::Fetcher`](crate::blocking::Fetcher) with its own runtime.
    pub fn build_blocking(self) -> Result<crate::blocking::Fetcher, FetchError> {
        crate::blocking::Fetcher::new(self.build()?)
    }
}
