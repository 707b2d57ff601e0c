//! The fetch pipeline.
//!
//! A [`Fetcher`] resolves a path against its configured host, runs the
//! middleware chain, sends the request over a pooled keep-alive connection
//! and follows redirects until it has a final [`Response`].
//!
//! Fetchers are cheap to clone; clones share the pool, the cookie jar and
//! the middleware. Each [`Fetcher::fetch`] call keeps its own redirect count.

pub mod builder;
pub mod config;
pub mod job;
pub mod options;

pub use builder::FetcherBuilder;
pub use config::{FetcherConfig, UserAgent};
pub use job::{FetchJob, RedirectChain};
pub use options::{FetchOptions, Query};

use crate::base::neterror::FetchError;
use crate::cookies::jar::CookieJar;
use crate::http::middleware::MiddlewareChain;
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::requestbody::Payload;
use crate::http::response::Response;
use crate::http::streamfactory::{HttpStream, HttpStreamFactory};
use crate::socket::pool::ConnectionPool;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Async HTTP fetcher bound to one configuration.
#[derive(Clone)]
pub struct Fetcher {
    config: Arc<FetcherConfig>,
    base: Option<Url>,
    default_headers: OrderedHeaderMap,
    factory: Arc<HttpStreamFactory>,
    jar: Arc<CookieJar>,
    chain: MiddlewareChain,
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("base", &self.base.as_ref().map(Url::as_str))
            .field("jar", &self.jar)
            .field("chain", &self.chain)
            .finish()
    }
}

impl Fetcher {
    pub fn builder() -> FetcherBuilder {
        FetcherBuilder::new()
    }

    /// Fetch `path`; a relative path resolves against the configured host.
    ///
    /// Without a payload the request is a GET, with one a POST. Redirects
    /// (301, 302, 303) are followed as GETs. Any other status above 300
    /// fails with [`FetchError::HttpError`] unless the options ignore errors.
    pub async fn fetch(&self, path: &str, options: FetchOptions) -> Result<Response, FetchError> {
        let mut url = self.resolve_url(path)?;
        if let Some(query) = &options.query {
            query.apply(&mut url);
        }
        let mut job = FetchJob::new(self, url, options)?;
        job.run().await
    }

    pub async fn get(&self, path: &str) -> Result<Response, FetchError> {
        self.fetch(path, FetchOptions::new()).await
    }

    pub async fn post(&self, path: &str, payload: impl Into<Payload>) -> Result<Response, FetchError> {
        self.fetch(path, FetchOptions::new().payload(payload)).await
    }

    /// Resolve `path` into an absolute `http(s)` URL and apply the host check.
    pub fn resolve_url(&self, path: &str) -> Result<Url, FetchError> {
        let url = match Url::parse(path) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self.base.as_ref().ok_or(FetchError::HostRequired)?;
                base.join(path).map_err(|_| FetchError::InvalidUrl)?
            }
            Err(_) => return Err(FetchError::InvalidUrl),
        };
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(FetchError::InvalidUrl);
        }
        self.check_host(&url)?;
        Ok(url)
    }

    /// Under `same_host_only`, `url` must name the configured scheme, host
    /// and port.
    pub(crate) fn check_host(&self, url: &Url) -> Result<(), FetchError> {
        if !self.config.same_host_only {
            return Ok(());
        }
        let base = self.base.as_ref().ok_or(FetchError::HostRequired)?;
        if url.scheme() == base.scheme() && url.host_str() == base.host_str() && url.port() == base.port() {
            Ok(())
        } else {
            Err(FetchError::SameHostRequired { url: url.to_string() })
        }
    }

    /// Value of the first stored cookie named `name`.
    pub fn get_cookie(&self, name: &str) -> Option<String> {
        self.jar.get(name)
    }

    pub fn get_cookie_or(&self, name: &str, default: &str) -> String {
        self.jar.get_or(name, default)
    }

    pub fn cookie_jar(&self) -> &Arc<CookieJar> {
        &self.jar
    }

    pub fn pool(&self) -> &Arc<ConnectionPool<HttpStream>> {
        self.factory.pool()
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }
}
