//! Synchronous fetcher.
//!
//! [`Fetcher`] owns a multi-threaded tokio runtime and blocks the calling
//! thread for the whole of each fetch. Idle pooled connections stay driven
//! by the runtime's workers between calls, so a connection closed by the
//! peer is noticed before it is reused.
//!
//! Do not call it from inside an async context; blocking on the runtime
//! there panics.

use crate::base::neterror::FetchError;
use crate::cookies::jar::CookieJar;
use crate::fetcher::{self, FetchOptions, FetcherBuilder, FetcherConfig};
use crate::http::requestbody::Payload;
use crate::http::response::Response;
use crate::http::streamfactory::HttpStream;
use crate::socket::pool::ConnectionPool;
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};

/// Blocking wrapper around [`fetcher::Fetcher`].
#[derive(Debug)]
pub struct Fetcher {
    inner: fetcher::Fetcher,
    runtime: Runtime,
}

impl Fetcher {
    pub fn builder() -> FetcherBuilder {
        FetcherBuilder::new()
    }

    /// Wrap an async fetcher with a fresh runtime.
    pub fn new(inner: fetcher::Fetcher) -> Result<Self, FetchError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("fetchnet-blocking")
            .enable_all()
            .build()
            .map_err(|e| FetchError::Io {
                message: format!("runtime: {e}"),
            })?;
        Ok(Self { inner, runtime })
    }

    pub fn fetch(&self, path: &str, options: FetchOptions) -> Result<Response, FetchError> {
        self.runtime.block_on(self.inner.fetch(path, options))
    }

    pub fn get(&self, path: &str) -> Result<Response, FetchError> {
        self.fetch(path, FetchOptions::new())
    }

    pub fn post(&self, path: &str, payload: impl Into<Payload>) -> Result<Response, FetchError> {
        self.fetch(path, FetchOptions::new().payload(payload))
    }

    pub fn get_cookie(&self, name: &str) -> Option<String> {
        self.inner.get_cookie(name)
    }

    pub fn get_cookie_or(&self, name: &str, default: &str) -> String {
        self.inner.get_cookie_or(name, default)
    }

    pub fn cookie_jar(&self) -> &Arc<CookieJar> {
        self.inner.cookie_jar()
    }

    pub fn pool(&self) -> &Arc<ConnectionPool<HttpStream>> {
        self.inner.pool()
    }

    pub fn config(&self) -> &FetcherConfig {
        self.inner.config()
    }

    /// The async fetcher behind this one; it shares pool and jar.
    pub fn as_async(&self) -> &fetcher::Fetcher {
        &self.inner
    }
}
