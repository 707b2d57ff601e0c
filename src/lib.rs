//! # fetchnet
//!
//! A keep-alive HTTP fetcher for talking to one site at a time.
//!
//! `fetchnet` keeps idle connections per host and reuses them, carries
//! cookies across requests and (optionally) across process runs, follows
//! redirects with a hard bound, decodes gzip bodies and encodes
//! URL-encoded or multipart forms.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fetchnet::{FetchOptions, Fetcher, FormData};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), fetchnet::FetchError> {
//!     let fetcher = Fetcher::builder().host("example.test").build()?;
//!
//!     let form = FormData::new().text("user", "a").text("pass", "b");
//!     fetcher.fetch("/login", FetchOptions::new().payload(form)).await?;
//!
//!     // The session cookie set by /login goes out with this request.
//!     let profile = fetcher.get("/profile").await?;
//!     println!("{}", profile.text());
//!     Ok(())
//! }
//! ```
//!
//! A synchronous surface lives in [`blocking`].
//!
//! ## Modules
//!
//! - [`base`] - Errors, load states, path helpers
//! - [`socket`] - Per-host idle connection pool, TCP and TLS connects
//! - [`cookies`] - Cookie store, jars and on-disk formats
//! - [`http`] - Headers, request bodies, middleware, single exchanges, responses
//! - [`fetcher`] - Configuration, redirects and the fetch entry point
//! - [`blocking`] - Thread-blocking wrapper over [`Fetcher`]

pub mod base;
pub mod blocking;
pub mod cookies;
pub mod fetcher;
pub mod http;
pub mod socket;

pub use base::loadstate::LoadState;
pub use base::neterror::FetchError;
pub use cookies::jar::CookieJar;
pub use fetcher::{FetchOptions, Fetcher, FetcherBuilder, FetcherConfig, Query, UserAgent};
pub use http::{FilePart, FormData, Middleware, Payload, Response};

/// Install a `tracing` subscriber that writes to stderr.
///
/// `RUST_LOG` takes precedence over `level`. Returns `false` if a global
/// subscriber was already set.
#[cfg(feature = "logging")]
pub fn init_logging(level: tracing::Level) -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fetchnet={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
