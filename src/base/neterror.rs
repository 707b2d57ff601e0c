use http::StatusCode;
use thiserror::Error;

/// Every failure a fetch can surface.
///
/// The first group is the fetcher's own taxonomy (host checks, status
/// classification, JSON decoding, redirect bound). The second group covers
/// transport failures raised while connecting to or talking with a peer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    // Fetcher Errors
    #[error("A host is required for relative URLs")]
    HostRequired,
    #[error("URL targets a different host: {url}")]
    SameHostRequired { url: String },
    #[error("HTTP error {status}")]
    HttpError { status: StatusCode },
    #[error("Invalid JSON body")]
    InvalidJson { body: String },
    #[error("Too many redirects (limit {limit})")]
    TooManyRedirects { limit: usize },
    #[error("Redirect without a usable Location header")]
    InvalidRedirect,

    // Transport Errors
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Invalid header")]
    InvalidHeader,
    #[error("Name not resolved: {domain}: {message}")]
    NameNotResolved { domain: String, message: String },
    #[error("Connection to {host}:{port} failed: {message}")]
    ConnectionFailed {
        host: String,
        port: u16,
        message: String,
    },
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Connection reset")]
    ConnectionReset,
    #[error("Connection timed out")]
    ConnectionTimedOut,
    #[error("SSL protocol error")]
    SslProtocolError,
    #[error("Invalid response")]
    InvalidResponse,
    #[error("Content decoding failed")]
    ContentDecodingFailed,
    #[error("I/O error: {message}")]
    Io { message: String },
}

impl FetchError {
    /// Create a connection failure for a specific host.
    pub fn connection_failed_to(host: impl Into<String>, port: u16, err: std::io::Error) -> Self {
        FetchError::ConnectionFailed {
            host: host.into(),
            port,
            message: err.to_string(),
        }
    }

    /// Create a resolution failure for a specific domain.
    pub fn dns_failed(domain: impl Into<String>, err: std::io::Error) -> Self {
        FetchError::NameNotResolved {
            domain: domain.into(),
            message: err.to_string(),
        }
    }

    /// Errors that may stem from a peer closing an idle keep-alive
    /// connection between release and reuse.
    pub fn is_retryable_on_reuse(&self) -> bool {
        matches!(
            self,
            FetchError::ConnectionClosed
                | FetchError::ConnectionReset
                | FetchError::InvalidResponse
                | FetchError::Io { .. }
        )
    }

    /// Status code carried by an [`FetchError::HttpError`].
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FetchError::HttpError { status } => Some(*status),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => FetchError::ConnectionTimedOut,
            std::io::ErrorKind::ConnectionReset => FetchError::ConnectionReset,
            std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::BrokenPipe => {
                FetchError::ConnectionClosed
            }
            _ => FetchError::Io {
                message: err.to_string(),
            },
        }
    }
}

impl From<hyper::Error> for FetchError {
    fn from(err: hyper::Error) -> Self {
        if err.is_timeout() {
            FetchError::ConnectionTimedOut
        } else if err.is_parse() || err.is_parse_status() {
            FetchError::InvalidResponse
        } else if err.is_closed() || err.is_incomplete_message() || err.is_canceled() {
            FetchError::ConnectionClosed
        } else {
            FetchError::Io {
                message: err.to_string(),
            }
        }
    }
}
