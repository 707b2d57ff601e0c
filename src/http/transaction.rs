use crate::base::loadstate::LoadState;
use crate::base::neterror::FetchError;
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::requestbody::Payload;
use crate::http::streamfactory::{HttpStream, HttpStreamFactory};
use crate::socket::pool::{GroupId, Pooled};
use bytes::Bytes;
use http::header::{CONNECTION, CONTENT_LENGTH, HOST, LOCATION, SET_COOKIE};
use http::{HeaderMap, HeaderValue, Method, Request, StatusCode, Version};
use http_body_util::{BodyExt, Full};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// A request after URL resolution, ready for the request middleware and
/// then the wire.
#[derive(Debug)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: OrderedHeaderMap,
    /// Logical payload; the body encoder turns it into `body`.
    pub payload: Option<Payload>,
    pub body: Bytes,
    pub timeout: Duration,
}

impl PreparedRequest {
    pub fn new(method: Method, url: Url, timeout: Duration) -> Self {
        Self {
            method,
            url,
            headers: OrderedHeaderMap::new(),
            payload: None,
            body: Bytes::new(),
            timeout,
        }
    }

    pub fn group(&self) -> Result<GroupId, FetchError> {
        GroupId::from_url(&self.url).ok_or(FetchError::InvalidUrl)
    }

    /// `/path?query`, the request-target of an origin-form request line.
    pub fn origin_form(&self) -> String {
        match self.url.query() {
            Some(q) => format!("{}?{}", self.url.path(), q),
            None => self.url.path().to_string(),
        }
    }

    /// `host[:port]`, with the port omitted when it is the scheme default.
    fn host_header(&self) -> Result<String, FetchError> {
        let host = self.url.host_str().ok_or(FetchError::InvalidUrl)?;
        Ok(match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }

    /// Build the wire request. `Host` and `Connection: keep-alive` are always
    /// asserted; a request with a body carries its `Content-Length`.
    pub fn to_http(&self) -> Result<Request<Full<Bytes>>, FetchError> {
        let mut headers = self.headers.clone();
        headers.insert(HOST.as_str(), &self.host_header()?)?;
        headers.insert(CONNECTION.as_str(), "keep-alive")?;
        if self.method != Method::GET || !self.body.is_empty() {
            headers.insert(CONTENT_LENGTH.as_str(), &self.body.len().to_string())?;
        }

        let mut req = Request::builder()
            .method(self.method.clone())
            .uri(self.origin_form())
            .version(Version::HTTP_11)
            .body(Full::new(self.body.clone()))
            .map_err(|_| FetchError::InvalidUrl)?;
        *req.headers_mut() = headers.to_header_map();
        Ok(req)
    }
}

/// A completed exchange: status line, headers and the full raw body.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub url: Url,
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    /// Reason phrase from the status line, when it differs from the
    /// canonical one.
    pub reason: Option<String>,
    pub body: Bytes,
}

impl RawResponse {
    pub fn reason(&self) -> &str {
        self.reason
            .as_deref()
            .or_else(|| self.status.canonical_reason())
            .unwrap_or("")
    }

    /// Every `Set-Cookie` header value, in arrival order.
    pub fn set_cookies(&self) -> impl Iterator<Item = &str> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }

    /// Whether the server left the connection usable for another request.
    pub fn keeps_alive(&self) -> bool {
        let tokens = |v: &HeaderValue| {
            v.to_str()
                .map(|s| s.split(',').map(|t| t.trim().to_ascii_lowercase()).collect::<Vec<_>>())
                .unwrap_or_default()
        };
        let connection: Vec<String> = self.headers.get_all(CONNECTION).iter().flat_map(tokens).collect();

        if connection.iter().any(|t| t == "close") {
            return false;
        }
        match self.version {
            Version::HTTP_10 | Version::HTTP_09 => connection.iter().any(|t| t == "keep-alive"),
            _ => true,
        }
    }
}

/// Internal state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    CreateStream,
    SendRequest,
    ReadBody,
    Done,
}

impl State {
    /// Map internal state to public LoadState.
    fn to_load_state(self) -> LoadState {
        match self {
            State::Idle => LoadState::Idle,
            State::CreateStream | State::SendRequest | State::ReadBody => LoadState::Sending,
            State::Done => LoadState::Received,
        }
    }
}

/// One request/response exchange over a pooled connection.
/// Equivalent to net::HttpNetworkTransaction.
///
/// A transport error on a *reused* connection is retried exactly once on a
/// fresh connection: the peer may have closed it while it sat idle. A
/// timeout is never retried and the connection is dropped.
pub struct HttpNetworkTransaction {
    factory: Arc<HttpStreamFactory>,
    keep_alive: Duration,
    state: State,
    stream: Option<Pooled<HttpStream>>,
    head: Option<(http::response::Parts, hyper::body::Incoming)>,
    response: Option<RawResponse>,
    retried: bool,
}

impl HttpNetworkTransaction {
    /// `keep_alive` is the idle window granted to the connection afterwards.
    pub fn new(factory: Arc<HttpStreamFactory>, keep_alive: Duration) -> Self {
        Self {
            factory,
            keep_alive,
            state: State::Idle,
            stream: None,
            head: None,
            response: None,
            retried: false,
        }
    }

    /// Get the current load state (for progress reporting).
    pub fn get_load_state(&self) -> LoadState {
        self.state.to_load_state()
    }

    /// Whether the exchange needed its fresh-connection retry.
    pub fn was_retried(&self) -> bool {
        self.retried
    }

    /// Run the exchange under `request.timeout`.
    pub async fn start(&mut self, request: &PreparedRequest) -> Result<RawResponse, FetchError> {
        let group = request.group()?;
        self.state = State::CreateStream;
        self.retried = false;

        let outcome = tokio::time::timeout(request.timeout, self.do_loop(request, &group)).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(group = %group, timeout = ?request.timeout, "request timed out");
                Err(FetchError::ConnectionTimedOut)
            }
        };

        if result.is_err() {
            // Never pool a connection in an unknown state.
            self.stream = None;
            self.head = None;
            self.state = State::Idle;
        }
        result
    }

    async fn do_loop(&mut self, request: &PreparedRequest, group: &GroupId) -> Result<RawResponse, FetchError> {
        loop {
            match self.state {
                State::Idle => return Err(FetchError::ConnectionClosed),
                State::CreateStream => {
                    let stream = if self.retried {
                        self.factory.fresh_stream(group, request.timeout).await?
                    } else {
                        self.factory.request_stream(group, request.timeout).await?
                    };
                    self.stream = Some(stream);
                    self.state = State::SendRequest;
                }
                State::SendRequest => {
                    let req = request.to_http()?;
                    let stream = self.stream.as_mut().ok_or(FetchError::ConnectionClosed)?;
                    match stream.conn.send_request(req).await {
                        Ok(resp) => {
                            self.head = Some(resp.into_parts());
                            self.state = State::ReadBody;
                        }
                        Err(e) => self.retry_or_fail(group, e)?,
                    }
                }
                State::ReadBody => {
                    let (parts, body) = self.head.take().ok_or(FetchError::InvalidResponse)?;
                    match body.collect().await {
                        Ok(collected) => {
                            let reason = parts
                                .extensions
                                .get::<hyper::ext::ReasonPhrase>()
                                .map(|r| String::from_utf8_lossy(r.as_bytes()).into_owned());
                            self.response = Some(RawResponse {
                                url: request.url.clone(),
                                status: parts.status,
                                version: parts.version,
                                headers: parts.headers,
                                reason,
                                body: collected.to_bytes(),
                            });
                            self.state = State::Done;
                        }
                        Err(e) => self.retry_or_fail(group, e.into())?,
                    }
                }
                State::Done => {
                    let response = self.response.take().ok_or(FetchError::InvalidResponse)?;
                    self.finish_stream(group, &response);
                    return Ok(response);
                }
            }
        }
    }

    /// Retry once on a fresh connection if the failed one was reused.
    fn retry_or_fail(&mut self, group: &GroupId, err: FetchError) -> Result<(), FetchError> {
        let reused = self.stream.as_ref().is_some_and(|s| s.reused);
        self.stream = None;
        self.head = None;

        if reused && !self.retried && err.is_retryable_on_reuse() {
            tracing::debug!(group = %group, error = %err, "reused connection failed, retrying on a fresh one");
            self.retried = true;
            self.state = State::CreateStream;
            return Ok(());
        }
        Err(err)
    }

    fn finish_stream(&mut self, group: &GroupId, response: &RawResponse) {
        let Some(stream) = self.stream.take() else {
            return;
        };
        if response.keeps_alive() {
            self.factory.release(group, stream.conn, self.keep_alive);
        } else {
            tracing::debug!(group = %group, "server closed keep-alive, dropping connection");
        }
    }
}
