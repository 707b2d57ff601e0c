//! Request and response interceptors.
//!
//! Ordering contract for one exchange:
//!
//! 1. request headers: configured defaults, then per-call headers
//! 2. built-in request stages: [`CookieInjector`], then [`BodyEncoder`]
//! 3. user middleware [`on_request`](Middleware::on_request), in registration order
//! 4. transport
//! 5. built-in response stage: [`CookieRecorder`] (cookie update, then persistence)
//! 6. user middleware [`on_response`](Middleware::on_response), in registration order
//! 7. redirect and status classification
//!
//! Body encoding always happens before transport, so user middleware sees
//! the final body and `Content-Type`.

use crate::base::filepath::blocking_io;
use crate::base::neterror::FetchError;
use crate::cookies::jar::CookieJar;
use crate::http::form::{self, requests_multipart};
use crate::http::transaction::{PreparedRequest, RawResponse};
use http::header::{CONTENT_TYPE, COOKIE};
use std::fmt;
use std::sync::Arc;

/// A hook around every exchange, redirect hops included.
pub trait Middleware: Send + Sync {
    /// Inspect or rewrite the request before it is sent.
    fn on_request(&self, _request: &mut PreparedRequest) -> Result<(), FetchError> {
        Ok(())
    }

    /// Observe a completed exchange before its status is classified.
    fn on_response(&self, _request: &PreparedRequest, _response: &RawResponse) -> Result<(), FetchError> {
        Ok(())
    }
}

/// Adds the `Cookie` header for the request URL.
pub struct CookieInjector {
    jar: Arc<CookieJar>,
}

impl CookieInjector {
    pub fn new(jar: Arc<CookieJar>) -> Self {
        Self { jar }
    }
}

impl Middleware for CookieInjector {
    fn on_request(&self, request: &mut PreparedRequest) -> Result<(), FetchError> {
        if let Some(cookie) = self.jar.header_for_url(&request.url) {
            request.headers.insert(COOKIE.as_str(), &cookie)?;
        }
        Ok(())
    }
}

/// Turns the logical payload into body bytes and sets `Content-Type`.
///
/// A per-call `Content-Type: multipart/form-data` forces multipart encoding
/// of a form payload.
#[derive(Debug, Default)]
pub struct BodyEncoder;

impl Middleware for BodyEncoder {
    fn on_request(&self, request: &mut PreparedRequest) -> Result<(), FetchError> {
        let Some(payload) = request.payload.take() else {
            return Ok(());
        };

        let force_multipart = request
            .headers
            .get_str(CONTENT_TYPE.as_str())
            .is_some_and(requests_multipart);
        // File parts are read from disk here.
        let encoded = blocking_io(|| form::encode_payload(payload, force_multipart))?;

        if let Some(content_type) = encoded.content_type {
            request.headers.insert(CONTENT_TYPE.as_str(), &content_type)?;
        }
        request.body = encoded.body;
        Ok(())
    }
}

/// Records `Set-Cookie` headers into the jar, then persists it.
pub struct CookieRecorder {
    jar: Arc<CookieJar>,
}

impl CookieRecorder {
    pub fn new(jar: Arc<CookieJar>) -> Self {
        Self { jar }
    }
}

impl Middleware for CookieRecorder {
    fn on_response(&self, _request: &PreparedRequest, response: &RawResponse) -> Result<(), FetchError> {
        for value in response.set_cookies() {
            self.jar.update(&response.url, value);
        }
        if self.jar.is_persistent() {
            blocking_io(|| self.jar.save_quietly());
        }
        Ok(())
    }
}

/// Built-in stages followed by user middleware.
#[derive(Clone)]
pub struct MiddlewareChain {
    request_stages: Vec<Arc<dyn Middleware>>,
    response_stages: Vec<Arc<dyn Middleware>>,
    user: Vec<Arc<dyn Middleware>>,
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("user", &self.user.len())
            .finish()
    }
}

impl MiddlewareChain {
    /// The built-in stages for `jar`, then `user` in order.
    pub fn new(jar: Arc<CookieJar>, user: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            request_stages: vec![
                Arc::new(CookieInjector::new(Arc::clone(&jar))),
                Arc::new(BodyEncoder),
            ],
            response_stages: vec![Arc::new(CookieRecorder::new(jar))],
            user,
        }
    }

    pub fn run_request(&self, request: &mut PreparedRequest) -> Result<(), FetchError> {
        for stage in self.request_stages.iter().chain(&self.user) {
            stage.on_request(request)?;
        }
        Ok(())
    }

    pub fn run_response(&self, request: &PreparedRequest, response: &RawResponse) -> Result<(), FetchError> {
        for stage in self.response_stages.iter().chain(&self.user) {
            stage.on_response(request, response)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::requestbody::{FilePart, FormData, Payload};
    use bytes::Bytes;
    use http::header::SET_COOKIE;
    use http::{HeaderMap, HeaderValue, Method, StatusCode, Version};
    use parking_lot::Mutex;
    use std::time::Duration;
    use url::Url;

    fn request(path: &str) -> PreparedRequest {
        let url = Url::parse("http://example.test").unwrap().join(path).unwrap();
        PreparedRequest::new(Method::GET, url, Duration::from_secs(1))
    }

    struct Recorder {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Middleware for Recorder {
        fn on_request(&self, request: &mut PreparedRequest) -> Result<(), FetchError> {
            let ct = request.headers.get_str("content-type").unwrap_or("-").to_string();
            self.log.lock().push(format!("{}:req:{}", self.tag, ct));
            Ok(())
        }

        fn on_response(&self, _request: &PreparedRequest, _response: &RawResponse) -> Result<(), FetchError> {
            self.log.lock().push(format!("{}:resp", self.tag));
            Ok(())
        }
    }

    #[test]
    fn test_body_encoder_sets_content_type() {
        let mut req = request("/login");
        req.payload = Some(Payload::Form([("user", "a"), ("pass", "b")].into_iter().collect()));
        BodyEncoder.on_request(&mut req).unwrap();
        assert_eq!(req.body, Bytes::from_static(b"user=a&pass=b"));
        assert_eq!(req.headers.get_str("Content-Type"), Some("application/x-www-form-urlencoded"));
        assert!(req.payload.is_none());
    }

    #[test]
    fn test_body_encoder_honors_multipart_header() {
        let mut req = request("/upload");
        req.headers.insert("Content-Type", "multipart/form-data").unwrap();
        req.payload = Some(Payload::Form(FormData::new().text("a", "1")));
        BodyEncoder.on_request(&mut req).unwrap();
        let ct = req.headers.get_str("content-type").unwrap();
        assert!(ct.starts_with("multipart/form-data; boundary="));
    }

    #[test]
    fn test_body_encoder_overrides_per_call_content_type() {
        let mut req = request("/upload");
        req.headers.insert("Content-Type", "application/json").unwrap();
        req.payload = Some(Payload::Form(FormData::new().file("f", FilePart::memory("a.txt", "x"))));
        BodyEncoder.on_request(&mut req).unwrap();
        assert!(req.headers.get_str("content-type").unwrap().starts_with("multipart/form-data"));
    }

    #[test]
    fn test_raw_bytes_keep_caller_content_type() {
        let mut req = request("/raw");
        req.headers.insert("Content-Type", "application/json").unwrap();
        req.payload = Some(Payload::Bytes(Bytes::from_static(b"{}")));
        BodyEncoder.on_request(&mut req).unwrap();
        assert_eq!(req.headers.get_str("content-type"), Some("application/json"));
    }

    #[test]
    fn test_chain_order() {
        let jar = Arc::new(CookieJar::in_memory());
        let log = Arc::new(Mutex::new(Vec::new()));
        let user: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(Recorder { tag: "first", log: Arc::clone(&log) }),
            Arc::new(Recorder { tag: "second", log: Arc::clone(&log) }),
        ];
        let chain = MiddlewareChain::new(Arc::clone(&jar), user);

        let mut req = request("/");
        req.payload = Some(Payload::from("hi"));
        chain.run_request(&mut req).unwrap();

        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("session=xyz"));
        let resp = RawResponse {
            url: req.url.clone(),
            status: StatusCode::OK,
            version: Version::HTTP_11,
            headers,
            reason: None,
            body: Bytes::new(),
        };
        chain.run_response(&req, &resp).unwrap();

        // User middleware sees the encoded body's type and the updated jar.
        assert_eq!(
            *log.lock(),
            ["first:req:text/plain", "second:req:text/plain", "first:resp", "second:resp"]
        );
        assert_eq!(jar.get("session"), Some("xyz".to_string()));

        let mut next = request("/profile");
        chain.run_request(&mut next).unwrap();
        assert_eq!(next.headers.get_str("Cookie"), Some("session=xyz"));
    }
}
