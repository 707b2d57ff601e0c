//! HTTP Response with body access.

use crate::base::filepath::expand_home;
use crate::base::neterror::FetchError;
use crate::http::transaction::RawResponse;
use bytes::Bytes;
use encoding_rs::Encoding;
use flate2::read::GzDecoder;
use http::header::{CONTENT_ENCODING, CONTENT_TYPE};
use http::{HeaderMap, StatusCode, Version};
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::OnceLock;
use url::Url;

/// A completed response.
///
/// The body is gunzipped once at construction. Text decoding happens on
/// first use and is cached.
#[derive(Debug)]
pub struct Response {
    url: Url,
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    reason: Option<String>,
    content: Bytes,
    charset: String,
    encoding: &'static Encoding,
    text: OnceLock<String>,
}

impl Response {
    /// Wrap a raw exchange. `default_charset` applies when `Content-Type`
    /// names no charset or one that is not recognised.
    pub fn from_raw(raw: RawResponse, default_charset: &str) -> Result<Self, FetchError> {
        let content = if is_gzip(&raw.headers) && !raw.body.is_empty() {
            gunzip(&raw.body)?
        } else {
            raw.body
        };

        let declared = raw
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_from_content_type);
        let (charset, encoding) = match declared.and_then(|label| lookup(&label).map(|enc| (label, enc))) {
            Some(found) => found,
            None => (
                default_charset.to_string(),
                lookup(default_charset).unwrap_or(encoding_rs::UTF_8),
            ),
        };

        Ok(Self {
            url: raw.url,
            status: raw.status,
            version: raw.version,
            headers: raw.headers,
            reason: raw.reason,
            content,
            charset,
            encoding,
            text: OnceLock::new(),
        })
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Reason phrase as sent by the server, else the canonical one.
    pub fn reason(&self) -> &str {
        self.reason
            .as_deref()
            .or_else(|| self.status.canonical_reason())
            .unwrap_or("")
    }

    /// Get the HTTP version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Get a reference to the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The URL that produced this response, after redirects.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Decompressed body bytes.
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn raw(&self) -> &[u8] {
        &self.content
    }

    /// Resolved charset label: a recognised `Content-Type` parameter or the
    /// default.
    pub fn charset(&self) -> &str {
        &self.charset
    }

    /// Body decoded with the resolved charset. Invalid sequences become
    /// U+FFFD.
    pub fn text(&self) -> &str {
        self.text.get_or_init(|| decode(&self.content, self.encoding))
    }

    /// Body decoded with an explicit charset. An unknown label falls back to
    /// the resolved one.
    pub fn text_with_charset(&self, label: &str) -> String {
        decode(&self.content, lookup(label).unwrap_or(self.encoding))
    }

    /// Parse the text body as JSON.
    pub fn json(&self) -> Result<serde_json::Value, FetchError> {
        self.json_as()
    }

    pub fn json_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, FetchError> {
        let text = self.text();
        serde_json::from_str(text).map_err(|_| FetchError::InvalidJson {
            body: text.to_string(),
        })
    }

    /// Write the body to `path`; a leading `~` expands to the home directory.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), FetchError> {
        let path = expand_home(path.as_ref());
        std::fs::write(&path, &self.content).map_err(|e| FetchError::Io {
            message: format!("{}: {}", path.display(), e),
        })
    }

    /// Write the body to an open writer.
    pub fn write_to(&self, mut writer: impl Write) -> io::Result<()> {
        writer.write_all(&self.content)
    }
}

fn is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("gzip"))
}

fn gunzip(data: &[u8]) -> Result<Bytes, FetchError> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out).map_err(|e| {
        tracing::debug!(error = %e, "gzip body failed to decode");
        FetchError::ContentDecodingFailed
    })?;
    Ok(Bytes::from(out))
}

/// `charset=` parameter of a `Content-Type` value, unquoted.
fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches('"').trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn lookup(label: &str) -> Option<&'static Encoding> {
    let found = Encoding::for_label(label.trim().as_bytes());
    if found.is_none() {
        tracing::debug!(charset = %label, "unknown charset label");
    }
    found
}

/// Decode with replacement.
fn decode(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use http::HeaderValue;

    fn raw(headers: &[(&'static str, &'static str)], body: impl Into<Bytes>) -> RawResponse {
        let mut map = HeaderMap::new();
        for (k, v) in headers {
            map.append(*k, HeaderValue::from_static(v));
        }
        RawResponse {
            url: Url::parse("http://example.test/").unwrap(),
            status: StatusCode::OK,
            version: Version::HTTP_11,
            headers: map,
            reason: None,
            body: body.into(),
        }
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_gzip_is_transparent() {
        let resp = Response::from_raw(
            raw(&[("content-encoding", "gzip")], gzip(b"hello, world")),
            "utf-8",
        )
        .unwrap();
        assert_eq!(resp.text(), "hello, world");
        assert_eq!(resp.content().as_ref(), b"hello, world");
    }

    #[test]
    fn test_corrupt_gzip_fails() {
        let err = Response::from_raw(raw(&[("content-encoding", "gzip")], "plain"), "utf-8").unwrap_err();
        assert_eq!(err, FetchError::ContentDecodingFailed);
    }

    #[test]
    fn test_charset_resolution_order() {
        let latin1 = vec![0x63, 0x61, 0x66, 0xe9]; // "café" in latin-1

        let resp = Response::from_raw(
            raw(&[("content-type", "text/html; Charset=\"ISO-8859-1\"")], latin1.clone()),
            "utf-8",
        )
        .unwrap();
        assert_eq!(resp.charset(), "ISO-8859-1");
        assert_eq!(resp.text(), "café");

        let resp = Response::from_raw(raw(&[("content-type", "text/html")], latin1.clone()), "latin1").unwrap();
        assert_eq!(resp.charset(), "latin1");
        assert_eq!(resp.text(), "café");

        let resp = Response::from_raw(raw(&[], latin1), "utf-8").unwrap();
        assert_eq!(resp.text(), "caf\u{fffd}");
        assert_eq!(resp.text_with_charset("windows-1252"), "café");
    }

    #[test]
    fn test_unknown_charset_uses_configured_default() {
        let resp = Response::from_raw(
            raw(&[("content-type", "text/html; charset=x-bogus")], &b"caf\xe9"[..]),
            "windows-1252",
        )
        .unwrap();
        assert_eq!(resp.charset(), "windows-1252");
        assert_eq!(resp.text(), "café");
        assert_eq!(resp.text_with_charset("also-bogus"), "café");
    }

    #[test]
    fn test_empty_gzip_body_is_empty() {
        let resp = Response::from_raw(raw(&[("content-encoding", "gzip")], Bytes::new()), "utf-8").unwrap();
        assert!(resp.content().is_empty());
        assert_eq!(resp.text(), "");
    }

    #[test]
    fn test_reason_prefers_server_phrase() {
        let mut r = raw(&[], "");
        assert_eq!(Response::from_raw(r.clone(), "utf-8").unwrap().reason(), "OK");
        r.reason = Some("Fine".to_string());
        assert_eq!(Response::from_raw(r, "utf-8").unwrap().reason(), "Fine");
    }

    #[test]
    fn test_json() {
        let resp = Response::from_raw(raw(&[], r#"{"a": [1, 2]}"#), "utf-8").unwrap();
        assert_eq!(resp.json().unwrap()["a"][1], 2);
        let v: Vec<u32> = Response::from_raw(raw(&[], "[1,2,3]"), "utf-8").unwrap().json_as().unwrap();
        assert_eq!(v, [1, 2, 3]);
    }

    #[test]
    fn test_invalid_json_carries_body() {
        let resp = Response::from_raw(raw(&[], "not json"), "utf-8").unwrap();
        assert_eq!(
            resp.json().unwrap_err(),
            FetchError::InvalidJson {
                body: "not json".to_string()
            }
        );
    }

    #[test]
    fn test_save_to() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let resp = Response::from_raw(raw(&[], "payload"), "utf-8").unwrap();
        resp.save_to(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"payload");

        let mut sink = Vec::new();
        resp.write_to(&mut sink).unwrap();
        assert_eq!(sink, b"payload");
    }
}
