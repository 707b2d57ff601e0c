use crate::http::requestbody::Payload;
use std::time::Duration;
use url::Url;

/// Query string appended to the resolved URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Percent-encoded on append.
    Pairs(Vec<(String, String)>),
    /// Appended as given.
    Encoded(String),
}

impl Query {
    /// Append to `url`, after any query it already carries.
    pub fn apply(&self, url: &mut Url) {
        match self {
            Query::Pairs(pairs) => {
                if !pairs.is_empty() {
                    url.query_pairs_mut().extend_pairs(pairs);
                }
            }
            Query::Encoded(encoded) => {
                let encoded = encoded.trim_start_matches('?');
                if encoded.is_empty() {
                    return;
                }
                let query = match url.query() {
                    Some(existing) if !existing.is_empty() => format!("{existing}&{encoded}"),
                    _ => encoded.to_string(),
                };
                url.set_query(Some(&query));
            }
        }
    }
}

impl From<&str> for Query {
    fn from(encoded: &str) -> Self {
        Query::Encoded(encoded.to_string())
    }
}

impl From<String> for Query {
    fn from(encoded: String) -> Self {
        Query::Encoded(encoded)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Query {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Query::Pairs(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Per-call settings for [`Fetcher::fetch`](super::Fetcher::fetch).
///
/// A payload turns the request into a POST.
#[derive(Debug, Default)]
pub struct FetchOptions {
    pub payload: Option<Payload>,
    pub headers: Vec<(String, String)>,
    pub query: Option<Query>,
    /// Overrides the configured timeout.
    pub timeout: Option<Duration>,
    /// Return error statuses as responses instead of failing.
    pub ignore_errors: bool,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, query: impl Into<Query>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Query from key/value pairs.
    pub fn query_pairs<K, V>(self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query(pairs.into_iter().collect::<Query>())
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn ignore_errors(mut self, ignore: bool) -> Self {
        self.ignore_errors = ignore;
        self
    }
}
