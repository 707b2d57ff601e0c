use time::OffsetDateTime;

/// Represents a cookie.
/// Modeled after Chromium's `net::CanonicalCookie`.
///
/// Identity is the (name, domain, path) triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub creation_time: OffsetDateTime,
    pub expiration_time: Option<OffsetDateTime>,
    pub secure: bool,
    pub http_only: bool,
    pub host_only: bool,
    /// Session cookie: dropped at the end of a session unless the jar is
    /// saved with discard cookies included.
    pub discard: bool,
    /// Whether the `Path` attribute was present in the Set-Cookie line.
    pub path_specified: bool,
}

impl CanonicalCookie {
    /// A host-only session cookie with the given identity.
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: path.into(),
            creation_time: OffsetDateTime::now_utc(),
            expiration_time: None,
            secure: false,
            http_only: false,
            host_only: true,
            discard: true,
            path_specified: true,
        }
    }

    /// Set an absolute expiry; a cookie with an expiry is persistent.
    pub fn with_expiration(mut self, expires: OffsetDateTime) -> Self {
        self.expiration_time = Some(expires);
        self.discard = false;
        self
    }

    pub fn is_expired(&self, current_time: OffsetDateTime) -> bool {
        match self.expiration_time {
            Some(expiry) => expiry <= current_time,
            None => false,
        }
    }

    /// Whether `other` names the same cookie slot.
    pub fn same_identity(&self, other: &CanonicalCookie) -> bool {
        self.name == other.name
            && self.path == other.path
            && self.domain.eq_ignore_ascii_case(&other.domain)
    }

    /// `name=value` pair as sent in a `Cookie` header.
    pub fn pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}
