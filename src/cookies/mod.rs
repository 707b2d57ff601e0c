//! Cookie storage and persistence.
//!
//! | Type | Responsibility |
//! |------|----------------|
//! | [`CanonicalCookie`](canonicalcookie::CanonicalCookie) | Single cookie representation |
//! | [`CookieMonster`](monster::CookieMonster) | In-memory store, Set-Cookie parsing, matching |
//! | [`CookieJar`](jar::CookieJar) | Store plus optional backing file |
//! | [`CookieSerializer`](persistence::CookieSerializer) | LWP, Netscape and JSON file formats |
//!
//! # Persisted session
//!
//! ```rust,no_run
//! use fetchnet::cookies::jar::CookieJar;
//! use url::Url;
//!
//! // Loads ./alice@example.test.lwp if it exists.
//! let jar = CookieJar::for_user("alice", "example.test");
//! let url = Url::parse("http://example.test/login").unwrap();
//! jar.update(&url, "session=xyz; Path=/");
//! jar.save_quietly();
//! assert_eq!(jar.get("session").as_deref(), Some("xyz"));
//! ```

pub mod canonicalcookie;
pub mod jar;
pub mod monster;
pub mod persistence;
pub mod psl;
