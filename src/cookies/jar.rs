use crate::base::filepath::expand_home;
use crate::cookies::canonicalcookie::CanonicalCookie;
use crate::cookies::monster::CookieMonster;
use crate::cookies::persistence::{CookieSerializer, LwpFormat};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use url::form_urlencoded;
use url::Url;

struct JarFile {
    path: PathBuf,
    serializer: Box<dyn CookieSerializer>,
}

/// A cookie store, optionally mirrored to a file.
///
/// The in-memory flavor never touches disk. The persistent flavor loads its
/// file when created and overwrites it wholesale on every [`save`](Self::save).
/// Persistence is best-effort: a missing or corrupt file yields an empty jar.
pub struct CookieJar {
    store: CookieMonster,
    file: Option<JarFile>,
}

impl fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieJar")
            .field("cookies", &self.store.total_cookie_count())
            .field("path", &self.path())
            .finish()
    }
}

impl Default for CookieJar {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl CookieJar {
    pub fn in_memory() -> Self {
        Self {
            store: CookieMonster::new(),
            file: None,
        }
    }

    /// A jar backed by `path` (a leading `~` expands to the home directory),
    /// loaded immediately.
    pub fn persistent(path: impl AsRef<Path>, serializer: impl CookieSerializer + 'static) -> Self {
        let jar = Self {
            store: CookieMonster::new(),
            file: Some(JarFile {
                path: expand_home(path.as_ref()),
                serializer: Box::new(serializer),
            }),
        };
        jar.load();
        jar
    }

    /// The LWP jar `<user>@<domain>.lwp` in the working directory, with the
    /// user name form-encoded so it is safe as a file name.
    pub fn for_user(user: &str, domain: &str) -> Self {
        Self::persistent(Self::user_file_name(user, domain), LwpFormat)
    }

    pub fn user_file_name(user: &str, domain: &str) -> String {
        let user: String = form_urlencoded::byte_serialize(user.as_bytes()).collect();
        format!("{user}@{domain}.lwp")
    }

    pub fn is_persistent(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|f| f.path.as_path())
    }

    pub fn store(&self) -> &CookieMonster {
        &self.store
    }

    /// Replace the in-memory cookies with the file's content.
    ///
    /// Never fails: an absent, unreadable or corrupt file leaves the jar
    /// empty. Returns the number of cookies loaded.
    pub fn load(&self) -> usize {
        let Some(file) = &self.file else {
            return 0;
        };

        let loaded = fs::read_to_string(&file.path).and_then(|text| file.serializer.deserialize(&text));
        match loaded {
            Ok(cookies) => {
                let count = self.store.replace_all(cookies);
                tracing::debug!(path = %file.path.display(), count, "loaded cookie jar");
                count
            }
            Err(e) => {
                tracing::debug!(path = %file.path.display(), error = %e, "cookie jar not loaded, starting empty");
                self.store.clear();
                0
            }
        }
    }

    /// Write every cookie, session cookies included, to the jar file.
    /// A no-op for in-memory jars.
    pub fn save(&self) -> io::Result<()> {
        let Some(file) = &self.file else {
            return Ok(());
        };

        let cookies: Vec<CanonicalCookie> = self.store.iter_all_cookies().collect();
        let text = file.serializer.serialize(&cookies)?;
        fs::write(&file.path, text)
    }

    /// [`save`](Self::save), logging instead of returning a failure.
    pub fn save_quietly(&self) {
        if let Err(e) = self.save() {
            tracing::warn!(path = ?self.path(), error = %e, "failed to save cookie jar");
        }
    }

    /// Apply a `Set-Cookie` header value received from `url`.
    pub fn update(&self, url: &Url, set_cookie: &str) -> usize {
        self.store.update(url, set_cookie)
    }

    /// `Cookie` header value for a request to `url`.
    pub fn header_for_url(&self, url: &Url) -> Option<String> {
        self.store.header_for_url(url)
    }

    /// Every unexpired cookie as a `Cookie` header value.
    pub fn to_header(&self) -> String {
        self.store.to_header()
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.store.get(name)
    }

    pub fn get_or(&self, name: &str, default: &str) -> String {
        self.store.get_or(name, default)
    }

    pub fn clear(&self) {
        self.store.clear();
    }
}
