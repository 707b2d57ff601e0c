//! Request payloads.
//!
//! A fetch without a payload is a GET; any [`Payload`] makes it a POST.
//! Form payloads are encoded by [`form::encode`](crate::http::form::encode).

use crate::base::neterror::FetchError;
use bytes::{Bytes, BytesMut};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Chunk size used when draining a file source.
pub const READ_CHUNK: usize = 8 * 1024;

/// Body of a POST request.
#[derive(Debug)]
pub enum Payload {
    /// Sent as `text/plain`.
    Text(String),
    /// Sent unmodified, without a computed `Content-Type`.
    Bytes(Bytes),
    /// URL-encoded, or multipart when it holds files.
    Form(FormData),
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_owned())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(v: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(v))
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Payload::Bytes(b)
    }
}

impl From<FormData> for Payload {
    fn from(form: FormData) -> Self {
        Payload::Form(form)
    }
}

/// One value of a form field.
#[derive(Debug)]
pub enum FormValue {
    Text(String),
    File(FilePart),
}

/// Ordered form fields. Names may repeat.
#[derive(Debug, Default)]
pub struct FormData {
    fields: Vec<(String, FormValue)>,
    force_multipart: bool,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), FormValue::Text(value.into())));
        self
    }

    pub fn file(mut self, name: impl Into<String>, file: FilePart) -> Self {
        self.fields.push((name.into(), FormValue::File(file)));
        self
    }

    /// Encode as multipart even without file fields.
    pub fn force_multipart(mut self) -> Self {
        self.force_multipart = true;
        self
    }

    pub fn is_multipart_forced(&self) -> bool {
        self.force_multipart
    }

    pub fn has_files(&self) -> bool {
        self.fields.iter().any(|(_, v)| matches!(v, FormValue::File(_)))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[(String, FormValue)] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<(String, FormValue)> {
        self.fields
    }
}

impl<K, V> FromIterator<(K, V)> for FormData
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(FormData::new(), |form, (k, v)| form.text(k, v))
    }
}

enum FileSource {
    Memory(Bytes),
    Reader(Box<dyn Read + Send + Sync>),
    Path(PathBuf),
}

/// A file attached to a form.
pub struct FilePart {
    filename: String,
    content_type: Option<String>,
    source: FileSource,
}

impl fmt::Debug for FilePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            FileSource::Memory(b) => format!("memory({} bytes)", b.len()),
            FileSource::Reader(_) => "reader".to_string(),
            FileSource::Path(p) => format!("path({})", p.display()),
        };
        f.debug_struct("FilePart")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("source", &source)
            .finish()
    }
}

impl FilePart {
    /// An explicit `(filename, bytes)` pair.
    pub fn memory(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            source: FileSource::Memory(data.into()),
        }
    }

    /// An open stream, drained when the body is encoded.
    pub fn reader(filename: impl Into<String>, reader: impl Read + Send + Sync + 'static) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            source: FileSource::Reader(Box::new(reader)),
        }
    }

    /// A file on disk, opened when the body is encoded. The part's file name
    /// is the path's last component.
    pub fn path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            filename,
            content_type: None,
            source: FileSource::Path(path.to_path_buf()),
        }
    }

    /// Override the type guessed from the file name.
    pub fn content_type(mut self, mime: impl Into<String>) -> Self {
        self.content_type = Some(mime.into());
        self
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Explicit type, else guessed from the extension, else
    /// `application/octet-stream`.
    pub fn mime_type(&self) -> String {
        match &self.content_type {
            Some(mime) => mime.clone(),
            None => mime_guess::from_path(&self.filename)
                .first_or_octet_stream()
                .to_string(),
        }
    }

    /// Read the whole source.
    pub fn into_bytes(self) -> Result<Bytes, FetchError> {
        match self.source {
            FileSource::Memory(b) => Ok(b),
            FileSource::Reader(mut r) => drain(&mut r),
            FileSource::Path(p) => {
                let mut file = File::open(&p).map_err(|e| FetchError::Io {
                    message: format!("{}: {}", p.display(), e),
                })?;
                drain(&mut file)
            }
        }
    }
}

fn drain(reader: &mut dyn Read) -> Result<Bytes, FetchError> {
    let mut out = BytesMut::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => return Ok(out.freeze()),
            Ok(n) => out.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}
