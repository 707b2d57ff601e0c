//! Multipart form data encoding.
//!
//! RFC 7578 `multipart/form-data`. Several files sent under one field name
//! are wrapped in a nested `multipart/mixed` part (RFC 2388 §4.2).
//!
//! # Example
//! ```
//! use fetchnet::http::multipart::{Form, Part};
//!
//! let encoded = Form::new()
//!     .text("username", "user123")
//!     .part("file", Part::bytes("file content").file_name("doc.txt"))
//!     .encode();
//! assert!(encoded.content_type().starts_with("multipart/form-data; boundary="));
//! ```

use bytes::Bytes;
use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};

/// A multipart form.
#[derive(Debug, Default)]
pub struct Form {
    fields: Vec<(String, Part)>,
}

/// Output of [`Form::encode`].
#[derive(Debug, Clone)]
pub struct Multipart {
    pub boundary: String,
    pub body: Bytes,
}

impl Multipart {
    /// The request's `Content-Type` header value.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }
}

impl Form {
    /// Create a new empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text field.
    pub fn text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.part(name, Part::text(value.into()))
    }

    /// Add a custom part.
    pub fn part(mut self, name: impl Into<String>, part: Part) -> Self {
        self.fields.push((name.into(), part));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Encode with a boundary that occurs in no part.
    pub fn encode(self) -> Multipart {
        let entries = group_files(self.fields);
        let boundary = unique_boundary(&entries);

        let mut output = Vec::new();
        for entry in &entries {
            open_part(&mut output, &boundary);
            match entry {
                Entry::Single(name, part) => {
                    output.extend_from_slice(part.format_headers(Some(name), "form-data").as_bytes());
                    output.extend_from_slice(b"\r\n\r\n");
                    output.extend_from_slice(&part.data);
                }
                Entry::Mixed(name, files, inner) => {
                    output.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\nContent-Type: multipart/mixed; boundary={}\r\n\r\n",
                            escape_quotes(name),
                            inner
                        )
                        .as_bytes(),
                    );
                    for file in files {
                        open_part(&mut output, inner);
                        output.extend_from_slice(file.format_headers(None, "file").as_bytes());
                        output.extend_from_slice(b"\r\n\r\n");
                        output.extend_from_slice(&file.data);
                        output.extend_from_slice(b"\r\n");
                    }
                    close(&mut output, inner);
                }
            }
            output.extend_from_slice(b"\r\n");
        }
        close(&mut output, &boundary);
        output.extend_from_slice(b"\r\n");

        Multipart {
            boundary,
            body: Bytes::from(output),
        }
    }
}

/// A part of a multipart form.
#[derive(Debug, Clone)]
pub struct Part {
    data: Bytes,
    content_type: Option<String>,
    file_name: Option<String>,
}

impl Part {
    /// Create a text part. Text parts carry no `Content-Type`.
    pub fn text(value: impl Into<String>) -> Self {
        Self::bytes(value.into())
    }

    /// Create a part from bytes.
    pub fn bytes(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            content_type: None,
            file_name: None,
        }
    }

    /// Set the content type.
    pub fn content_type(mut self, mime: impl Into<String>) -> Self {
        self.content_type = Some(mime.into());
        self
    }

    /// Set the file name.
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    fn is_file(&self) -> bool {
        self.file_name.is_some()
    }

    /// Format the part headers.
    fn format_headers(&self, name: Option<&str>, disposition: &str) -> String {
        let mut header = format!("Content-Disposition: {}", disposition);
        if let Some(name) = name {
            header.push_str(&format!("; name=\"{}\"", escape_quotes(name)));
        }
        if let Some(ref filename) = self.file_name {
            header.push_str(&format!("; filename=\"{}\"", escape_quotes(filename)));
        }
        if let Some(ref mime) = self.content_type {
            header.push_str(&format!("\r\nContent-Type: {}", mime));
        }
        header
    }

    /// Get the data length.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if part is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

enum Entry {
    Single(String, Part),
    /// Field name, its files, and the nested boundary.
    Mixed(String, Vec<Part>, String),
}

/// Fold files sharing a field name into one nested entry at the position of
/// the first of them.
fn group_files(fields: Vec<(String, Part)>) -> Vec<Entry> {
    let mut file_counts = std::collections::HashMap::new();
    for (name, part) in &fields {
        if part.is_file() {
            *file_counts.entry(name.clone()).or_insert(0usize) += 1;
        }
    }

    let mut entries: Vec<Entry> = Vec::with_capacity(fields.len());
    for (name, part) in fields {
        let shared = part.is_file() && file_counts.get(&name).copied().unwrap_or(0) > 1;
        if !shared {
            entries.push(Entry::Single(name, part));
            continue;
        }
        let existing = entries
            .iter_mut()
            .find_map(|e| match e {
                Entry::Mixed(n, files, _) if *n == name => Some(files),
                _ => None,
            });
        match existing {
            Some(files) => files.push(part),
            None => entries.push(Entry::Mixed(name, vec![part], String::new())),
        }
    }

    for idx in 0..entries.len() {
        if let Entry::Mixed(_, files, _) = &entries[idx] {
            let inner = pick_boundary(|b| files.iter().any(|p| contains(&p.data, b)) || mentions(&entries, b));
            if let Entry::Mixed(_, _, slot) = &mut entries[idx] {
                *slot = inner;
            }
        }
    }
    entries
}

fn unique_boundary(entries: &[Entry]) -> String {
    pick_boundary(|b| mentions(entries, b))
}

/// Whether `boundary` occurs anywhere in the encoded content of `entries`.
fn mentions(entries: &[Entry], boundary: &str) -> bool {
    let in_part = |name: Option<&str>, part: &Part| {
        contains(&part.data, boundary)
            || name.is_some_and(|n| n.contains(boundary))
            || part.file_name.as_deref().is_some_and(|f| f.contains(boundary))
    };
    entries.iter().any(|e| match e {
        Entry::Single(name, part) => in_part(Some(name), part),
        Entry::Mixed(name, files, inner) => {
            name.contains(boundary)
                || (!inner.is_empty() && (inner.contains(boundary) || boundary.contains(inner.as_str())))
                || files.iter().any(|p| in_part(None, p))
        }
    })
}

fn pick_boundary(mut collides: impl FnMut(&str) -> bool) -> String {
    loop {
        let boundary = generate_boundary();
        if !collides(&boundary) {
            return boundary;
        }
        tracing::debug!(%boundary, "boundary occurs in payload, regenerating");
    }
}

fn contains(haystack: &[u8], needle: &str) -> bool {
    let needle = needle.as_bytes();
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

fn open_part(output: &mut Vec<u8>, boundary: &str) {
    output.extend_from_slice(b"--");
    output.extend_from_slice(boundary.as_bytes());
    output.extend_from_slice(b"\r\n");
}

fn close(output: &mut Vec<u8>, boundary: &str) {
    output.extend_from_slice(b"--");
    output.extend_from_slice(boundary.as_bytes());
    output.extend_from_slice(b"--");
}

/// Escape quotes and backslashes in a string.
fn escape_quotes(s: &str) -> Cow<'_, str> {
    if s.contains('"') || s.contains('\\') || s.contains('\r') || s.contains('\n') {
        Cow::Owned(
            s.replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('\r', "\\r")
                .replace('\n', "\\n"),
        )
    } else {
        Cow::Borrowed(s)
    }
}

static BOUNDARY_SEQ: AtomicU64 = AtomicU64::new(0);

/// Generate a boundary string: clock, process id and a sequence number.
fn generate_boundary() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let seq = BOUNDARY_SEQ.fetch_add(1, Ordering::Relaxed);

    // Mix the sequence into the clock so back-to-back calls differ.
    let mixed = (nanos as u64) ^ seq.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    format!("----fetchnet-{:016x}{:08x}{:04x}", mixed, std::process::id(), seq & 0xffff)
}
