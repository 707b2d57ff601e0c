//! Payload encoding: picks the wire form of a [`Payload`] and its
//! `Content-Type`.

use crate::base::neterror::FetchError;
use crate::http::multipart::{Form, Part};
use crate::http::requestbody::{FormData, FormValue, Payload};
use bytes::Bytes;
use url::form_urlencoded;

pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";
pub const TEXT_PLAIN: &str = "text/plain";

/// Bytes ready for the wire plus the `Content-Type` they need, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Whether a caller-supplied `Content-Type` asks for multipart encoding.
pub fn requests_multipart(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(MULTIPART_FORM_DATA))
}

/// Encode any payload. Raw bytes pass through without a `Content-Type`.
pub fn encode_payload(payload: Payload, force_multipart: bool) -> Result<EncodedBody, FetchError> {
    match payload {
        Payload::Text(text) => Ok(EncodedBody {
            content_type: Some(TEXT_PLAIN.to_string()),
            body: Bytes::from(text),
        }),
        Payload::Bytes(body) => Ok(EncodedBody {
            content_type: None,
            body,
        }),
        Payload::Form(form) => encode(form, force_multipart),
    }
}

/// Encode form fields.
///
/// Multipart when the form holds a file, was built with
/// [`FormData::force_multipart`], or `force_multipart` is set; URL-encoded
/// otherwise.
pub fn encode(form: FormData, force_multipart: bool) -> Result<EncodedBody, FetchError> {
    if form.has_files() || form.is_multipart_forced() || force_multipart {
        return encode_multipart(form);
    }

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (name, value) in form.fields() {
        if let FormValue::Text(text) = value {
            serializer.append_pair(name, text);
        }
    }
    Ok(EncodedBody {
        content_type: Some(FORM_URLENCODED.to_string()),
        body: Bytes::from(serializer.finish()),
    })
}

fn encode_multipart(form: FormData) -> Result<EncodedBody, FetchError> {
    let mut multipart = Form::new();
    for (name, value) in form.into_fields() {
        let part = match value {
            FormValue::Text(text) => Part::text(text),
            FormValue::File(file) => {
                let filename = file.filename().to_string();
                let mime = file.mime_type();
                Part::bytes(file.into_bytes()?)
                    .file_name(filename)
                    .content_type(mime)
            }
        };
        multipart = multipart.part(name, part);
    }

    let encoded = multipart.encode();
    Ok(EncodedBody {
        content_type: Some(encoded.content_type()),
        body: encoded.body,
    })
}
