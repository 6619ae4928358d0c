//! Streaming multipart/form-data encoder (RFC 7578)

use bytes::Bytes;
use uuid::Uuid;

use super::body::EncodedBody;
use super::fields::{FieldValue, FormFields};

const CRLF: &str = "\r\n";

/// Content type for parts that carry a filename but no explicit type
const DEFAULT_FILE_CONTENT_TYPE: &str = "application/octet-stream";

/// A multipart form with a fixed boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<(String, FieldValue)>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    /// Empty form with a random boundary
    pub fn new() -> Self {
        Self::with_boundary(generate_boundary())
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    /// Build a form from a field map, in insertion order
    pub fn from_fields(fields: &FormFields) -> Self {
        let mut form = Self::new();
        for (name, value) in fields.iter() {
            form.append(name, value.clone());
        }
        form
    }

    /// Append a part. Repeated names produce repeated parts.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.parts.push((name.into(), value.into()));
    }

    /// Chaining variant of [`MultipartForm::append`]
    pub fn part(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.append(name, value);
        self
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Value for the `Content-Type` header
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Encode into header, payload and trailer segments.
    /// An empty form encodes to an empty body.
    pub fn encode(&self) -> EncodedBody {
        let mut segments = Vec::with_capacity(self.parts.len() * 3 + 1);
        for (name, value) in &self.parts {
            segments.push(Bytes::from(self.part_header(name, value)));
            segments.push(value.to_bytes());
            segments.push(Bytes::from_static(CRLF.as_bytes()));
        }
        if !self.parts.is_empty() {
            segments.push(Bytes::from(format!("--{}--{}", self.boundary, CRLF)));
        }
        EncodedBody::from_segments(self.content_type(), segments)
    }

    fn part_header(&self, name: &str, value: &FieldValue) -> String {
        let mut header = format!(
            "--{}{CRLF}Content-Disposition: form-data; name=\"{}\"",
            self.boundary,
            escape_quoted(name)
        );
        if let FieldValue::Blob {
            filename,
            content_type,
            ..
        } = value
        {
            if let Some(filename) = filename {
                header.push_str(&format!("; filename=\"{}\"", escape_quoted(filename)));
            }
            let mime = match (content_type, filename) {
                (Some(mime), _) => Some(mime.as_str()),
                (None, Some(_)) => Some(DEFAULT_FILE_CONTENT_TYPE),
                (None, None) => None,
            };
            if let Some(mime) = mime {
                header.push_str(&format!("{CRLF}Content-Type: {}", mime));
            }
        }
        header.push_str(CRLF);
        header.push_str(CRLF);
        header
    }
}

fn generate_boundary() -> String {
    format!("--------------------------{}", Uuid::new_v4().simple())
}

/// Percent-encode characters that would break a quoted header parameter
fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_quoted() {
        assert_eq!(escape_quoted("a\"b\r\nc"), "a%22b%0D%0Ac");
        assert_eq!(escape_quoted("plain"), "plain");
    }

    #[test]
    fn test_boundary_is_unique() {
        assert_ne!(MultipartForm::new().boundary(), MultipartForm::new().boundary());
    }
}
