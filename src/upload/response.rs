//! Settled upload responses

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{UploadError, UploadResult};
use crate::form::EncodedBody;
use crate::transport::XhrRequest;

/// Response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseData {
    Text(String),
    Binary(Bytes),
}

impl ResponseData {
    /// Text when the body is valid UTF-8, binary otherwise
    pub fn from_bytes(body: Bytes) -> Self {
        match std::str::from_utf8(&body) {
            Ok(text) => Self::Text(text.to_string()),
            Err(_) => Self::Binary(body),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(data) => data,
        }
    }
}

/// A response header with one or more values
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderField {
    Single(String),
    Multiple(Vec<String>),
}

impl HeaderField {
    /// First value
    pub fn first(&self) -> &str {
        match self {
            Self::Single(value) => value,
            Self::Multiple(values) => values.first().map(String::as_str).unwrap_or(""),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            Self::Single(existing) => {
                *self = Self::Multiple(vec![std::mem::take(existing), value]);
            }
            Self::Multiple(values) => values.push(value),
        }
    }
}

/// Transport-specific handle for advanced callers
#[derive(Clone)]
pub enum TransportHandle {
    /// Request object used by the browser driver
    Request(Arc<dyn XhrRequest>),
    /// Encoded body streamed by the server driver
    Encoder(EncodedBody),
}

impl std::fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request(_) => f.write_str("TransportHandle::Request"),
            Self::Encoder(body) => f.debug_tuple("TransportHandle::Encoder").field(body).finish(),
        }
    }
}

/// Resolved value of a successful upload
#[derive(Debug, Clone)]
pub struct UploadResponse {
    pub data: ResponseData,
    pub status: u16,
    pub headers: HashMap<String, HeaderField>,
    pub handle: TransportHandle,
}

impl UploadResponse {
    pub fn text(&self) -> Option<&str> {
        self.data.as_text()
    }

    /// Deserialize a JSON body
    pub fn json<T: DeserializeOwned>(&self) -> UploadResult<T> {
        serde_json::from_slice(self.data.as_bytes())
            .map_err(|e| UploadError::Body(format!("Invalid JSON response: {}", e)))
    }

    /// Header lookup, case-insensitive
    pub fn header(&self, name: &str) -> Option<&HeaderField> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }
}

/// Parse a raw header block.
///
/// Lines that do not split into exactly two parts on `:` are dropped, so
/// values containing a colon are not kept. Later duplicates win.
pub fn parse_raw_headers(raw: &str) -> HashMap<String, HeaderField> {
    let mut headers = HashMap::new();
    for line in raw.replace('\r', "").split('\n') {
        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() != 2 {
            continue;
        }
        headers.insert(
            parts[0].trim().to_string(),
            HeaderField::Single(parts[1].trim().to_string()),
        );
    }
    headers
}

/// Collect a header map, grouping repeated names
pub(crate) fn collect_header_map(map: &reqwest::header::HeaderMap) -> HashMap<String, HeaderField> {
    let mut headers: HashMap<String, HeaderField> = HashMap::new();
    for (name, value) in map {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        match headers.get_mut(name.as_str()) {
            Some(field) => field.push(value),
            None => {
                headers.insert(name.as_str().to_string(), HeaderField::Single(value));
            }
        }
    }
    headers
}
