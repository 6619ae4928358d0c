//! Encoded request bodies with length discovery and chunk events

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::error::UploadResult;

/// Listener notified with the size of every chunk handed to the transport
pub type DataListener = Arc<dyn Fn(usize) + Send + Sync>;

/// A serialized body ready to send.
///
/// Clones share their data listeners, so a listener added through one clone
/// sees chunks streamed from any other.
#[derive(Clone)]
pub struct EncodedBody {
    content_type: String,
    segments: Arc<Vec<Bytes>>,
    length: u64,
    listeners: Arc<Mutex<Vec<DataListener>>>,
}

impl std::fmt::Debug for EncodedBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedBody")
            .field("content_type", &self.content_type)
            .field("segments", &self.segments.len())
            .field("length", &self.length)
            .finish()
    }
}

impl EncodedBody {
    pub(crate) fn from_segments(content_type: impl Into<String>, segments: Vec<Bytes>) -> Self {
        let length = segments.iter().map(|s| s.len() as u64).sum();
        Self {
            content_type: content_type.into(),
            segments: Arc::new(segments),
            length,
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Body sent verbatim
    pub fn raw(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self::from_segments(content_type, vec![data.into()])
    }

    /// Value for the `Content-Type` header
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Total encoded length in bytes
    pub async fn length(&self) -> UploadResult<u64> {
        Ok(self.length)
    }

    /// Register a chunk-size listener
    pub fn on_data(&self, listener: DataListener) {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        if !listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            listeners.push(listener);
        }
    }

    /// Split the body into chunks of at most `chunk_size` bytes
    pub fn chunks(&self, chunk_size: usize) -> Vec<Bytes> {
        let chunk_size = chunk_size.max(1);
        let mut chunks = Vec::new();
        for segment in self.segments.iter() {
            let mut offset = 0;
            while offset < segment.len() {
                let end = (offset + chunk_size).min(segment.len());
                chunks.push(segment.slice(offset..end));
                offset = end;
            }
        }
        chunks
    }

    /// Stream the body. Data listeners fire as each chunk is pulled.
    pub fn stream(
        &self,
        chunk_size: usize,
    ) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + Sync + 'static {
        let listeners = self.listeners.clone();
        stream::iter(self.chunks(chunk_size)).map(move |chunk| {
            let snapshot: Vec<DataListener> = listeners
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone();
            for listener in snapshot {
                listener(chunk.len());
            }
            Ok(chunk)
        })
    }

    /// Buffer the whole body
    pub fn to_bytes(&self) -> Bytes {
        if self.segments.len() == 1 {
            return self.segments[0].clone();
        }
        let mut buf = Vec::with_capacity(self.length as usize);
        for segment in self.segments.iter() {
            buf.extend_from_slice(segment);
        }
        Bytes::from(buf)
    }
}
