//! Event-driven request transport
//!
//! An XHR-style request object: configure, `send` once, and receive
//! lifecycle events through a sink. The browser driver is written against
//! these traits; [`HttpRequest`] is the native implementation.

mod http_request;

use std::sync::{Arc, OnceLock};

use bytes::Bytes;

use crate::error::UploadResult;

pub use http_request::{HttpRequest, HttpRequestFactory};

/// Buffered response handed over with [`RequestEvent::Load`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSnapshot {
    pub status: u16,
    /// Header block as `name: value` lines separated by CRLF
    pub raw_headers: String,
    pub body: Bytes,
}

/// Lifecycle events emitted by a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestEvent {
    /// The transfer started
    LoadStart,
    /// Absolute upload progress
    UploadProgress { loaded: u64, total: u64 },
    /// The server answered (any status)
    Load(ResponseSnapshot),
    /// Connection-level failure
    Error(String),
    /// Cancelled through [`XhrRequest::abort`]
    Abort,
}

/// Receives events, possibly from another thread
pub type EventSink = Arc<dyn Fn(RequestEvent) + Send + Sync>;

/// An event-driven request object.
///
/// After `send`, exactly one of `Load`, `Error` or `Abort` is emitted.
/// `abort` emits `Abort` synchronously while a transfer is in flight and
/// does nothing otherwise.
pub trait XhrRequest: Send + Sync {
    fn set_with_credentials(&self, with_credentials: bool);

    fn open(&self, method: &str, url: &str) -> UploadResult<()>;

    fn set_request_header(&self, name: &str, value: &str);

    fn send(&self, body: Bytes) -> UploadResult<()>;

    fn abort(&self);
}

/// Creates request objects bound to an event sink
pub trait RequestFactory: Send + Sync {
    fn create(&self, sink: EventSink) -> Arc<dyn XhrRequest>;
}

static REQUEST_FACTORY: OnceLock<Arc<dyn RequestFactory>> = OnceLock::new();

/// Install the process-wide request factory.
/// Returns false if one was already installed.
pub fn install_request_factory(factory: Arc<dyn RequestFactory>) -> bool {
    REQUEST_FACTORY.set(factory).is_ok()
}

/// The installed request factory, if any
pub fn installed_request_factory() -> Option<Arc<dyn RequestFactory>> {
    REQUEST_FACTORY.get().cloned()
}
