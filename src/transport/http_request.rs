//! Native XHR-style request built on reqwest

use std::sync::{Arc, Mutex};
use std::time::Instant;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use reqwest::cookie::Jar;
use reqwest::{Body, Client, Method, Url};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::chunk_size;
use crate::error::{UploadError, UploadResult};
use crate::form::EncodedBody;
use crate::http_logger::{self, HttpResponseLog};

use super::{EventSink, RequestEvent, RequestFactory, ResponseSnapshot, XhrRequest};

/// Factory for [`HttpRequest`].
///
/// Requests sent with credentials share the factory's cookie jar: cookies
/// set by one response are sent with later credentialed requests.
/// Requests without credentials neither send nor store cookies.
#[derive(Debug, Clone, Default)]
pub struct HttpRequestFactory {
    chunk_size: Option<usize>,
    cookies: Arc<Jar>,
}

impl HttpRequestFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the progress granularity
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: Some(chunk_size.max(1)),
            ..Self::default()
        }
    }
}

impl RequestFactory for HttpRequestFactory {
    fn create(&self, sink: EventSink) -> Arc<dyn XhrRequest> {
        Arc::new(HttpRequest {
            cookies: Some(self.cookies.clone()),
            ..HttpRequest::new(sink, self.chunk_size.unwrap_or_else(chunk_size))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Unsent,
    Opened,
    Sending,
    Done,
}

struct Shared {
    phase: Phase,
    method: Option<Method>,
    url: Option<Url>,
    headers: Vec<(String, String)>,
    with_credentials: bool,
    task: Option<JoinHandle<()>>,
}

/// Buffers the body, streams it in chunks for progress, and reports
/// completion through the sink from a background task.
pub struct HttpRequest {
    sink: EventSink,
    chunk_size: usize,
    cookies: Option<Arc<Jar>>,
    shared: Arc<Mutex<Shared>>,
}

impl HttpRequest {
    pub fn new(sink: EventSink, chunk_size: usize) -> Self {
        Self {
            sink,
            chunk_size: chunk_size.max(1),
            cookies: None,
            shared: Arc::new(Mutex::new(Shared {
                phase: Phase::Unsent,
                method: None,
                url: None,
                headers: Vec::new(),
                with_credentials: false,
                task: None,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        lock_shared(&self.shared)
    }
}

fn lock_shared(shared: &Mutex<Shared>) -> std::sync::MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

fn is_sending(shared: &Mutex<Shared>) -> bool {
    lock_shared(shared).phase == Phase::Sending
}

/// Claim the terminal event; false if abort got there first
fn finish(shared: &Mutex<Shared>) -> bool {
    let mut guard = lock_shared(shared);
    if guard.phase != Phase::Sending {
        return false;
    }
    guard.phase = Phase::Done;
    guard.task = None;
    true
}

impl XhrRequest for HttpRequest {
    fn set_with_credentials(&self, with_credentials: bool) {
        self.lock().with_credentials = with_credentials;
    }

    fn open(&self, method: &str, url: &str) -> UploadResult<()> {
        let method = Method::from_bytes(method.trim().to_uppercase().as_bytes())
            .map_err(|e| UploadError::Configuration(format!("Invalid method {}: {}", method, e)))?;
        let url = Url::parse(url).map_err(|e| {
            UploadError::Configuration(format!("Destination URL is missing or invalid: {}", e))
        })?;

        let mut shared = self.lock();
        shared.method = Some(method);
        shared.url = Some(url);
        shared.headers.clear();
        shared.phase = Phase::Opened;
        Ok(())
    }

    fn set_request_header(&self, name: &str, value: &str) {
        self.lock()
            .headers
            .push((name.to_string(), value.to_string()));
    }

    fn send(&self, body: Bytes) -> UploadResult<()> {
        let (method, url, headers, cookies) = {
            let mut shared = self.lock();
            if shared.phase != Phase::Opened {
                return Err(UploadError::Configuration(
                    "send() called before open()".to_string(),
                ));
            }
            let (Some(method), Some(url)) = (shared.method.clone(), shared.url.clone()) else {
                return Err(UploadError::Configuration(
                    "send() called before open()".to_string(),
                ));
            };
            shared.phase = Phase::Sending;
            let cookies = if shared.with_credentials {
                // Without a shared jar, cookies live for this request only
                Some(self.cookies.clone().unwrap_or_default())
            } else {
                None
            };
            (method, url, shared.headers.clone(), cookies)
        };

        (self.sink)(RequestEvent::LoadStart);

        let sink = self.sink.clone();
        let shared = self.shared.clone();
        let chunk_size = self.chunk_size;
        let task = tokio::spawn(async move {
            run_request(
                sink,
                shared,
                method,
                url,
                headers,
                cookies,
                body,
                chunk_size,
            )
            .await;
        });

        let mut guard = self.lock();
        if guard.phase == Phase::Sending {
            guard.task = Some(task);
        } else {
            // Aborted between LoadStart and spawn
            task.abort();
        }
        Ok(())
    }

    fn abort(&self) {
        let task = {
            let mut shared = self.lock();
            if shared.phase != Phase::Sending {
                return;
            }
            shared.phase = Phase::Done;
            shared.task.take()
        };
        if let Some(task) = task {
            task.abort();
        }
        debug!("Request aborted");
        (self.sink)(RequestEvent::Abort);
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_request(
    sink: EventSink,
    shared: Arc<Mutex<Shared>>,
    method: Method,
    url: Url,
    headers: Vec<(String, String)>,
    cookies: Option<Arc<Jar>>,
    body: Bytes,
    chunk_size: usize,
) {
    let mut builder = Client::builder();
    if let Some(jar) = cookies {
        builder = builder.cookie_provider(jar);
    }
    let client = match builder.build() {
        Ok(client) => client,
        Err(e) => {
            if finish(&shared) {
                sink(RequestEvent::Error(format!("Failed to build HTTP client: {}", e)));
            }
            return;
        }
    };

    let total = body.len() as u64;
    let http_request_log = http_logger::build_request_log_if_enabled(
        method.as_str(),
        url.as_str(),
        &headers,
        total,
    );

    let progress_sink = sink.clone();
    let progress_shared = shared.clone();
    let mut loaded = 0u64;
    let chunks = EncodedBody::raw(body, "").chunks(chunk_size);
    let stream = stream::iter(chunks).map(move |chunk| {
        loaded += chunk.len() as u64;
        // Late progress can still race an abort; the sink drops it once settled
        if is_sending(&progress_shared) {
            progress_sink(RequestEvent::UploadProgress { loaded, total });
        }
        Ok::<_, std::io::Error>(chunk)
    });

    let mut request = client.request(method, url);
    for (name, value) in &headers {
        request = request.header(name.as_str(), value.as_str());
    }
    let request = request
        .header(reqwest::header::CONTENT_LENGTH, total)
        .body(Body::wrap_stream(stream));

    let start_time = Instant::now();
    let result = match request.send().await {
        Ok(resp) => {
            let status = resp.status().as_u16();
            let response_headers = http_logger::response_headers(&resp);
            match resp.bytes().await {
                Ok(body) => Ok(ResponseSnapshot {
                    status,
                    raw_headers: raw_header_block(&response_headers),
                    body,
                }),
                Err(e) => Err(format!("Failed to read response body: {}", e)),
            }
        }
        Err(e) => Err(format!("Request failed: {}", e)),
    };
    let duration_ms = start_time.elapsed().as_millis() as u64;

    if let Some(ref req_log) = http_request_log {
        match &result {
            Ok(snapshot) => {
                let response_log = HttpResponseLog::from_snapshot(snapshot);
                http_logger::log_request(req_log, Some(&response_log), duration_ms, None);
            }
            Err(e) => http_logger::log_request(req_log, None, duration_ms, Some(e)),
        }
    }

    if !finish(&shared) {
        return;
    }
    match result {
        Ok(snapshot) => sink(RequestEvent::Load(snapshot)),
        Err(e) => {
            warn!("{}", e);
            sink(RequestEvent::Error(e));
        }
    }
}

/// Render headers the way `getAllResponseHeaders` does
fn raw_header_block(headers: &[(String, String)]) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{}: {}\r\n", name, value))
        .collect()
}
