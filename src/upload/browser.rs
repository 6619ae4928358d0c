//! Browser-style driver over an event-driven request object

use std::sync::{Arc, Mutex, OnceLock};

use futures::future::BoxFuture;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::UploadOptions;
use crate::error::{UploadError, UploadResult};
use crate::transport::{
    installed_request_factory, EventSink, HttpRequestFactory, RequestEvent, RequestFactory,
    ResponseSnapshot, XhrRequest,
};

use super::base::{UploadBase, UploadState, Uploader};
use super::response::{parse_raw_headers, ResponseData, TransportHandle, UploadResponse};

type Settle = Arc<Mutex<Option<oneshot::Sender<UploadResult<ResponseSnapshot>>>>>;

fn settle(slot: &Settle, result: UploadResult<ResponseSnapshot>) {
    let sender = slot.lock().unwrap_or_else(|e| e.into_inner()).take();
    if let Some(sender) = sender {
        let _ = sender.send(result);
    }
}

/// Native factory shared by every browser upload, so credentialed
/// requests see one cookie jar.
fn default_request_factory() -> Arc<dyn RequestFactory> {
    static DEFAULT: OnceLock<Arc<dyn RequestFactory>> = OnceLock::new();
    DEFAULT
        .get_or_init(|| Arc::new(HttpRequestFactory::new()) as Arc<dyn RequestFactory>)
        .clone()
}

#[derive(Default)]
struct ActiveRequest {
    request: Option<Arc<dyn XhrRequest>>,
    /// `abort` ran while the request was still being set up
    abort_requested: bool,
}

/// Uploads through an [`XhrRequest`], buffering the whole body.
///
/// The request is created, opened and sent inside [`Uploader::upload`]
/// itself. Aborting leaves the returned future pending forever; watch the
/// `aborted` state instead.
pub struct BrowserUpload {
    base: Arc<UploadBase>,
    factory: Arc<dyn RequestFactory>,
    active: Mutex<ActiveRequest>,
}

impl BrowserUpload {
    /// Use the installed request factory, or the shared native one
    pub fn new(options: UploadOptions) -> UploadResult<Self> {
        let factory = installed_request_factory().unwrap_or_else(default_request_factory);
        Self::with_factory(options, factory)
    }

    pub fn with_factory(
        options: UploadOptions,
        factory: Arc<dyn RequestFactory>,
    ) -> UploadResult<Self> {
        Ok(Self {
            base: Arc::new(UploadBase::new(options)?),
            factory,
            active: Mutex::new(ActiveRequest::default()),
        })
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, ActiveRequest> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn event_sink(&self, slot: Settle) -> EventSink {
        let base = self.base.clone();
        Arc::new(move |event| match event {
            RequestEvent::LoadStart => base.mark_started(),
            RequestEvent::UploadProgress { loaded, total } => {
                if !base.apply_transfer_progress(loaded, total) {
                    debug!("Ignoring progress after {}", base.state());
                }
            }
            RequestEvent::Load(snapshot) => {
                if base.state().is_terminal() {
                    return;
                }
                base.set_uploaded_bytes(base.total_bytes());
                base.set_state(UploadState::Successful);
                settle(&slot, Ok(snapshot));
            }
            RequestEvent::Error(message) => {
                if base.state().is_terminal() {
                    return;
                }
                base.set_state(UploadState::Failed);
                base.emit_error();
                settle(&slot, Err(UploadError::Transport(message)));
            }
            RequestEvent::Abort => {
                if base.state().is_terminal() {
                    return;
                }
                base.set_state(UploadState::Aborted);
                // Drop the sender without settling
                slot.lock().unwrap_or_else(|e| e.into_inner()).take();
            }
        })
    }

    /// Create, configure and send the request
    fn start(
        &self,
    ) -> UploadResult<(
        Arc<dyn XhrRequest>,
        oneshot::Receiver<UploadResult<ResponseSnapshot>>,
    )> {
        let (tx, rx) = oneshot::channel();
        let request = self
            .factory
            .create(self.event_sink(Arc::new(Mutex::new(Some(tx)))));

        if self.base.with_credentials() {
            request.set_with_credentials(true);
        }
        request.open(self.base.method(), self.base.url())?;

        for (name, value) in self.base.headers() {
            request.set_request_header(name, value);
        }

        let body = self.base.form().encode();
        if !self.base.has_header("content-type") {
            request.set_request_header("Content-Type", body.content_type());
        }

        self.lock_active().request = Some(request.clone());

        let body = body.to_bytes();
        info!(
            "Uploading {} bytes: {} {}",
            body.len(),
            self.base.method(),
            self.base.url()
        );
        request.send(body)?;

        // An abort that raced with setup found the request not yet sending
        if self.lock_active().abort_requested {
            request.abort();
        }
        Ok((request, rx))
    }
}

impl Uploader for BrowserUpload {
    fn base(&self) -> &UploadBase {
        &self.base
    }

    fn upload(&self) -> BoxFuture<'_, UploadResult<UploadResponse>> {
        let started = self.start();
        Box::pin(async move {
            let (request, rx) = started?;
            match rx.await {
                Ok(Ok(snapshot)) => Ok(UploadResponse {
                    data: ResponseData::from_bytes(snapshot.body),
                    status: snapshot.status,
                    headers: parse_raw_headers(&snapshot.raw_headers),
                    handle: TransportHandle::Request(request),
                }),
                Ok(Err(e)) => Err(e),
                Err(_) if self.base.state() == UploadState::Aborted => {
                    debug!("Upload aborted, result left pending: {}", self.base.url());
                    std::future::pending().await
                }
                Err(_) => {
                    warn!("Transport closed without a result: {}", self.base.url());
                    self.base.set_state(UploadState::Failed);
                    self.base.emit_error();
                    Err(UploadError::Transport(
                        "Request ended without a response".to_string(),
                    ))
                }
            }
        })
    }

    fn abort(&self) {
        let request = {
            let mut active = self.lock_active();
            if active.request.is_some() {
                active.abort_requested = true;
            }
            active.request.clone()
        };
        if let Some(request) = request {
            request.abort();
        }
    }
}
