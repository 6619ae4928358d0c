//! Server-style driver that streams the encoded body

use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, Method, Url};
use tracing::{debug, info, warn};

use crate::config::{chunk_size, UploadOptions};
use crate::error::{UploadError, UploadResult};
use crate::form::DataListener;
use crate::http_logger::{self, HttpResponseLog};

use super::base::{UploadBase, UploadState, Uploader};
use super::response::{collect_header_map, ResponseData, TransportHandle, UploadResponse};

/// Streams the body through reqwest and counts chunks as they are sent.
///
/// The total length is always discovered before the first chunk is
/// counted. There is no cancellation: [`Uploader::abort`] does nothing.
pub struct ServerUpload {
    base: Arc<UploadBase>,
    client: Client,
    chunk_size: usize,
}

impl ServerUpload {
    pub fn new(options: UploadOptions) -> UploadResult<Self> {
        options.validate()?;
        let client = Client::builder()
            .build()
            .map_err(|e| UploadError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Self::with_client(options, client)
    }

    /// Reuse an existing client
    pub fn with_client(options: UploadOptions, client: Client) -> UploadResult<Self> {
        Ok(Self {
            base: Arc::new(UploadBase::new(options)?),
            client,
            chunk_size: chunk_size(),
        })
    }

    /// Override the streamed chunk size
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn target(&self) -> UploadResult<(Method, Url)> {
        let url = Url::parse(self.base.url()).map_err(|e| {
            UploadError::Configuration(format!("Destination URL is missing or invalid: {}", e))
        })?;
        let method = Method::from_bytes(self.base.method().trim().to_uppercase().as_bytes())
            .map_err(|e| {
                UploadError::Configuration(format!("Invalid method {}: {}", self.base.method(), e))
            })?;
        Ok((method, url))
    }

    async fn submit(&self) -> UploadResult<UploadResponse> {
        let (method, url) = self.target()?;
        debug!(
            "Submitting to host={} port={} path={}",
            url.host_str().unwrap_or_default(),
            url.port_or_known_default().unwrap_or_default(),
            url.path()
        );

        let body = self.base.form().encode();
        let length = body.length().await?;
        self.base.set_total_bytes(length);

        let base = self.base.clone();
        let on_chunk: DataListener = Arc::new(move |size| {
            base.mark_started();
            base.increase_uploaded_bytes(size as u64);
        });
        body.on_data(on_chunk);

        let http_request_log = http_logger::build_request_log_if_enabled(
            method.as_str(),
            url.as_str(),
            self.base.headers(),
            length,
        );

        let mut request = self.client.request(method.clone(), url.clone());
        for (name, value) in self.base.headers() {
            request = request.header(name.as_str(), value.as_str());
        }
        if !self.base.has_header("content-type") {
            request = request.header(CONTENT_TYPE, body.content_type());
        }
        let request = request
            .header(CONTENT_LENGTH, length)
            .body(Body::wrap_stream(body.stream(self.chunk_size)));

        info!("Uploading {} bytes: {} {}", length, method, url);
        let start_time = Instant::now();

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => {
                return Err(UploadError::Configuration(format!("Invalid request: {}", e)));
            }
            Err(e) => {
                let error_msg = e.to_string();
                warn!("Upload failed: {}", error_msg);
                if let Some(ref req_log) = http_request_log {
                    let duration_ms = start_time.elapsed().as_millis() as u64;
                    http_logger::log_request(req_log, None, duration_ms, Some(&error_msg));
                }
                self.base.set_state(UploadState::Failed);
                self.base.emit_error();
                return Err(UploadError::Transport(error_msg));
            }
        };

        self.base.set_uploaded_bytes(self.base.total_bytes());
        self.base.set_state(UploadState::Successful);

        let status = response.status().as_u16();
        let headers = collect_header_map(response.headers());
        let response_headers = http_logger::response_headers(&response);
        let data = response.bytes().await.map_err(|e| {
            warn!("Failed to read response body: {}", e);
            UploadError::Transport(format!("Failed to read response body: {}", e))
        })?;

        if let Some(ref req_log) = http_request_log {
            let response_log = HttpResponseLog {
                status,
                headers: response_headers,
                body: Some(String::from_utf8_lossy(&data).into_owned()),
            };
            let duration_ms = start_time.elapsed().as_millis() as u64;
            http_logger::log_request(req_log, Some(&response_log), duration_ms, None);
        }

        Ok(UploadResponse {
            data: ResponseData::from_bytes(data),
            status,
            headers,
            handle: TransportHandle::Encoder(body),
        })
    }
}

impl Uploader for ServerUpload {
    fn base(&self) -> &UploadBase {
        &self.base
    }

    fn upload(&self) -> BoxFuture<'_, UploadResult<UploadResponse>> {
        Box::pin(self.submit())
    }

    fn abort(&self) {
        debug!("Abort requested; streamed uploads cannot be cancelled");
    }
}
