//! One-shot upload helper

use std::sync::Arc;

use crate::config::UploadOptions;
use crate::error::UploadResult;
use crate::form::FormInput;

use super::base::{Listener, ProgressListener, UploadBase, Uploader};
use super::response::UploadResponse;
use super::select::Upload;

/// Options for [`upload`]; everything except the URL and form
#[derive(Clone, Default)]
pub struct UploadFnOptions {
    pub headers: Vec<(String, String)>,
    pub method: Option<String>,
    pub with_credentials: bool,
    pub on_progress: Option<ProgressListener>,
}

impl UploadFnOptions {
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn on_progress(mut self, f: impl Fn(&UploadBase, f64) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }
}

/// Construct an upload with the selected driver, attach the progress
/// listener, and await the result.
pub async fn upload(
    url: impl Into<String>,
    form: impl Into<FormInput>,
    options: UploadFnOptions,
) -> UploadResult<UploadResponse> {
    let UploadFnOptions {
        headers,
        method,
        with_credentials,
        on_progress,
    } = options;

    let uploader = Upload::new(UploadOptions {
        form: form.into(),
        url: url.into(),
        headers,
        method,
        with_credentials,
    })?;

    if let Some(listener) = on_progress {
        uploader.on(Listener::Progress(listener));
    }

    uploader.upload().await
}
