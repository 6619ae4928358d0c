//! Driver selection

use std::sync::OnceLock;

use futures::future::BoxFuture;
use tracing::debug;

use crate::config::{DriverPreference, UploadOptions};
use crate::error::UploadResult;
use crate::transport::installed_request_factory;

use super::base::{UploadBase, Uploader};
use super::browser::BrowserUpload;
use super::response::UploadResponse;
use super::server::ServerUpload;

/// Which driver performs uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    Browser,
    Server,
}

impl DriverKind {
    /// An explicit preference wins; otherwise an installed request factory
    /// selects the browser driver.
    pub fn detect(preference: DriverPreference, has_request_factory: bool) -> Self {
        match preference {
            DriverPreference::Browser => Self::Browser,
            DriverPreference::Server => Self::Server,
            DriverPreference::Auto if has_request_factory => Self::Browser,
            DriverPreference::Auto => Self::Server,
        }
    }

    /// Detected once, then fixed for the process
    pub fn current() -> Self {
        static KIND: OnceLock<DriverKind> = OnceLock::new();
        *KIND.get_or_init(|| {
            let kind = Self::detect(
                DriverPreference::from_env(),
                installed_request_factory().is_some(),
            );
            debug!("Selected {:?} upload driver", kind);
            kind
        })
    }
}

/// Uniform entry point over both drivers
pub enum Upload {
    Browser(BrowserUpload),
    Server(ServerUpload),
}

impl Upload {
    /// Construct with the process-wide driver
    pub fn new(options: UploadOptions) -> UploadResult<Self> {
        Self::with_driver(DriverKind::current(), options)
    }

    pub fn with_driver(kind: DriverKind, options: UploadOptions) -> UploadResult<Self> {
        Ok(match kind {
            DriverKind::Browser => Self::Browser(BrowserUpload::new(options)?),
            DriverKind::Server => Self::Server(ServerUpload::new(options)?),
        })
    }

    pub fn kind(&self) -> DriverKind {
        match self {
            Self::Browser(_) => DriverKind::Browser,
            Self::Server(_) => DriverKind::Server,
        }
    }
}

impl Uploader for Upload {
    fn base(&self) -> &UploadBase {
        match self {
            Self::Browser(u) => u.base(),
            Self::Server(u) => u.base(),
        }
    }

    fn upload(&self) -> BoxFuture<'_, UploadResult<UploadResponse>> {
        match self {
            Self::Browser(u) => u.upload(),
            Self::Server(u) => u.upload(),
        }
    }

    fn abort(&self) {
        match self {
            Self::Browser(u) => u.abort(),
            Self::Server(u) => u.abort(),
        }
    }
}
