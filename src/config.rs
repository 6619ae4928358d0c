//! Configuration module - upload options and environment settings

use std::sync::OnceLock;

use crate::error::{UploadError, UploadResult};
use crate::form::FormInput;

/// Environment variable to force a driver (`auto`, `browser`, `server`)
pub const ENV_UPLOAD_DRIVER: &str = "UPLOAD_DRIVER";

/// Environment variable for the streamed chunk size in bytes
pub const ENV_UPLOAD_CHUNK_SIZE: &str = "UPLOAD_CHUNK_SIZE";

/// Request method used when none is configured
pub const DEFAULT_METHOD: &str = "POST";

/// Default chunk size for streamed and buffered bodies (64KB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Options shared by every upload driver
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Field map, prebuilt multipart form, or raw body
    pub form: FormInput,
    /// Absolute destination URL (required)
    pub url: String,
    /// Extra request headers, applied in order
    pub headers: Vec<(String, String)>,
    /// Request method, `POST` when unset
    pub method: Option<String>,
    /// Send credentials with the request (browser driver only)
    pub with_credentials: bool,
}

impl UploadOptions {
    pub fn new(url: impl Into<String>, form: impl Into<FormInput>) -> Self {
        Self {
            form: form.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_credentials(mut self, with_credentials: bool) -> Self {
        self.with_credentials = with_credentials;
        self
    }

    /// Effective request method
    pub fn method_or_default(&self) -> &str {
        match self.method.as_deref() {
            Some(m) if !m.trim().is_empty() => m,
            _ => DEFAULT_METHOD,
        }
    }

    /// Only the URL is checked eagerly; form problems surface from the driver
    pub fn validate(&self) -> UploadResult<()> {
        if self.url.trim().is_empty() {
            return Err(UploadError::Configuration(
                "Destination URL is missing or invalid.".to_string(),
            ));
        }
        Ok(())
    }
}

/// Driver preference read from the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverPreference {
    /// Pick from the runtime (default)
    Auto,
    /// Always use the event-driven request driver
    Browser,
    /// Always use the streaming driver
    Server,
}

impl std::fmt::Display for DriverPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Browser => write!(f, "browser"),
            Self::Server => write!(f, "server"),
        }
    }
}

impl DriverPreference {
    /// Parse from environment variable string
    pub fn from_env_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "browser" | "xhr" => Self::Browser,
            "server" | "stream" => Self::Server,
            _ => Self::Auto, // default
        }
    }

    /// Read `UPLOAD_DRIVER`
    pub fn from_env() -> Self {
        std::env::var(ENV_UPLOAD_DRIVER)
            .map(|v| Self::from_env_str(&v))
            .unwrap_or(Self::Auto)
    }
}

/// Parse a chunk size setting, falling back to the default on bad input
pub fn parse_chunk_size(value: Option<&str>) -> usize {
    value
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|size| *size > 0)
        .unwrap_or(DEFAULT_CHUNK_SIZE)
}

/// Chunk size for the lifetime of the process
pub fn chunk_size() -> usize {
    static CHUNK_SIZE: OnceLock<usize> = OnceLock::new();
    *CHUNK_SIZE.get_or_init(|| {
        let value = std::env::var(ENV_UPLOAD_CHUNK_SIZE).ok();
        parse_chunk_size(value.as_deref())
    })
}
