//! formlift library - multipart form uploads with progress and state events

pub mod config;
pub mod error;
pub mod form;
pub mod http_logger;
pub mod transport;
pub mod upload;

// Re-export commonly used types
pub use config::{DriverPreference, UploadOptions};
pub use error::{UploadError, UploadResult};
pub use form::{EncodedBody, FieldValue, FormFields, FormInput, MultipartForm};
pub use transport::{install_request_factory, HttpRequestFactory, RequestFactory, XhrRequest};
pub use upload::{
    upload, BrowserUpload, DriverKind, Listener, ServerUpload, Upload, UploadFnOptions,
    UploadResponse, UploadState, Uploader,
};
