//! Upload drivers
//!
//! [`UploadBase`] keeps state and progress; [`BrowserUpload`] and
//! [`ServerUpload`] move the bytes; [`Upload`] picks one per process.

mod base;
mod browser;
mod function;
mod response;
mod select;
mod server;

pub use base::{
    ErrorListener, EventKind, Listener, ProgressListener, StateListener, UploadBase, UploadState,
    Uploader,
};
pub use browser::BrowserUpload;
pub use function::{upload, UploadFnOptions};
pub use response::{parse_raw_headers, HeaderField, ResponseData, TransportHandle, UploadResponse};
pub use select::{DriverKind, Upload};
pub use server::ServerUpload;
