//! Form body providers
//!
//! Turns caller input into an [`EncodedBody`]:
//! - flat field maps are synthesized into multipart bodies
//! - prebuilt [`MultipartForm`]s are encoded as-is
//! - raw bodies are sent verbatim

mod body;
mod fields;
mod multipart;

use bytes::Bytes;

pub use body::{DataListener, EncodedBody};
pub use fields::{FieldValue, FormFields};
pub use multipart::MultipartForm;

/// Content type for text bodies
pub const TEXT_CONTENT_TYPE: &str = "text/plain;charset=UTF-8";

/// Content type for binary bodies
pub const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

/// What gets uploaded
#[derive(Debug, Clone)]
pub enum FormInput {
    /// Field map, encoded as multipart
    Fields(FormFields),
    /// Prebuilt multipart form
    Multipart(MultipartForm),
    /// Body sent verbatim
    Raw { data: Bytes, content_type: String },
}

impl Default for FormInput {
    fn default() -> Self {
        Self::Fields(FormFields::default())
    }
}

impl FormInput {
    /// Raw text body
    pub fn text(text: impl Into<String>) -> Self {
        Self::Raw {
            data: Bytes::from(text.into()),
            content_type: TEXT_CONTENT_TYPE.to_string(),
        }
    }

    /// Raw binary body
    pub fn bytes(data: impl Into<Bytes>) -> Self {
        Self::Raw {
            data: data.into(),
            content_type: BINARY_CONTENT_TYPE.to_string(),
        }
    }

    /// Serialize into a sendable body
    pub fn encode(&self) -> EncodedBody {
        match self {
            Self::Fields(fields) => MultipartForm::from_fields(fields).encode(),
            Self::Multipart(form) => form.encode(),
            Self::Raw { data, content_type } => EncodedBody::raw(data.clone(), content_type.clone()),
        }
    }
}

impl From<FormFields> for FormInput {
    fn from(fields: FormFields) -> Self {
        Self::Fields(fields)
    }
}

impl From<MultipartForm> for FormInput {
    fn from(form: MultipartForm) -> Self {
        Self::Multipart(form)
    }
}
