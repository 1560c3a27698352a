//! Image attachments sent alongside a user message.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Largest image accepted for inline encoding.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// An uploaded image, before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AttachmentError {
    #[error("unsupported image type: '{0}'")]
    UnsupportedType(String),

    #[error("image is {0} bytes, limit is {MAX_IMAGE_BYTES}")]
    TooLarge(usize),

    #[error("image is empty")]
    Empty,

    #[error("image data is not valid base64")]
    InvalidEncoding,
}

impl ImageAttachment {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Result<Self, AttachmentError> {
        let mime_type = mime_type.into().trim().to_lowercase();
        if !mime_type.starts_with("image/") {
            return Err(AttachmentError::UnsupportedType(mime_type));
        }
        if bytes.is_empty() {
            return Err(AttachmentError::Empty);
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(AttachmentError::TooLarge(bytes.len()));
        }
        Ok(Self { mime_type, bytes })
    }

    /// Decode an attachment delivered as base64 text.
    pub fn from_base64(mime_type: &str, data: &str) -> Result<Self, AttachmentError> {
        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|_| AttachmentError::InvalidEncoding)?;
        Self::new(mime_type, bytes)
    }

    /// Encode as a displayable `data:` URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}
