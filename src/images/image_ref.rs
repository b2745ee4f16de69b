//! Displayable image references
//!
//! An image returned by the inference endpoint is kept in memory as raw
//! bytes plus a MIME type. Chat surfaces render it as a `data:` URI, which
//! is also what the HTTP API hands out in entry listings.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors turning a payload or URI into an `ImageRef`
#[derive(Debug, Error)]
pub enum ImageRefError {
    #[error("image payload is empty")]
    Empty,

    #[error("not a base64 data URI")]
    NotADataUri,

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// MIME type for payloads whose format is not recognized
pub const OCTET_STREAM: &str = "application/octet-stream";

/// In-memory image attached to a conversation entry
#[derive(Clone, PartialEq, Eq)]
pub struct ImageRef {
    data: Vec<u8>,
    mime_type: String,
}

impl ImageRef {
    /// Wrap already-validated image bytes
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// Decode an endpoint response body into a displayable image.
    ///
    /// An `image/*` content type is trusted as-is; anything else falls back
    /// to sniffing the magic bytes. Payloads of unknown format are kept as
    /// `application/octet-stream` so any non-empty body stays displayable.
    pub fn decode(data: Vec<u8>, content_type: Option<&str>) -> Result<Self, ImageRefError> {
        if data.is_empty() {
            return Err(ImageRefError::Empty);
        }

        let declared = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase())
            .filter(|ct| ct.starts_with("image/"));

        let mime_type = declared.unwrap_or_else(|| {
            sniff_mime_type(&data)
                .unwrap_or(OCTET_STREAM)
                .to_string()
        });

        Ok(Self { data, mime_type })
    }

    /// Raw image bytes
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume into raw image bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// MIME type, e.g. `image/png`
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// File extension matching the MIME type
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/png" => "png",
            _ => "bin",
        }
    }

    /// SHA-256 hex digest of the payload
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.data);
        format!("{:x}", hasher.finalize())
    }

    /// Render as `data:<mime>;base64,<payload>`
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.data))
    }

    /// Parse a `data:<mime>;base64,<payload>` URI
    pub fn from_data_uri(uri: &str) -> Result<Self, ImageRefError> {
        let rest = uri.strip_prefix("data:").ok_or(ImageRefError::NotADataUri)?;
        let (header, payload) = rest.split_once(',').ok_or(ImageRefError::NotADataUri)?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or(ImageRefError::NotADataUri)?;

        let data = BASE64.decode(payload)?;
        if data.is_empty() {
            return Err(ImageRefError::Empty);
        }

        Ok(Self {
            data,
            mime_type: mime_type.to_string(),
        })
    }
}

impl fmt::Debug for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageRef")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

impl Serialize for ImageRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_data_uri())
    }
}

/// Identify common image formats by their magic bytes
pub fn sniff_mime_type(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}
