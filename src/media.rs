//! Image payloads in the `data:<mime-type>;base64,<payload>` interchange form.

use base64::Engine;
use bytes::Bytes;
use serde::{Serialize, Serializer};

use crate::error::StylistError;

const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Self-describing binary image: raw bytes plus their MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub data: Bytes,
}

impl std::fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

impl ImagePayload {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self { mime_type: mime_type.into(), data: data.into() }
    }

    /// Parses a data URI. Only checks syntax; see [`ImagePayload::ensure_raster`].
    pub fn from_data_uri(uri: &str) -> Result<Self, StylistError> {
        let rest = uri
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| StylistError::InvalidImage("expected a data URI starting with 'data:'".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| StylistError::InvalidImage("data URI has no ',' separator".into()))?;
        let header = header
            .strip_suffix(";base64")
            .ok_or_else(|| StylistError::InvalidImage("data URI must be base64 encoded".into()))?;
        let mime_type = header.split(';').next().unwrap_or_default().trim();
        if mime_type.is_empty() {
            return Err(StylistError::InvalidImage("data URI has no MIME type".into()));
        }
        Self::from_base64(mime_type, payload).map_err(|e| match e {
            StylistError::SchemaValidation(msg) => StylistError::InvalidImage(msg),
            other => other,
        })
    }

    /// Decodes a bare base64 body, as the model API returns it.
    pub fn from_base64(mime_type: &str, payload: &str) -> Result<Self, StylistError> {
        let data = B64
            .decode(payload.trim())
            .map_err(|e| StylistError::SchemaValidation(format!("invalid base64 payload: {e}")))?;
        if data.is_empty() {
            return Err(StylistError::SchemaValidation("empty image payload".into()));
        }
        Ok(Self::new(mime_type.to_ascii_lowercase(), data))
    }

    pub fn base64_data(&self) -> String {
        B64.encode(&self.data)
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64_data())
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Rejects payloads that are oversized or not a decodable raster image.
    pub fn ensure_raster(&self, max_bytes: usize) -> Result<(), StylistError> {
        if !self.mime_type.starts_with("image/") {
            return Err(StylistError::InvalidImage(format!("unsupported MIME type '{}'", self.mime_type)));
        }
        if self.data.len() > max_bytes {
            return Err(StylistError::InvalidImage(format!(
                "image is {} bytes, limit is {} bytes",
                self.data.len(),
                max_bytes
            )));
        }
        image::load_from_memory(&self.data)
            .map_err(|e| StylistError::InvalidImage(format!("image could not be decoded: {e}")))?;
        Ok(())
    }
}

impl Serialize for ImagePayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_data_uri())
    }
}

/// Short human-readable preview of a long string for log lines.
pub(crate) fn preview(data: &str) -> String {
    if data.len() > 50 {
        format!("{}...[{} chars total]", &data[..50], data.len())
    } else {
        data.to_string()
    }
}
