use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

/// Failure kinds of the suggestion pipeline.
#[derive(Debug, Error)]
pub enum StylistError {
    /// The model endpoint errored, was unreachable, or timed out.
    #[error("upstream model error: {0}")]
    UpstreamModel(String),
    /// Model output did not match the expected structured shape.
    #[error("schema validation error: {0}")]
    SchemaValidation(String),
    /// The image model finished without a usable image.
    #[error("image generation error: {0}")]
    ImageGeneration(String),
    /// The recommendation stage produced nothing usable.
    #[error("no usable outfit suggestions: {0}")]
    NoSuggestions(String),
    /// Inbound payload is not a data URI of a decodable raster image.
    #[error("invalid image: {0}")]
    InvalidImage(String),
    /// Malformed client input other than the image itself.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl StylistError {
    pub fn kind(&self) -> &'static str {
        match self {
            StylistError::UpstreamModel(_) => "upstream_model",
            StylistError::SchemaValidation(_) => "schema_validation",
            StylistError::ImageGeneration(_) => "image_generation",
            StylistError::NoSuggestions(_) => "no_suggestions",
            StylistError::InvalidImage(_) => "invalid_image",
            StylistError::InvalidRequest(_) => "invalid_request",
        }
    }
}

pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to generate outfit suggestions. The AI model might be unavailable or the image could not be processed. Please try again later.";

/// HTTP face of [`StylistError`].
#[derive(Debug)]
pub struct ApiError(pub StylistError);

impl From<StylistError> for ApiError {
    fn from(e: StylistError) -> Self { ApiError(e) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            StylistError::InvalidImage(reason) | StylistError::InvalidRequest(reason) => {
                (StatusCode::BAD_REQUEST, reason.clone())
            }
            _ => (StatusCode::BAD_GATEWAY, GENERIC_FAILURE_MESSAGE.to_string()),
        };
        let body = json!({
            "error": message,
            "kind": self.0.kind(),
        });
        (status, Json(body)).into_response()
    }
}
