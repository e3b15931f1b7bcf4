use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};

use crate::{
    error::{ApiError, StylistError},
    media::ImagePayload,
    models::{
        AnalyzeRequest, ClothingAttributes, GenerateRequest, OutfitSuggestion, RecommendRequest,
        StylingHints, SuggestionSet, TargetGender, Validate,
    },
    pipeline::Stylist,
};

#[derive(Clone)]
pub struct AppState {
    pub stylist: Arc<Stylist>,
    pub max_upload_bytes: usize,
}

pub fn build_router(state: AppState) -> Router {
    // Room for base64 inflation plus the JSON envelope.
    let body_limit = state.max_upload_bytes / 3 * 4 + 64 * 1024;

    Router::new()
        .route("/health", get(health))
        .route("/api/suggestions", post(generate_suggestions))
        .route("/api/suggestions/upload", post(upload_suggestions))
        .route("/api/analyze", post(analyze_image))
        .route("/api/recommendations", post(recommend_styles))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "backend": state.stylist.backend_name() }))
}

pub async fn generate_suggestions(
    State(state): State<AppState>,
    Json(body): Json<GenerateRequest>,
) -> Result<Json<SuggestionSet>, ApiError> {
    let image = ImagePayload::from_data_uri(&body.photo_data_uri)?;
    tracing::info!("📸 Suggestion request: {} ({} bytes)", image.mime_type, image.data.len());
    let set = state.stylist.generate_suggestions(&image, &body.styling_hints).await?;
    Ok(Json(set))
}

pub async fn upload_suggestions(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SuggestionSet>, ApiError> {
    let mut upload: Option<ImagePayload> = None;
    let mut hints = StylingHints::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| StylistError::InvalidRequest(format!("multipart error: {e}")))?
    {
        let field_name = field.name().map(|n| n.to_string());
        match field_name.as_deref() {
            Some("file") => {
                let declared = field.content_type().map(|c| c.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| StylistError::InvalidRequest(format!("read error: {e}")))?;
                let mime_type = declared
                    .filter(|m| m.starts_with("image/"))
                    .or_else(|| image::guess_format(&data).ok().map(|f| f.to_mime_type().to_string()))
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                upload = Some(ImagePayload::new(mime_type, data));
            }
            Some("gender") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| StylistError::InvalidRequest(format!("read error: {e}")))?;
                hints.gender = parse_gender(&value)?;
            }
            _ => {} // ignore unknown fields
        }
    }

    let image = upload.ok_or_else(|| StylistError::InvalidRequest("missing 'file' in multipart form".into()))?;
    tracing::info!("📸 Upload request: {} ({} bytes)", image.mime_type, image.data.len());
    let set = state.stylist.generate_suggestions(&image, &hints).await?;
    Ok(Json(set))
}

fn parse_gender(value: &str) -> Result<Option<TargetGender>, StylistError> {
    match value.trim().to_lowercase().as_str() {
        "" => Ok(None),
        "male" | "man" | "men" => Ok(Some(TargetGender::Male)),
        "female" | "woman" | "women" => Ok(Some(TargetGender::Female)),
        "unisex" => Ok(Some(TargetGender::Unisex)),
        other => Err(StylistError::InvalidRequest(format!("unknown gender '{other}'"))),
    }
}

pub async fn analyze_image(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeRequest>,
) -> Result<Json<ClothingAttributes>, ApiError> {
    let image = ImagePayload::from_data_uri(&body.photo_data_uri)?;
    let attributes = state.stylist.analyze(&image).await?;
    Ok(Json(attributes))
}

pub async fn recommend_styles(
    State(state): State<AppState>,
    Json(body): Json<RecommendRequest>,
) -> Result<Json<Vec<OutfitSuggestion>>, ApiError> {
    body.attributes
        .validate()
        .map_err(|e| StylistError::InvalidRequest(e.to_string()))?;
    let suggestions = state.stylist.recommend(&body.attributes, &body.styling_hints).await?;
    if suggestions.is_empty() {
        return Err(StylistError::NoSuggestions("model returned an empty list".into()).into());
    }
    Ok(Json(suggestions))
}
