use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    backend::{GenerativeBackend, ImageRequest, PromptPart, StructuredRequest},
    error::StylistError,
    media::{preview, ImagePayload},
};

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("HTTP error: {0}")] Http(String),
    #[error("Other: {0}")] Other(String),
}

impl From<GeminiError> for StylistError {
    fn from(e: GeminiError) -> Self {
        StylistError::UpstreamModel(e.to_string())
    }
}

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let Value::String(s) = val {
                        if s.len() > 100 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=') {
                            *val = Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

fn loggable(value: &Value) -> String {
    let mut copy = value.clone();
    truncate_base64_in_json(&mut copy);
    serde_json::to_string(&copy).unwrap_or_default()
}

/// Client for the Gemini `generateContent` REST endpoint.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self, GeminiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GeminiError::Other(e.to_string()))?;
        Ok(Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string() })
    }

    async fn perform_api_call(&self, model: &str, request_body: &Value) -> Result<GeminiResponse, GeminiError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        info!("🔗 Making request to: {}", url);
        info!("📤 Request body: {}", loggable(request_body));

        let response = self.client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request_body)
            .send()
            .await
            .map_err(|e| GeminiError::Http(e.without_url().to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        let response_text = response.text().await
            .map_err(|e| GeminiError::Http(e.without_url().to_string()))?;

        if !status.is_success() {
            error!("❌ API Error response: {}", response_text);
            return Err(GeminiError::Http(format!("status={} body={}", status, response_text)));
        }

        let raw: Value = serde_json::from_str(&response_text)
            .map_err(|e| GeminiError::Other(format!("parse error: {}", e)))?;
        info!("📥 Raw Gemini API response: {}", loggable(&raw));

        serde_json::from_value(raw).map_err(|e| GeminiError::Other(format!("parse error: {}", e)))
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate_json(&self, request: &StructuredRequest) -> Result<Value, StylistError> {
        info!("Generating {:?} with {}...", request.task, request.model);
        let body = structured_body(request);
        let parsed = self.perform_api_call(&request.model, &body).await?;

        let text = extract_first_text(&parsed).ok_or_else(|| {
            StylistError::UpstreamModel(format!("no text in response{}", block_reason(&parsed)))
        })?;
        serde_json::from_str(strip_code_fence(&text))
            .map_err(|e| StylistError::SchemaValidation(format!("model output is not JSON: {e}")))
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<Option<ImagePayload>, StylistError> {
        info!("Generating image with {}...", request.model);
        let body = image_body(request);
        let parsed = self.perform_api_call(&request.model, &body).await?;

        let image = extract_first_image(&parsed)?;
        match &image {
            Some(img) => info!("🖼️ Extracted {} image from API response: {}", img.mime_type, preview(&img.base64_data())),
            None => warn!("⚠️ No image data found in API response{}", block_reason(&parsed)),
        }
        Ok(image)
    }
}

// --- Request building ---

fn contents(parts: &[PromptPart]) -> Value {
    let parts: Vec<Value> = parts
        .iter()
        .map(|p| match p {
            PromptPart::Text(text) => json!({ "text": text }),
            PromptPart::Image(img) => json!({
                "inlineData": { "mimeType": img.mime_type, "data": img.base64_data() }
            }),
        })
        .collect();
    json!([{ "role": "user", "parts": parts }])
}

fn structured_body(request: &StructuredRequest) -> Value {
    json!({
        "contents": contents(&request.parts),
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": request.schema,
            "temperature": 0.7,
            "topP": 0.95,
            "candidateCount": 1
        }
    })
}

fn image_body(request: &ImageRequest) -> Value {
    json!({
        "contents": contents(&request.parts),
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"],
            "temperature": 0.4,
            "topP": 0.95,
            "topK": 64,
            "candidateCount": 1
        }
    })
}

/// Models sometimes wrap JSON in a markdown fence despite the MIME type.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else { return trimmed };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Content }

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData
    },
    Text { text: String },
    Other(Value)
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

fn block_reason(resp: &GeminiResponse) -> String {
    resp.prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
        .map(|r| format!(" (blocked: {r})"))
        .unwrap_or_default()
}

fn extract_first_text(resp: &GeminiResponse) -> Option<String> {
    resp.candidates
        .iter()
        .flat_map(|c| &c.content.parts)
        .find_map(|p| match p {
            Part::Text { text } if !text.trim().is_empty() => Some(text.trim().to_string()),
            _ => None,
        })
}

fn extract_first_image(resp: &GeminiResponse) -> Result<Option<ImagePayload>, StylistError> {
    for c in &resp.candidates {
        for p in &c.content.parts {
            if let Part::Inline { inline_data } = p {
                if !inline_data.mime_type.starts_with("image/") {
                    continue;
                }
                info!("🎯 Found image data with mime type: {}", inline_data.mime_type);
                return ImagePayload::from_base64(&inline_data.mime_type, &inline_data.data).map(Some);
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StructuredTask;
    use pretty_assertions::assert_eq;

    fn response(value: Value) -> GeminiResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn extracts_image_after_text_part() {
        let resp = response(json!({ "candidates": [{ "content": { "parts": [
            { "text": "Here is your outfit" },
            { "inlineData": { "mimeType": "image/png", "data": "AQID" } }
        ]}}]}));
        let img = extract_first_image(&resp).unwrap().unwrap();
        assert_eq!(img.mime_type, "image/png");
        assert_eq!(&img.data[..], &[1u8, 2, 3][..]);
        assert_eq!(extract_first_text(&resp).as_deref(), Some("Here is your outfit"));
    }

    #[test]
    fn text_only_response_has_no_image() {
        let resp = response(json!({ "candidates": [{ "content": { "parts": [{ "text": "sorry" }] } }] }));
        assert!(extract_first_image(&resp).unwrap().is_none());
    }

    #[test]
    fn blocked_prompt_is_reported() {
        let resp = response(json!({ "promptFeedback": { "blockReason": "SAFETY" } }));
        assert!(extract_first_text(&resp).is_none());
        assert_eq!(block_reason(&resp), " (blocked: SAFETY)");
    }

    #[test]
    fn structured_body_carries_schema_and_image() {
        let request = StructuredRequest {
            task: StructuredTask::ClothingAnalysis,
            model: "gemini-2.0-flash".into(),
            parts: vec![
                PromptPart::Text("analyze".into()),
                PromptPart::Image(ImagePayload::new("image/jpeg", vec![1u8, 2, 3])),
            ],
            schema: json!({ "type": "OBJECT" }),
        };
        let body = structured_body(&request);
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
        assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["data"], "AQID");
    }

    #[test]
    fn image_body_requests_image_modality() {
        let body = image_body(&ImageRequest { model: "m".into(), parts: vec![PromptPart::Text("x".into())] });
        assert_eq!(body["generationConfig"]["responseModalities"], json!(["TEXT", "IMAGE"]));
    }

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn long_base64_is_truncated_for_logs() {
        let data = "A".repeat(400);
        let logged = loggable(&json!({ "inlineData": { "data": data } }));
        assert!(logged.contains("[truncated 350 chars]"));
        assert!(logged.len() < 200);
    }

    #[test]
    fn long_non_ascii_data_is_left_intact() {
        let data = "é".repeat(80);
        let logged = loggable(&json!({ "parts": [{ "data": data }] }));
        assert!(logged.contains(&data));
        assert!(!logged.contains("truncated"));
    }

    #[tokio::test]
    async fn transport_errors_do_not_leak_the_api_key() {
        let client = GeminiClient::new(
            "SECRET-KEY-12345".into(),
            "http://127.0.0.1:1/v1beta".into(),
            Duration::from_secs(2),
        )
        .unwrap();
        let request = StructuredRequest {
            task: StructuredTask::ClothingAnalysis,
            model: "gemini-2.0-flash".into(),
            parts: vec![PromptPart::Text("analyze".into())],
            schema: json!({ "type": "OBJECT" }),
        };

        let err = client.generate_json(&request).await.unwrap_err();
        assert!(matches!(err, StylistError::UpstreamModel(_)), "{err:?}");
        assert!(!err.to_string().contains("SECRET-KEY-12345"), "{err}");
        assert!(!format!("{err:?}").contains("SECRET-KEY-12345"), "{err:?}");
    }
}
