use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;
use uuid::Uuid;

use crate::{error::StylistError, media::ImagePayload};

/// Structural checks run on every model response before it is trusted.
pub trait Validate {
    fn validate(&self) -> Result<(), StylistError>;
}

/// Deserializes a model's JSON output into `T` and validates it.
pub fn parse_validated<T: DeserializeOwned + Validate>(value: Value) -> Result<T, StylistError> {
    let parsed: T = serde_json::from_value(value)
        .map_err(|e| StylistError::SchemaValidation(e.to_string()))?;
    parsed.validate()?;
    Ok(parsed)
}

fn require_text(field: &str, value: &str) -> Result<(), StylistError> {
    if value.trim().is_empty() {
        return Err(StylistError::SchemaValidation(format!("'{field}' must not be empty")));
    }
    Ok(())
}

// --- Inbound requests ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetGender {
    Male,
    Female,
    Unisex,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylingHints {
    #[serde(default)]
    pub gender: Option<TargetGender>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub photo_data_uri: String,
    #[serde(default)]
    pub styling_hints: StylingHints,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub photo_data_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendRequest {
    #[serde(flatten)]
    pub attributes: ClothingAttributes,
    #[serde(default)]
    pub styling_hints: StylingHints,
}

// --- Model outputs ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClothingAttributes {
    pub item_type: String,
    pub color: String,
    pub fabric: String,
    pub style: String,
}

impl ClothingAttributes {
    pub fn response_schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "itemType": { "type": "STRING", "description": "The type of clothing item (e.g., dress, shirt, pants)." },
                "color": { "type": "STRING", "description": "The dominant color of the clothing item." },
                "fabric": { "type": "STRING", "description": "The fabric of the clothing item (e.g., cotton, silk, denim)." },
                "style": { "type": "STRING", "description": "The style of the clothing item (e.g., casual, formal, vintage)." }
            },
            "required": ["itemType", "color", "fabric", "style"]
        })
    }
}

impl Validate for ClothingAttributes {
    fn validate(&self) -> Result<(), StylistError> {
        require_text("itemType", &self.item_type)?;
        require_text("color", &self.color)?;
        require_text("fabric", &self.fabric)?;
        require_text("style", &self.style)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedItem {
    /// Free-text category such as "top" or "Footwear".
    #[serde(rename = "type")]
    pub item_type: String,
    pub name: String,
    pub shopping_link: String,
}

impl RecommendedItem {
    fn schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "type": { "type": "STRING", "description": "The type of clothing item (e.g., top, bottom, footwear, accessory)." },
                "name": { "type": "STRING", "description": "The name or description of the recommended item." },
                "shoppingLink": { "type": "STRING", "description": "A valid, clickable URL to a similar item on a fashion e-commerce site." }
            },
            "required": ["type", "name", "shoppingLink"]
        })
    }
}

impl Validate for RecommendedItem {
    fn validate(&self) -> Result<(), StylistError> {
        require_text("type", &self.item_type)?;
        require_text("name", &self.name)?;
        let url = Url::parse(self.shopping_link.trim()).map_err(|e| {
            StylistError::SchemaValidation(format!("shoppingLink '{}' is not a valid URL: {e}", self.shopping_link))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(StylistError::SchemaValidation(format!(
                "shoppingLink '{}' is not an http(s) URL",
                self.shopping_link
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutfitSuggestion {
    pub style_name: String,
    pub description: String,
    pub explanation: String,
    pub recommended_items: Vec<RecommendedItem>,
}

impl OutfitSuggestion {
    fn schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "styleName": { "type": "STRING", "description": "The name of the outfit style (e.g., Casual, Formal/Smart, Trendy/Party)." },
                "description": { "type": "STRING", "description": "A short, user-friendly description of the outfit style." },
                "recommendedItems": {
                    "type": "ARRAY",
                    "description": "Recommended clothing items, footwear and accessories for the outfit style.",
                    "items": RecommendedItem::schema()
                },
                "explanation": { "type": "STRING", "description": "Why the combination works: color coordination, occasion fit, fashion trends." }
            },
            "required": ["styleName", "description", "recommendedItems", "explanation"]
        })
    }
}

impl Validate for OutfitSuggestion {
    fn validate(&self) -> Result<(), StylistError> {
        require_text("styleName", &self.style_name)?;
        require_text("description", &self.description)?;
        if self.recommended_items.is_empty() {
            return Err(StylistError::SchemaValidation(format!(
                "style '{}' has no recommended items",
                self.style_name
            )));
        }
        self.recommended_items.iter().try_for_each(Validate::validate)
    }
}

/// Wrapper object the recommendation model is asked to return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleGuidance {
    pub outfit_suggestions: Vec<OutfitSuggestion>,
}

impl StyleGuidance {
    pub fn response_schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "outfitSuggestions": {
                    "type": "ARRAY",
                    "description": "An array of outfit style suggestions.",
                    "items": OutfitSuggestion::schema()
                }
            },
            "required": ["outfitSuggestions"]
        })
    }
}

impl Validate for StyleGuidance {
    fn validate(&self) -> Result<(), StylistError> {
        self.outfit_suggestions.iter().try_for_each(Validate::validate)
    }
}

// --- Pipeline output ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    Complete,
    Error,
}

/// A suggestion plus the outcome of its image render.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedOutfit {
    #[serde(flatten)]
    pub suggestion: OutfitSuggestion,
    ai_styled_image: Option<ImagePayload>,
    image_status: ImageStatus,
}

impl RenderedOutfit {
    pub fn complete(suggestion: OutfitSuggestion, image: ImagePayload) -> Self {
        Self { suggestion, ai_styled_image: Some(image), image_status: ImageStatus::Complete }
    }

    pub fn failed(suggestion: OutfitSuggestion) -> Self {
        Self { suggestion, ai_styled_image: None, image_status: ImageStatus::Error }
    }

    pub fn image(&self) -> Option<&ImagePayload> {
        self.ai_styled_image.as_ref()
    }

    pub fn status(&self) -> ImageStatus {
        self.image_status
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionSet {
    pub request_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub attributes: ClothingAttributes,
    pub outfit_suggestions: Vec<RenderedOutfit>,
}
