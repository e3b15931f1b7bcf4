use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::{error::StylistError, media::ImagePayload};

/// One piece of a multimodal prompt.
#[derive(Debug, Clone)]
pub enum PromptPart {
    Text(String),
    Image(ImagePayload),
}

/// What a structured request is for. Used for logging and by the demo backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuredTask {
    ClothingAnalysis,
    StyleGuidance,
}

#[derive(Debug, Clone)]
pub struct StructuredRequest {
    pub task: StructuredTask,
    pub model: String,
    pub parts: Vec<PromptPart>,
    /// Response schema the model output must follow.
    pub schema: Value,
}

#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub model: String,
    pub parts: Vec<PromptPart>,
}

/// A hosted generative model provider.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns the model's JSON output, unvalidated.
    async fn generate_json(&self, request: &StructuredRequest) -> Result<Value, StylistError>;

    /// `Ok(None)` means the call completed but produced no image.
    async fn generate_image(&self, request: &ImageRequest) -> Result<Option<ImagePayload>, StylistError>;
}

/// Offline backend used when no API key is configured.
#[derive(Debug, Default, Clone)]
pub struct DemoBackend;

#[async_trait]
impl GenerativeBackend for DemoBackend {
    fn name(&self) -> &'static str {
        "demo"
    }

    async fn generate_json(&self, request: &StructuredRequest) -> Result<Value, StylistError> {
        info!("Using demo mode - returning canned {:?} output", request.task);
        Ok(match request.task {
            StructuredTask::ClothingAnalysis => json!({
                "itemType": "shirt",
                "color": "white",
                "fabric": "cotton",
                "style": "casual"
            }),
            StructuredTask::StyleGuidance => json!({ "outfitSuggestions": [
                {
                    "styleName": "Casual",
                    "description": "A laid-back and easy-to-wear outfit for casual occasions.",
                    "explanation": "Neutral denim keeps the look relaxed while letting the item stand out.",
                    "recommendedItems": [
                        { "type": "bottom", "name": "Straight-leg jeans", "shoppingLink": "https://www2.hm.com/en_us/men/products/jeans.html" },
                        { "type": "footwear", "name": "White canvas sneakers", "shoppingLink": "https://www.amazon.com/s?k=white+canvas+sneakers" },
                        { "type": "accessory", "name": "Baseball cap", "shoppingLink": "https://www.asos.com/search/?q=baseball+cap" }
                    ]
                },
                {
                    "styleName": "Formal/Smart",
                    "description": "A sophisticated and polished outfit for formal events.",
                    "explanation": "Tailored trousers and leather shoes lift the item into business territory.",
                    "recommendedItems": [
                        { "type": "bottom", "name": "Charcoal dress trousers", "shoppingLink": "https://www.zara.com/us/en/search?searchTerm=dress%20trousers" },
                        { "type": "footwear", "name": "Brown leather loafers", "shoppingLink": "https://www.myntra.com/loafers" },
                        { "type": "accessory", "name": "Minimal steel watch", "shoppingLink": "https://www.amazon.com/s?k=minimal+watch" }
                    ]
                },
                {
                    "styleName": "Trendy/Party",
                    "description": "A stylish and attention-grabbing outfit for parties and social gatherings.",
                    "explanation": "A statement jacket and bold accessories make the look night-ready.",
                    "recommendedItems": [
                        { "type": "top", "name": "Cropped leather jacket", "shoppingLink": "https://www.asos.com/search/?q=cropped+leather+jacket" },
                        { "type": "bottom", "name": "Black slim cargo pants", "shoppingLink": "https://www2.hm.com/en_us/search-results.html?q=cargo" },
                        { "type": "footwear", "name": "Chelsea boots", "shoppingLink": "https://www.zara.com/us/en/search?searchTerm=chelsea%20boots" },
                        { "type": "accessory", "name": "Chain necklace", "shoppingLink": "https://www.myntra.com/necklace" }
                    ]
                }
            ]}),
        })
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<Option<ImagePayload>, StylistError> {
        info!("Using demo mode - no real images generated");
        let prompt = request
            .parts
            .iter()
            .filter_map(|p| match p {
                PromptPart::Text(t) => Some(t.as_str()),
                PromptPart::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        Ok(Some(placeholder_image(&prompt)))
    }
}

/// Simple SVG card standing in for a styled outfit photo.
fn placeholder_image(prompt: &str) -> ImagePayload {
    let palette = [
        "#3B82F6", // blue
        "#EF4444", // red
        "#10B981", // green
        "#F59E0B", // amber
        "#8B5CF6", // purple
    ];
    let color = palette[prompt.len() % palette.len()];
    let title = if prompt.contains("Casual") { "👕 Casual" }
               else if prompt.contains("Formal") { "👔 Formal" }
               else if prompt.contains("Party") || prompt.contains("Trendy") { "✨ Party" }
               else { "🧥 Styled Outfit" };

    let svg = format!(r#"<svg width="400" height="600" xmlns="http://www.w3.org/2000/svg">
            <defs>
                <linearGradient id="grad" x1="0%" y1="0%" x2="100%" y2="100%">
                    <stop offset="0%" style="stop-color:{color};stop-opacity:1" />
                    <stop offset="100%" style="stop-color:{color};stop-opacity:0.6" />
                </linearGradient>
            </defs>
            <rect width="400" height="600" fill="url(#grad)" />
            <text x="200" y="300" font-family="Arial, sans-serif" font-size="28" font-weight="bold"
                  text-anchor="middle" fill="white">
                {title}
            </text>
            <text x="200" y="350" font-family="Arial, sans-serif" font-size="12"
                  text-anchor="middle" fill="white" opacity="0.8">
                Demo preview - set GEMINI_API_KEY for real images
            </text>
        </svg>"#);

    ImagePayload::new("image/svg+xml", svg.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{parse_validated, ClothingAttributes, StyleGuidance};

    fn structured(task: StructuredTask) -> StructuredRequest {
        StructuredRequest { task, model: "demo".into(), parts: vec![], schema: json!({}) }
    }

    #[tokio::test]
    async fn demo_outputs_pass_validation() {
        let backend = DemoBackend;
        let attrs = backend.generate_json(&structured(StructuredTask::ClothingAnalysis)).await.unwrap();
        parse_validated::<ClothingAttributes>(attrs).unwrap();

        let guidance = backend.generate_json(&structured(StructuredTask::StyleGuidance)).await.unwrap();
        let guidance: StyleGuidance = parse_validated(guidance).unwrap();
        assert_eq!(guidance.outfit_suggestions.len(), 3);
    }

    #[tokio::test]
    async fn demo_image_is_svg_placeholder() {
        let request = ImageRequest {
            model: "demo".into(),
            parts: vec![PromptPart::Text("stylish Formal/Smart outfit".into())],
        };
        let img = DemoBackend.generate_image(&request).await.unwrap().unwrap();
        assert_eq!(img.mime_type, "image/svg+xml");
        assert!(String::from_utf8_lossy(&img.data).contains("Formal"));
    }
}
