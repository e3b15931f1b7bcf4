use tracing::{info, warn};

use crate::{
    backend::{GenerativeBackend, PromptPart, StructuredRequest, StructuredTask},
    error::StylistError,
    models::{parse_validated, ClothingAttributes, OutfitSuggestion, StyleGuidance, StylingHints, TargetGender},
};

/// Number of outfit styles the prompt asks for.
pub const EXPECTED_STYLES: usize = 3;

pub fn build_recommendation_prompt(attributes: &ClothingAttributes, hints: &StylingHints) -> String {
    let audience = match hints.gender {
        Some(TargetGender::Male) => "These styles are for a man, so tailor every recommendation to menswear.",
        Some(TargetGender::Female) => "These styles are for a woman, so tailor every recommendation to womenswear.",
        Some(TargetGender::Unisex) | None => "These styles should be suitable for both men and women, so provide diverse and inclusive recommendations.",
    };
    format!(
        "You are an AI fashion stylist. The user has uploaded an image of a clothing item with the following attributes:
- Type: {item_type}
- Color: {color}
- Fabric: {fabric}
- Style: {style}

Your task is to suggest {EXPECTED_STYLES} distinct outfit styles (e.g., Casual, Formal/Smart, Trendy/Party) that incorporate this item, each with a different name. {audience}

For each outfit style, you must:
1. Recommend Complementary Items: suggest specific items (tops, bottoms, footwear, accessories) that pair well with the user's item. Set each item's type to one of: top, bottom, footwear, accessory.
2. Provide Shopping Links: for each recommended item, provide a valid, absolute https shopping link from a reputable online fashion retailer (e.g., Amazon Fashion, Myntra, Zara, H&M, ASOS).
3. Explain the Style: write a brief explanation of why the recommended items create a cohesive and stylish outfit. Mention color theory, occasion suitability, and current fashion trends.
4. Describe the Style: give a short, user-friendly description of the look.

Ensure your output is a JSON object that strictly follows the provided schema.",
        item_type = attributes.item_type,
        color = attributes.color,
        fabric = attributes.fabric,
        style = attributes.style,
    )
}

/// Requests outfit concepts for the analyzed item. All-or-nothing: one invalid
/// suggestion fails the whole list.
pub async fn recommend_styles(
    backend: &dyn GenerativeBackend,
    model: &str,
    attributes: &ClothingAttributes,
    hints: &StylingHints,
) -> Result<Vec<OutfitSuggestion>, StylistError> {
    let request = StructuredRequest {
        task: StructuredTask::StyleGuidance,
        model: model.to_string(),
        parts: vec![PromptPart::Text(build_recommendation_prompt(attributes, hints))],
        schema: StyleGuidance::response_schema(),
    };

    let raw = backend.generate_json(&request).await?;
    let guidance: StyleGuidance = parse_validated(raw)?;
    let suggestions = guidance.outfit_suggestions;

    if !suggestions.is_empty() && suggestions.len() != EXPECTED_STYLES {
        warn!("Expected {} outfit styles, model returned {}", EXPECTED_STYLES, suggestions.len());
    }
    let names: Vec<&str> = suggestions.iter().map(|s| s.style_name.as_str()).collect();
    info!("💡 Received {} outfit suggestions: {}", suggestions.len(), names.join(", "));
    Ok(suggestions)
}
