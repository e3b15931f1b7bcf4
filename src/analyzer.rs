use tracing::info;

use crate::{
    backend::{GenerativeBackend, PromptPart, StructuredRequest, StructuredTask},
    error::StylistError,
    media::ImagePayload,
    models::{parse_validated, ClothingAttributes},
};

const ANALYSIS_PROMPT: &str = "You are an AI fashion expert. Analyze the clothing item in the provided image and identify its key attributes.

Specifically, identify the following:
- Item Type: What type of clothing item is it? (e.g., dress, shirt, pants)
- Color: What is the dominant color of the item?
- Fabric: What is the fabric of the item? (e.g., cotton, silk, denim)
- Style: What is the style of the item? (e.g., casual, formal, vintage)

Return the output in JSON format.";

/// Extracts [`ClothingAttributes`] from a photo with one vision-model call.
pub async fn analyze_image(
    backend: &dyn GenerativeBackend,
    model: &str,
    image: &ImagePayload,
) -> Result<ClothingAttributes, StylistError> {
    let request = StructuredRequest {
        task: StructuredTask::ClothingAnalysis,
        model: model.to_string(),
        parts: vec![
            PromptPart::Text(ANALYSIS_PROMPT.to_string()),
            PromptPart::Image(image.clone()),
        ],
        schema: ClothingAttributes::response_schema(),
    };

    let raw = backend.generate_json(&request).await?;
    let attributes: ClothingAttributes = parse_validated(raw)?;
    info!(
        "👗 Analyzed item: {} / {} / {} / {}",
        attributes.item_type, attributes.color, attributes.fabric, attributes.style
    );
    Ok(attributes)
}
