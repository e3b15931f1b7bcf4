use tracing::info;

use crate::{
    backend::{GenerativeBackend, ImageRequest, PromptPart},
    error::StylistError,
    media::{preview, ImagePayload},
    models::{OutfitSuggestion, RecommendedItem, StylingHints, TargetGender},
};

/// Item names slotted into the image prompt, one per clothing category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutfitSlots {
    pub tops: String,
    pub bottoms: String,
    pub footwear: String,
    pub accessories: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Tops,
    Bottoms,
    Footwear,
    Accessories,
}

/// Checked in this order; an item fills the first slot whose keyword its type contains.
const SLOT_KEYWORDS: &[(Slot, &[&str])] = &[
    (Slot::Tops, &["top", "shirt", "blouse"]),
    (Slot::Bottoms, &["bottom", "pant", "trouser", "skirt", "jean"]),
    (Slot::Footwear, &["footwear", "shoe", "boot", "sneaker", "sandal", "heel"]),
    (Slot::Accessories, &["accessor", "jewel", "bag", "belt"]),
];

fn slot_for(item_type: &str) -> Option<Slot> {
    let lowered = item_type.to_lowercase();
    SLOT_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(slot, _)| *slot)
}

/// Slots recommended items by their free-text `type`.
///
/// Matching is a case-insensitive substring test, so `"Top Wear"` fills tops.
/// Tops, bottoms and footwear take the first matching item; accessories
/// collect every match, joined with `", "`. Empty slots get an
/// "any appropriate ..." placeholder. The model's `type` vocabulary is not
/// fixed, so this is inherently fuzzy.
pub fn match_slots(items: &[RecommendedItem]) -> OutfitSlots {
    let mut tops = None;
    let mut bottoms = None;
    let mut footwear = None;
    let mut accessories: Vec<&str> = Vec::new();

    for item in items {
        let name = item.name.trim();
        match slot_for(&item.item_type) {
            Some(Slot::Tops) => { tops.get_or_insert(name); }
            Some(Slot::Bottoms) => { bottoms.get_or_insert(name); }
            Some(Slot::Footwear) => { footwear.get_or_insert(name); }
            Some(Slot::Accessories) => accessories.push(name),
            None => {}
        }
    }

    OutfitSlots {
        tops: tops.unwrap_or("any appropriate top").to_string(),
        bottoms: bottoms.unwrap_or("any appropriate bottom").to_string(),
        footwear: footwear.unwrap_or("any appropriate footwear").to_string(),
        accessories: if accessories.is_empty() {
            "any appropriate accessories".to_string()
        } else {
            accessories.join(", ")
        },
    }
}

pub fn style_description(suggestion: &OutfitSuggestion, hints: &StylingHints) -> String {
    let who = match hints.gender {
        Some(TargetGender::Male) => "a man",
        Some(TargetGender::Female) => "a woman",
        Some(TargetGender::Unisex) | None => "a person (man or woman)",
    };
    format!(
        "A full-body, realistic photo of {who} wearing a stylish {} outfit. {}",
        suggestion.style_name, suggestion.description
    )
}

pub fn build_image_prompt(style_description: &str, slots: &OutfitSlots) -> String {
    format!(
        "Generate a high-quality, realistic, full-body photograph of a person wearing a complete, stylish outfit.

**Style Description**: {style_description}

**The outfit must include**:
- **Tops**: {}
- **Bottoms**: {}
- **Footwear**: {}
- **Accessories**: {}

**The image should feature the provided clothing item naturally integrated into the look.**",
        slots.tops, slots.bottoms, slots.footwear, slots.accessories
    )
}

/// Generates one styled photo of the original item combined with a suggestion's pieces.
pub async fn render_outfit(
    backend: &dyn GenerativeBackend,
    model: &str,
    image: &ImagePayload,
    suggestion: &OutfitSuggestion,
    hints: &StylingHints,
) -> Result<ImagePayload, StylistError> {
    let slots = match_slots(&suggestion.recommended_items);
    let prompt = build_image_prompt(&style_description(suggestion, hints), &slots);
    info!("🎯 Rendering style '{}' with prompt: {}", suggestion.style_name, prompt.chars().take(100).collect::<String>());

    let request = ImageRequest {
        model: model.to_string(),
        parts: vec![PromptPart::Text(prompt), PromptPart::Image(image.clone())],
    };

    match backend.generate_image(&request).await? {
        Some(img) if !img.is_empty() => {
            info!("✅ Style '{}' image generated: {}", suggestion.style_name, preview(&img.base64_data()));
            Ok(img)
        }
        _ => Err(StylistError::ImageGeneration(format!(
            "model returned no image for style '{}'",
            suggestion.style_name
        ))),
    }
}
