//! The suggestion pipeline: analyze, recommend, then render every suggestion
//! concurrently, keeping each render's failure local to its own suggestion.

use chrono::Utc;
use futures::{future::join_all, FutureExt};
use std::{future::Future, panic::AssertUnwindSafe, sync::Arc, time::Duration};
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::{
    analyzer,
    backend::GenerativeBackend,
    config::Config,
    error::StylistError,
    media::ImagePayload,
    models::{ClothingAttributes, OutfitSuggestion, RenderedOutfit, StylingHints, SuggestionSet},
    recommender, renderer,
};

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub analysis_model: String,
    pub recommendation_model: String,
    pub image_model: String,
    /// Applied to each model call separately.
    pub timeout: Duration,
    pub max_image_bytes: usize,
}

impl From<&Config> for ModelSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            analysis_model: cfg.analysis_model.clone(),
            recommendation_model: cfg.recommendation_model.clone(),
            image_model: cfg.image_model.clone(),
            timeout: cfg.model_timeout,
            max_image_bytes: cfg.max_upload_bytes,
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

async fn with_timeout<T>(
    limit: Duration,
    on_timeout: fn(String) -> StylistError,
    what: &str,
    fut: impl Future<Output = Result<T, StylistError>>,
) -> Result<T, StylistError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(format!("{what} timed out after {}s", limit.as_secs_f32()))),
    }
}

pub struct Stylist {
    backend: Arc<dyn GenerativeBackend>,
    settings: ModelSettings,
}

impl Stylist {
    pub fn new(backend: Arc<dyn GenerativeBackend>, settings: ModelSettings) -> Self {
        Self { backend, settings }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn analyze(&self, image: &ImagePayload) -> Result<ClothingAttributes, StylistError> {
        image.ensure_raster(self.settings.max_image_bytes)?;
        with_timeout(
            self.settings.timeout,
            StylistError::UpstreamModel,
            "image analysis",
            analyzer::analyze_image(self.backend.as_ref(), &self.settings.analysis_model, image),
        )
        .await
    }

    pub async fn recommend(
        &self,
        attributes: &ClothingAttributes,
        hints: &StylingHints,
    ) -> Result<Vec<OutfitSuggestion>, StylistError> {
        with_timeout(
            self.settings.timeout,
            StylistError::UpstreamModel,
            "style recommendation",
            recommender::recommend_styles(
                self.backend.as_ref(),
                &self.settings.recommendation_model,
                attributes,
                hints,
            ),
        )
        .await
    }

    async fn render(
        &self,
        image: &ImagePayload,
        suggestion: &OutfitSuggestion,
        hints: &StylingHints,
    ) -> Result<ImagePayload, StylistError> {
        with_timeout(
            self.settings.timeout,
            StylistError::ImageGeneration,
            "image generation",
            renderer::render_outfit(self.backend.as_ref(), &self.settings.image_model, image, suggestion, hints),
        )
        .await
    }

    /// Runs the whole pipeline for one uploaded photo.
    ///
    /// Analysis or recommendation failures abort the request. Render failures
    /// only mark their own suggestion with `imageStatus: error`; the result
    /// is returned once every render has settled, in suggestion order.
    pub async fn generate_suggestions(
        &self,
        image: &ImagePayload,
        hints: &StylingHints,
    ) -> Result<SuggestionSet, StylistError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("generate", %request_id);
        self.run(request_id, image, hints).instrument(span).await
    }

    async fn run(
        &self,
        request_id: Uuid,
        image: &ImagePayload,
        hints: &StylingHints,
    ) -> Result<SuggestionSet, StylistError> {
        info!("🚀 Generating outfit suggestions ({} image)", image.mime_type);

        let attributes = self.analyze(image).await.map_err(|e| {
            error!("❌ Image analysis failed: {}", e);
            e
        })?;

        let suggestions = match self.recommend(&attributes, hints).await {
            Ok(list) if list.is_empty() => {
                error!("❌ Recommendation returned an empty list");
                return Err(StylistError::NoSuggestions("model returned an empty list".into()));
            }
            Ok(list) => list,
            Err(e) => {
                error!("❌ Style recommendation failed: {}", e);
                return Err(StylistError::NoSuggestions(e.to_string()));
            }
        };

        let outfit_suggestions = self.render_all(image, suggestions, hints).await;
        let rendered = outfit_suggestions.iter().filter(|o| o.image().is_some()).count();
        info!("✅ Suggestions ready: {} styles, {} with images", outfit_suggestions.len(), rendered);

        Ok(SuggestionSet { request_id, generated_at: Utc::now(), attributes, outfit_suggestions })
    }

    /// Renders every suggestion concurrently and waits for all of them.
    ///
    /// The renders are polled in place rather than spawned, so dropping the
    /// request future cancels any render still in flight.
    async fn render_all(
        &self,
        image: &ImagePayload,
        suggestions: Vec<OutfitSuggestion>,
        hints: &StylingHints,
    ) -> Vec<RenderedOutfit> {
        let renders = suggestions
            .iter()
            .map(|suggestion| AssertUnwindSafe(self.render(image, suggestion, hints)).catch_unwind());
        let outcomes = join_all(renders).await;

        suggestions
            .into_iter()
            .zip(outcomes)
            .map(|(suggestion, outcome)| {
                let outcome = outcome
                    .unwrap_or_else(|_| Err(StylistError::ImageGeneration("render task panicked".into())));
                match outcome {
                    Ok(image) => RenderedOutfit::complete(suggestion, image),
                    Err(e) => {
                        warn!("Failed to generate image for style '{}': {}", suggestion.style_name, e);
                        RenderedOutfit::failed(suggestion)
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ImageRequest, PromptPart, StructuredRequest, StructuredTask};
    use crate::media::test_support::png_payload;
    use crate::models::ImageStatus;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend with canned JSON answers and per-style image behavior.
    struct ScriptedBackend {
        analysis: Result<Value, String>,
        guidance: Result<Value, String>,
        /// Styles whose render returns no image.
        failing_styles: Vec<&'static str>,
        /// Styles whose render hangs past any test timeout.
        slow_styles: Vec<&'static str>,
        /// Styles whose render panics.
        panicking_styles: Vec<&'static str>,
        slow_analysis: bool,
        slow_guidance: bool,
        /// Added to every render before it answers.
        render_delay: Option<Duration>,
        structured_calls: AtomicUsize,
        image_calls: AtomicUsize,
        /// Renders that ran to the end.
        image_completions: AtomicUsize,
    }

    impl ScriptedBackend {
        fn happy() -> Self {
            Self {
                analysis: Ok(json!({ "itemType": "dress", "color": "red", "fabric": "silk", "style": "formal" })),
                guidance: Ok(three_styles()),
                failing_styles: vec![],
                slow_styles: vec![],
                panicking_styles: vec![],
                slow_analysis: false,
                slow_guidance: false,
                render_delay: None,
                structured_calls: AtomicUsize::new(0),
                image_calls: AtomicUsize::new(0),
                image_completions: AtomicUsize::new(0),
            }
        }
    }

    fn suggestion(name: &str, kind: &str) -> Value {
        json!({
            "styleName": name,
            "description": format!("{name} look"),
            "explanation": "works well",
            "recommendedItems": [
                { "type": kind, "name": format!("{name} piece"), "shoppingLink": "https://www.zara.com/item/1" }
            ]
        })
    }

    fn three_styles() -> Value {
        json!({ "outfitSuggestions": [
            suggestion("Casual", "top"),
            suggestion("Formal/Smart", "footwear"),
            suggestion("Trendy/Party", "accessory")
        ]})
    }

    fn prompt_text(parts: &[PromptPart]) -> String {
        parts
            .iter()
            .filter_map(|p| match p {
                PromptPart::Text(t) => Some(t.clone()),
                PromptPart::Image(_) => None,
            })
            .collect()
    }

    #[async_trait]
    impl GenerativeBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn generate_json(&self, request: &StructuredRequest) -> Result<Value, StylistError> {
            self.structured_calls.fetch_add(1, Ordering::SeqCst);
            let (answer, slow) = match request.task {
                StructuredTask::ClothingAnalysis => (&self.analysis, self.slow_analysis),
                StructuredTask::StyleGuidance => (&self.guidance, self.slow_guidance),
            };
            if slow {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            answer.clone().map_err(StylistError::UpstreamModel)
        }

        async fn generate_image(&self, request: &ImageRequest) -> Result<Option<ImagePayload>, StylistError> {
            self.image_calls.fetch_add(1, Ordering::SeqCst);
            let prompt = prompt_text(&request.parts);
            let is = |styles: &[&str]| styles.iter().any(|s| prompt.contains(&format!("stylish {s} outfit")));
            if let Some(delay) = self.render_delay {
                tokio::time::sleep(delay).await;
            }
            if is(&self.slow_styles) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if is(&self.panicking_styles) {
                panic!("scripted render panic");
            }
            self.image_completions.fetch_add(1, Ordering::SeqCst);
            if is(&self.failing_styles) {
                return Ok(None);
            }
            let tag = prompt.lines().find(|l| l.contains("Style Description")).unwrap_or_default().to_string();
            Ok(Some(ImagePayload::new("image/png", tag.into_bytes())))
        }
    }

    fn stylist(backend: Arc<ScriptedBackend>) -> Stylist {
        Stylist::new(backend, ModelSettings { timeout: Duration::from_millis(200), ..ModelSettings::default() })
    }

    fn names(set: &SuggestionSet) -> Vec<&str> {
        set.outfit_suggestions.iter().map(|o| o.suggestion.style_name.as_str()).collect()
    }

    fn statuses(set: &SuggestionSet) -> Vec<ImageStatus> {
        set.outfit_suggestions.iter().map(|o| o.status()).collect()
    }

    #[tokio::test]
    async fn all_renders_succeed_in_order() {
        let backend = Arc::new(ScriptedBackend::happy());
        let set = stylist(backend.clone()).generate_suggestions(&png_payload(), &StylingHints::default()).await.unwrap();

        assert_eq!(names(&set), vec!["Casual", "Formal/Smart", "Trendy/Party"]);
        assert_eq!(statuses(&set), vec![ImageStatus::Complete; 3]);
        assert_eq!(set.attributes.item_type, "dress");
        for outfit in &set.outfit_suggestions {
            let img = outfit.image().unwrap();
            assert!(!img.is_empty());
            // Each image came from its own suggestion's prompt.
            assert!(String::from_utf8_lossy(&img.data).contains(&outfit.suggestion.style_name));
        }
        assert_eq!(backend.image_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn one_render_failure_is_isolated() {
        let backend = Arc::new(ScriptedBackend { failing_styles: vec!["Formal/Smart"], ..ScriptedBackend::happy() });
        let set = stylist(backend).generate_suggestions(&png_payload(), &StylingHints::default()).await.unwrap();

        assert_eq!(statuses(&set), vec![ImageStatus::Complete, ImageStatus::Error, ImageStatus::Complete]);
        assert!(set.outfit_suggestions[1].image().is_none());
        assert!(set.outfit_suggestions[0].image().is_some());
        assert!(set.outfit_suggestions[2].image().is_some());
        // Text content survives the failed render.
        assert_eq!(set.outfit_suggestions[1].suggestion.recommended_items.len(), 1);
    }

    #[tokio::test]
    async fn all_renders_failing_still_succeeds() {
        let backend = Arc::new(ScriptedBackend {
            failing_styles: vec!["Casual", "Formal/Smart", "Trendy/Party"],
            ..ScriptedBackend::happy()
        });
        let set = stylist(backend).generate_suggestions(&png_payload(), &StylingHints::default()).await.unwrap();

        assert_eq!(set.outfit_suggestions.len(), 3);
        assert_eq!(statuses(&set), vec![ImageStatus::Error; 3]);
        assert!(set.outfit_suggestions.iter().all(|o| o.image().is_none()));
    }

    #[tokio::test]
    async fn slow_render_times_out_alone() {
        let backend = Arc::new(ScriptedBackend { slow_styles: vec!["Trendy/Party"], ..ScriptedBackend::happy() });
        let set = stylist(backend).generate_suggestions(&png_payload(), &StylingHints::default()).await.unwrap();

        assert_eq!(statuses(&set), vec![ImageStatus::Complete, ImageStatus::Complete, ImageStatus::Error]);
    }

    #[tokio::test]
    async fn panicking_render_fails_only_its_suggestion() {
        let backend = Arc::new(ScriptedBackend { panicking_styles: vec!["Formal/Smart"], ..ScriptedBackend::happy() });
        let set = stylist(backend).generate_suggestions(&png_payload(), &StylingHints::default()).await.unwrap();

        assert_eq!(statuses(&set), vec![ImageStatus::Complete, ImageStatus::Error, ImageStatus::Complete]);
    }

    #[tokio::test]
    async fn dropped_request_cancels_pending_renders() {
        let backend = Arc::new(ScriptedBackend {
            render_delay: Some(Duration::from_millis(300)),
            ..ScriptedBackend::happy()
        });
        let stylist = Stylist::new(
            backend.clone(),
            ModelSettings { timeout: Duration::from_secs(5), ..ModelSettings::default() },
        );

        let image = png_payload();
        let hints = StylingHints::default();
        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), stylist.generate_suggestions(&image, &hints)).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(backend.image_calls.load(Ordering::SeqCst), 3);
        assert_eq!(backend.image_completions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn slow_analysis_times_out_as_upstream_error() {
        let backend = Arc::new(ScriptedBackend { slow_analysis: true, ..ScriptedBackend::happy() });
        let err = stylist(backend.clone()).generate_suggestions(&png_payload(), &StylingHints::default()).await.unwrap_err();

        assert!(matches!(err, StylistError::UpstreamModel(ref msg) if msg.contains("timed out")), "{err:?}");
        assert_eq!(backend.structured_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.image_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn slow_recommendation_times_out_as_no_suggestions() {
        let backend = Arc::new(ScriptedBackend { slow_guidance: true, ..ScriptedBackend::happy() });
        let err = stylist(backend.clone()).generate_suggestions(&png_payload(), &StylingHints::default()).await.unwrap_err();

        assert!(matches!(err, StylistError::NoSuggestions(ref msg) if msg.contains("timed out")), "{err:?}");
        assert_eq!(backend.structured_calls.load(Ordering::SeqCst), 2);
        assert_eq!(backend.image_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn recommendation_failure_skips_rendering() {
        let backend = Arc::new(ScriptedBackend { guidance: Err("503".into()), ..ScriptedBackend::happy() });
        let err = stylist(backend.clone()).generate_suggestions(&png_payload(), &StylingHints::default()).await.unwrap_err();

        assert!(matches!(err, StylistError::NoSuggestions(_)), "{err:?}");
        assert_eq!(backend.image_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_or_empty_recommendations_are_no_suggestions() {
        for guidance in [
            json!({ "outfitSuggestions": [] }),
            json!({ "outfitSuggestions": [{ "styleName": "Casual" }] }),
            json!([1, 2, 3]),
        ] {
            let backend = Arc::new(ScriptedBackend { guidance: Ok(guidance), ..ScriptedBackend::happy() });
            let err = stylist(backend.clone()).generate_suggestions(&png_payload(), &StylingHints::default()).await.unwrap_err();
            assert!(matches!(err, StylistError::NoSuggestions(_)), "{err:?}");
            assert_eq!(backend.image_calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn analysis_failure_aborts_before_recommending() {
        let backend = Arc::new(ScriptedBackend { analysis: Err("unreachable".into()), ..ScriptedBackend::happy() });
        let err = stylist(backend.clone()).generate_suggestions(&png_payload(), &StylingHints::default()).await.unwrap_err();

        assert!(matches!(err, StylistError::UpstreamModel(_)), "{err:?}");
        assert_eq!(backend.structured_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.image_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_analysis_is_schema_error() {
        let backend = Arc::new(ScriptedBackend { analysis: Ok(json!({ "color": "red" })), ..ScriptedBackend::happy() });
        let err = stylist(backend).generate_suggestions(&png_payload(), &StylingHints::default()).await.unwrap_err();
        assert!(matches!(err, StylistError::SchemaValidation(_)), "{err:?}");
    }

    #[tokio::test]
    async fn undecodable_image_is_rejected_without_model_calls() {
        let backend = Arc::new(ScriptedBackend::happy());
        let bogus = ImagePayload::new("image/png", b"not an image".to_vec());
        let err = stylist(backend.clone()).generate_suggestions(&bogus, &StylingHints::default()).await.unwrap_err();

        assert!(matches!(err, StylistError::InvalidImage(_)), "{err:?}");
        assert_eq!(backend.structured_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn variable_suggestion_count_is_preserved() {
        let backend = Arc::new(ScriptedBackend {
            guidance: Ok(json!({ "outfitSuggestions": [suggestion("Casual", "top"), suggestion("Formal/Smart", "top")] })),
            ..ScriptedBackend::happy()
        });
        let set = stylist(backend).generate_suggestions(&png_payload(), &StylingHints::default()).await.unwrap();
        assert_eq!(names(&set), vec!["Casual", "Formal/Smart"]);
    }
}
