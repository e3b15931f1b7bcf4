use anyhow::{Context, Result};
use std::time::Duration;

pub const DEMO_KEY: &str = "DEMO_KEY";

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` runs the offline demo backend.
    pub api_key: Option<String>,
    pub api_base: String,
    pub analysis_model: String,
    pub recommendation_model: String,
    pub image_model: String,
    pub model_timeout: Duration,
    pub max_upload_bytes: usize,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            analysis_model: "gemini-2.0-flash".to_string(),
            recommendation_model: "gemini-2.0-flash".to_string(),
            image_model: "gemini-2.0-flash-preview-image-generation".to_string(),
            model_timeout: Duration::from_secs(60),
            max_upload_bytes: 5 * 1024 * 1024,
            port: 8080,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get("GEMINI_API_KEY").filter(|k| k != DEMO_KEY);

        let model_timeout = match get("STYLIST_MODEL_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse().with_context(|| format!("STYLIST_MODEL_TIMEOUT_SECS is not a number: {v}"))?,
            ),
            None => defaults.model_timeout,
        };
        let max_upload_bytes = match get("STYLIST_MAX_UPLOAD_BYTES") {
            Some(v) => v.parse().with_context(|| format!("STYLIST_MAX_UPLOAD_BYTES is not a number: {v}"))?,
            None => defaults.max_upload_bytes,
        };
        let port = match get("PORT") {
            Some(v) => v.parse().with_context(|| format!("PORT is not a valid port: {v}"))?,
            None => defaults.port,
        };

        Ok(Self {
            api_key,
            api_base: get("GEMINI_API_BASE").unwrap_or(defaults.api_base),
            analysis_model: get("STYLIST_ANALYSIS_MODEL").unwrap_or(defaults.analysis_model),
            recommendation_model: get("STYLIST_RECOMMENDATION_MODEL").unwrap_or(defaults.recommendation_model),
            image_model: get("STYLIST_IMAGE_MODEL").unwrap_or(defaults.image_model),
            model_timeout,
            max_upload_bytes,
            port,
        })
    }

    pub fn demo_mode(&self) -> bool {
        self.api_key.is_none()
    }
}
