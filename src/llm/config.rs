use crate::error::{ConceptaError, Result};
use std::env;
use std::fmt;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_DOCUMENT_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";

#[derive(Clone, PartialEq, Eq)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    /// Used for PDF analysis and the rights report.
    pub document_model: String,
    /// Used for unit mix, massing, styling and image analysis.
    pub generation_model: String,
    /// Used for photorealistic renders.
    pub image_model: String,
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("document_model", &self.document_model)
            .field("generation_model", &self.generation_model)
            .field("image_model", &self.image_model)
            .finish()
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: GEMINI_BASE_URL.to_string(),
            document_model: DEFAULT_DOCUMENT_MODEL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }

    /// Reads `GEMINI_API_KEY` (required), `GEMINI_BASE_URL`,
    /// `CONCEPTA_DOCUMENT_MODEL`, `CONCEPTA_GENERATION_MODEL` and
    /// `CONCEPTA_IMAGE_MODEL`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("GEMINI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConceptaError::Config("GEMINI_API_KEY is not set".to_string()))?;

        let mut config = Self::new(api_key);
        if let Some(url) = lookup("GEMINI_BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup("CONCEPTA_DOCUMENT_MODEL") {
            config.document_model = model;
        }
        if let Some(model) = lookup("CONCEPTA_GENERATION_MODEL") {
            config.generation_model = model;
        }
        if let Some(model) = lookup("CONCEPTA_IMAGE_MODEL") {
            config.image_model = model;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = GeminiConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "k")])).unwrap();
        assert_eq!(config.base_url, GEMINI_BASE_URL);
        assert_eq!(config.document_model, "gemini-2.0-flash-exp");
        assert_eq!(config.generation_model, "gemini-2.0-flash");
        assert_eq!(config.image_model, "gemini-3-pro-image-preview");
    }

    #[test]
    fn test_overrides() {
        let config = GeminiConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("GEMINI_BASE_URL", "http://localhost:8080/v1/"),
            ("CONCEPTA_GENERATION_MODEL", "gemini-2.5-pro"),
            ("CONCEPTA_IMAGE_MODEL", "gemini-2.5-flash-image"),
        ]))
        .unwrap();
        assert_eq!(config.image_model, "gemini-2.5-flash-image");
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.generation_model, "gemini-2.5-pro");
    }

    #[test]
    fn test_missing_key() {
        let err = GeminiConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, ConceptaError::Config(_)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", GeminiConfig::new("secret-key"));
        assert!(!debug.contains("secret-key"));
    }
}
