use crate::error::{ConceptaError, Result};
use crate::llm::config::GeminiConfig;
use crate::llm::types::*;
use crate::rendering::RenderedImage;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Anything that turns a prompt plus attachments into raw model text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Same call, answered with images. Text-only providers keep the default.
    async fn render(&self, _request: CompletionRequest) -> Result<Vec<RenderedImage>> {
        Err(ConceptaError::Provider(
            "provider does not return images".to_string(),
        ))
    }
}

#[async_trait]
impl<P: CompletionProvider + ?Sized> CompletionProvider for Arc<P> {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        (**self).complete(request).await
    }

    async fn render(&self, request: CompletionRequest) -> Result<Vec<RenderedImage>> {
        (**self).render(request).await
    }
}

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::from_config(GeminiConfig::new(api_key))
    }

    pub fn from_config(config: GeminiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::from_config(GeminiConfig::from_env()?))
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    pub(crate) fn build_payload(request: &CompletionRequest) -> GenerateContentRequest {
        let mut config = GenerationConfig::default();
        if let Some(schema) = &request.response_schema {
            config.response_mime_type = Some("application/json".to_string());
            config.response_schema = Some(schema.clone());
        }
        if request.image_output {
            config.response_modalities = vec!["TEXT".to_string(), "IMAGE".to_string()];
        }

        let configured = config.response_mime_type.is_some() || !config.response_modalities.is_empty();
        GenerateContentRequest {
            contents: vec![Content::user(&request.prompt, &request.attachments)],
            generation_config: configured.then_some(config),
        }
    }

    async fn generate(&self, request: &CompletionRequest) -> Result<GenerateContentResponse> {
        if request.prompt.trim().is_empty() {
            return Err(ConceptaError::Provider("prompt must not be empty".to_string()));
        }

        let model = request
            .model
            .as_deref()
            .unwrap_or(&self.config.generation_model);
        let url = format!("{}/models/{}:generateContent", self.config.base_url, model);

        let payload = Self::build_payload(request);
        debug!(
            "Sending {} chars and {} attachment(s) to {}",
            request.prompt.len(),
            request.attachments.len(),
            model
        );

        let res = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&payload)
            .send()
            .await?;
        let status = res.status();

        if !status.is_success() {
            let body = res.text().await?;
            return Err(ConceptaError::ProviderStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerateContentResponse = res.json().await?;
        if body.candidates.is_empty() {
            return Err(ConceptaError::Provider("No candidates returned".to_string()));
        }
        Ok(body)
    }
}

#[async_trait]
impl CompletionProvider for GeminiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let body = self.generate(&request).await?;
        let text = body
            .first_text()
            .ok_or_else(|| ConceptaError::Provider("Candidate has no content".to_string()))?;
        if text.trim().is_empty() {
            return Err(ConceptaError::Provider("Model returned empty text".to_string()));
        }

        debug!("Received {} chars", text.len());
        Ok(text)
    }

    async fn render(&self, request: CompletionRequest) -> Result<Vec<RenderedImage>> {
        let body = self.generate(&request.with_image_output(true)).await?;
        let images = body.first_images();
        debug!("Received {} image(s)", images.len());
        Ok(images)
    }
}

const SCHEMA_KEYS: [&str; 10] = [
    "type",
    "format",
    "description",
    "nullable",
    "enum",
    "items",
    "properties",
    "required",
    "minItems",
    "maxItems",
];

const SCHEMA_FORMATS: [&str; 5] = ["float", "double", "int32", "int64", "date-time"];

/// Inlined OpenAPI-style schema for `T`, trimmed to the subset Gemini's
/// `response_schema` accepts.
pub fn schema_hint<T: JsonSchema>() -> Result<Value> {
    let settings = SchemaSettings::openapi3().with(|s| {
        s.inline_subschemas = true;
    });
    let root = settings.into_generator().into_root_schema_for::<T>();
    let value = serde_json::to_value(&root.schema)?;
    Ok(trim_schema(value))
}

fn trim_schema(value: Value) -> Value {
    let mut obj = match value {
        Value::Object(obj) => obj,
        other => return other,
    };

    // allOf: [single] wraps an inlined struct; lift it.
    if let Some(Value::Array(mut parts)) = obj.remove("allOf") {
        if parts.len() == 1 {
            if let Value::Object(inner) = parts.remove(0) {
                for (k, v) in inner {
                    obj.entry(k).or_insert(v);
                }
            }
        }
    }

    // ["integer", "null"] → "integer" + nullable
    if let Some(Value::Array(types)) = obj.get("type").cloned() {
        let concrete: Vec<&Value> = types.iter().filter(|t| t.as_str() != Some("null")).collect();
        if concrete.len() < types.len() {
            obj.insert("nullable".to_string(), Value::Bool(true));
        }
        if let Some(first) = concrete.first() {
            obj.insert("type".to_string(), (*first).clone());
        }
    }

    let mut out = Map::new();
    for (key, v) in obj {
        if !SCHEMA_KEYS.contains(&key.as_str()) {
            continue;
        }
        let v = match key.as_str() {
            "format" if !v.as_str().is_some_and(|f| SCHEMA_FORMATS.contains(&f)) => continue,
            "items" => trim_schema(v),
            "properties" => match v {
                Value::Object(props) => Value::Object(
                    props.into_iter().map(|(k, p)| (k, trim_schema(p))).collect(),
                ),
                other => other,
            },
            _ => v,
        };
        out.insert(key, v);
    }
    Value::Object(out)
}
