use crate::error::{ConceptaError, Result};
use crate::llm::prompts::Stage;
use crate::rendering::RenderedImage;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    Starting { stage: Stage },
    PromptRendered { stage: Stage, chars: usize },
    AwaitingModel { stage: Stage, attachments: usize },
    ProcessingResponse { stage: Stage },
    Discrepancies { stage: Stage, count: usize },
    Success { stage: Stage },
    Failed { stage: Stage, reason: String },
}

/// A document or image sent inline with a prompt, base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub mime_type: String,
    pub data: String,
}

fn check_mime(mime_type: &str) -> Result<()> {
    if mime_type == "application/pdf" || mime_type.starts_with("image/") {
        Ok(())
    } else {
        Err(ConceptaError::validation(
            "$.attachments.mime_type",
            format!("unsupported attachment type '{}'", mime_type),
        ))
    }
}

impl Attachment {
    /// Accepts plain base64 or a `data:<mime>;base64,` URL; the prefix is dropped.
    pub fn from_base64(mime_type: impl Into<String>, data: &str) -> Result<Self> {
        let mime_type = mime_type.into();
        check_mime(&mime_type)?;

        let payload = match data.trim().strip_prefix("data:") {
            Some(rest) => rest.split_once(',').map_or(rest, |(_, b64)| b64),
            None => data.trim(),
        };
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| ConceptaError::validation("$.attachments.data", format!("invalid base64: {}", e)))?;

        Ok(Self {
            mime_type,
            data: payload.to_string(),
        })
    }

    /// Parses a `data:<mime>;base64,<payload>` URL, taking the MIME type from it.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let header = url
            .trim()
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(','))
            .map(|(header, _)| header)
            .ok_or_else(|| ConceptaError::validation("$.attachments.data", "not a data URL"))?;
        let mime_type = header.split(';').next().unwrap_or_default();
        Self::from_base64(mime_type, url)
    }

    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        let mime_type = mime_type.into();
        check_mime(&mime_type)?;
        Ok(Self {
            mime_type,
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        })
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        Self::from_bytes(mime_type, &bytes)
    }

    pub fn pdf(data: &str) -> Result<Self> {
        Self::from_base64("application/pdf", data)
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// One call to a completion provider.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// Provider default when `None`.
    pub model: Option<String>,
    pub prompt: String,
    pub attachments: Vec<Attachment>,
    /// JSON schema the provider should constrain its output to.
    pub response_schema: Option<serde_json::Value>,
    /// Ask for image parts alongside text.
    pub image_output: bool,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_schema(mut self, schema: Option<serde_json::Value>) -> Self {
        self.response_schema = schema;
        self
    }

    pub fn with_image_output(mut self, enabled: bool) -> Self {
        self.image_output = enabled;
        self
    }
}

// --- Gemini wire format ---

#[derive(Debug, Clone, Serialize)]
pub(crate) struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub(crate) enum Part {
    Text { text: String },
    InlineData { inline_data: Blob },
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Blob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub response_modalities: Vec<String>,
}

impl Content {
    pub fn user(prompt: &str, attachments: &[Attachment]) -> Self {
        let mut parts = vec![Part::Text {
            text: prompt.to_string(),
        }];
        parts.extend(attachments.iter().map(|a| Part::InlineData {
            inline_data: Blob {
                mime_type: a.mime_type.clone(),
                data: a.data.clone(),
            },
        }));
        Self {
            role: "user".to_string(),
            parts,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResponsePart {
    pub text: Option<String>,
    #[serde(default, alias = "inlineData")]
    pub inline_data: Option<ResponseBlob>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResponseBlob {
    #[serde(alias = "mimeType")]
    pub mime_type: String,
    pub data: String,
}

impl GenerateContentResponse {
    /// Text of the first candidate, parts concatenated.
    pub fn first_text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        Some(text)
    }

    /// Image parts of the first candidate, in order.
    pub fn first_images(&self) -> Vec<RenderedImage> {
        let Some(content) = self.candidates.first().and_then(|c| c.content.as_ref()) else {
            return Vec::new();
        };
        content
            .parts
            .iter()
            .filter_map(|p| p.inline_data.as_ref())
            .filter(|blob| blob.mime_type.starts_with("image/"))
            .map(|blob| RenderedImage {
                mime_type: blob.mime_type.clone(),
                data: blob.data.clone(),
            })
            .collect()
    }
}
