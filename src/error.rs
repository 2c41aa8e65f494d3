use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Template '{template}' has no binding for placeholder {{{key}}}")]
    MissingBinding { template: String, key: String },

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),
}

#[derive(Error, Debug)]
pub enum ConceptaError {
    #[error("Prompt construction failed: {0}")]
    Template(#[from] TemplateError),

    #[error("Completion provider error: {0}")]
    Provider(String),

    #[error("Completion provider returned status {status}: {body}")]
    ProviderStatus { status: u16, body: String },

    #[error("Failed to parse model response: {message}")]
    Parse { message: String, raw: String },

    #[error("Validation failed at {path}: {details}")]
    Validation { path: String, details: String },

    #[error("Invalid workflow transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConceptaError {
    pub fn validation(path: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            details: details.into(),
        }
    }

    /// The raw model output attached to a parse failure, for debugging.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::Parse { raw, .. } => Some(raw),
            _ => None,
        }
    }

    /// True for the transport/HTTP class of failures.
    pub fn is_provider_error(&self) -> bool {
        matches!(self, Self::Provider(_) | Self::ProviderStatus { .. })
    }
}

#[cfg(feature = "gemini")]
impl From<reqwest::Error> for ConceptaError {
    fn from(err: reqwest::Error) -> Self {
        Self::Provider(err.without_url().to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConceptaError>;
