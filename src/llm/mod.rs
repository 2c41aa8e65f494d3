pub mod client;
pub mod config;
pub mod extractor;
pub mod prompts;
pub mod types;

pub use client::*;
pub use config::*;
pub use extractor::*;
pub use prompts::{PromptSet, Stage};
pub use types::{Attachment, CompletionRequest, PipelineEvent};
