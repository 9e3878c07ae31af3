use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::agent::TurnError;
use crate::llm::{
    models::{ChatMessage, ChatOptions},
    LlmProvider,
};

/// What the user wants this turn. Resolved per turn, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    GeneratePost,
    RefinePost,
    GenerateImage,
    GenerateVideo,
    GenerateMeme,
    Unknown,
}

impl Intent {
    pub fn as_label(&self) -> &'static str {
        match self {
            Intent::GeneratePost => "generate_post",
            Intent::RefinePost => "refine_post",
            Intent::GenerateImage => "generate_image",
            Intent::GenerateVideo => "generate_video",
            Intent::GenerateMeme => "generate_meme",
            Intent::Unknown => "unknown",
        }
    }

    /// Lenient label parsing: models occasionally wrap the label in quotes
    /// or prose, so a contained match counts. Anything else is `Unknown`.
    pub fn parse(raw: &str) -> Self {
        let cleaned = raw.trim().trim_matches('"').trim_matches('`').to_lowercase();
        for intent in [
            Intent::GeneratePost,
            Intent::RefinePost,
            Intent::GenerateImage,
            Intent::GenerateVideo,
            Intent::GenerateMeme,
        ] {
            if cleaned == intent.as_label() || cleaned.contains(intent.as_label()) {
                return intent;
            }
        }
        Intent::Unknown
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, instruction: &str) -> Result<Intent, TurnError>;
}

const CLASSIFY_SYSTEM_PROMPT: &str = "You route requests for a social media content assistant. \
Classify the user's instruction into exactly one of these labels: \
generate_post, refine_post, generate_image, generate_video, generate_meme. \
Use refine_post when the user asks to change or adjust an earlier post. \
Reply with the label only, nothing else.";

/// Single-shot text-in/label-out classification over the configured model.
pub struct LlmIntentClassifier {
    llm: Arc<dyn LlmProvider>,
}

impl LlmIntentClassifier {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(&self, instruction: &str) -> Result<Intent, TurnError> {
        let messages = [
            ChatMessage::system(CLASSIFY_SYSTEM_PROMPT),
            ChatMessage::user(instruction),
        ];

        let response = self
            .llm
            .chat(
                &messages,
                ChatOptions {
                    temperature: Some(0.0),
                    max_tokens: Some(16),
                    ..Default::default()
                },
            )
            .await?;

        let intent = Intent::parse(&response.content);
        debug!("Classified \"{}\" as {}", response.content.trim(), intent);
        Ok(intent)
    }
}
