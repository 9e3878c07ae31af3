use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::agent::{parse_json_block, TurnError};
use crate::llm::{
    models::{ChatMessage, ChatOptions},
    LlmProvider,
};

/// Structured topic analysis of a turn's instruction. Drives the news query
/// and is attached as metadata to the assistant message it produced.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Keywords {
    #[serde(default)]
    pub title: String,
    /// Set when the topic moved away from what the cached news covers.
    #[serde(default)]
    pub context_change: bool,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub news: String,
    #[serde(default)]
    pub search_engine: String,
}

#[async_trait]
pub trait KeywordExtractor: Send + Sync {
    async fn extract(&self, input: &str) -> Result<Keywords, TurnError>;
}

const EXTRACT_SYSTEM_PROMPT: &str = "You analyse instructions for a social media content assistant. \
Reply with a single JSON object with these fields: \
\"title\" (a short topic title), \
\"context_change\" (boolean, true when the topic differs from the previous prompt), \
\"content_type\" (the type of post being asked for), \
\"source\" (the subject area to search news in), \
\"news\" (search keywords for current news on the topic), \
\"search_engine\" (\"duckduckgo\" or \"bing\"). \
Reply with the JSON only.";

pub struct LlmKeywordExtractor {
    llm: Arc<dyn LlmProvider>,
}

impl LlmKeywordExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl KeywordExtractor for LlmKeywordExtractor {
    async fn extract(&self, input: &str) -> Result<Keywords, TurnError> {
        let messages = [
            ChatMessage::system(EXTRACT_SYSTEM_PROMPT),
            ChatMessage::user(input),
        ];

        let response = self
            .llm
            .chat(
                &messages,
                ChatOptions {
                    temperature: Some(0.2),
                    ..Default::default()
                },
            )
            .await?;

        Ok(parse_json_block(&response.content).unwrap_or_default())
    }
}
