pub mod intent;
pub mod keywords;
pub mod orchestrator;
pub mod post;

pub use intent::{Intent, IntentClassifier, LlmIntentClassifier};
pub use keywords::{Keywords, KeywordExtractor, LlmKeywordExtractor};
pub use orchestrator::{compose_instruction, SessionView, TurnOrchestrator, TurnRequest};
pub use post::{LlmPostGenerator, PostBundle, PostGenerator, PostSummary};

use thiserror::Error;

use crate::llm::LlmError;
use crate::news::SearchError;

/// Per-turn error taxonomy. `ContentUnavailable` is the one user-facing
/// soft failure; everything unexpected from a collaborator is `Upstream`
/// and surfaces as a server error with no rollback of already-appended
/// messages.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("no usable content was produced")]
    ContentUnavailable,
    #[error("upstream failure: {0}")]
    Upstream(String),
}

impl From<LlmError> for TurnError {
    fn from(e: LlmError) -> Self {
        TurnError::Upstream(e.to_string())
    }
}

impl From<duckdb::Error> for TurnError {
    fn from(e: duckdb::Error) -> Self {
        TurnError::Upstream(e.to_string())
    }
}

impl From<SearchError> for TurnError {
    fn from(e: SearchError) -> Self {
        TurnError::Upstream(e.to_string())
    }
}

/// Pulls the first JSON object out of a model completion, tolerating code
/// fences and prose around it.
pub fn parse_json_block<T: serde::de::DeserializeOwned>(raw: &str) -> Option<T> {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed);

    let start = stripped.find('{')?;
    let end = stripped.rfind('}')?;
    if end < start {
        return None;
    }

    serde_json::from_str(&stripped[start..=end]).ok()
}
