pub mod search;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use search::SearchClient;

/// One retrieved article, the unit of the session news cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub title: String,
    pub url: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchEngine {
    DuckDuckGo,
    Bing,
}

impl SearchEngine {
    /// Maps the extractor's free-form engine hint onto a supported engine.
    pub fn parse(hint: &str) -> Self {
        match hint.trim().to_lowercase().as_str() {
            "bing" => SearchEngine::Bing,
            _ => SearchEngine::DuckDuckGo,
        }
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Http(String),
}

#[async_trait]
pub trait NewsRetriever: Send + Sync {
    async fn search(&self, query: &str, engine: SearchEngine) -> Result<Vec<Article>, SearchError>;
}
