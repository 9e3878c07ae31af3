use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::agent::{parse_json_block, Keywords, TurnError};
use crate::llm::{
    models::{ChatMessage, ChatOptions},
    LlmProvider,
};
use crate::news::{Article, NewsRetriever, SearchEngine};

/// The usable part of a generation result. `post_content` is the post
/// itself; the prompts are ready-made inputs for follow-up media turns.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PostSummary {
    #[serde(default)]
    pub post_content: String,
    #[serde(default)]
    pub image_prompt: Option<String>,
    #[serde(default)]
    pub video_prompt: Option<String>,
}

/// Generation output: an optional summary (absent when the model declined
/// to produce anything usable) plus the freshly fetched news. `news` stays
/// empty when the cached articles were reused, so callers can tell a cache
/// hit from a refetch.
#[derive(Debug, Clone, Default)]
pub struct PostBundle {
    pub summary: Option<PostSummary>,
    pub news: Vec<Article>,
}

#[async_trait]
pub trait PostGenerator: Send + Sync {
    async fn generate(
        &self,
        keywords: &Keywords,
        prior_news: &[Article],
        refine: bool,
    ) -> Result<PostBundle, TurnError>;
}

/// Text-post pipeline: refetch news when the cache is stale, then summarize
/// the grounding articles into a post.
pub struct LlmPostGenerator {
    llm: Arc<dyn LlmProvider>,
    retriever: Arc<dyn NewsRetriever>,
}

impl LlmPostGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, retriever: Arc<dyn NewsRetriever>) -> Self {
        Self { llm, retriever }
    }

    fn grounding_block(articles: &[Article]) -> String {
        let mut block = String::new();
        for article in articles {
            block.push_str(&format!("Title: {}\nSource: {}\n", article.title, article.url));
            block.push_str(article.content.chars().take(1500).collect::<String>().as_str());
            block.push_str("\n---\n");
        }
        block
    }
}

#[async_trait]
impl PostGenerator for LlmPostGenerator {
    async fn generate(
        &self,
        keywords: &Keywords,
        prior_news: &[Article],
        refine: bool,
    ) -> Result<PostBundle, TurnError> {
        // Staleness rule: refetch when there is nothing cached or the
        // extractor flagged a topic change.
        let mut fresh = Vec::new();
        if prior_news.is_empty() || keywords.context_change {
            let query = format!("{} {}", keywords.source, keywords.news);
            let query = query.trim();
            if !query.is_empty() {
                let engine = SearchEngine::parse(&keywords.search_engine);
                fresh = self.retriever.search(query, engine).await?;
            }
        }

        let grounding = if fresh.is_empty() { prior_news } else { &fresh };

        let task = if refine {
            "Refine the post from the earlier conversation according to the instruction."
        } else {
            "Write a new social media post."
        };
        let system = format!(
            "You write social media posts grounded in the supplied articles. {} \
Respect the requested content type ({}) and title ({}). \
Reply with a single JSON object: \
\"post_content\" (the finished post), \
\"image_prompt\" (an image generation prompt matching the post), \
\"video_prompt\" (a video generation prompt matching the post). \
Reply with the JSON only.",
            task, keywords.content_type, keywords.title
        );

        let user = format!("Articles:\n{}", Self::grounding_block(grounding));

        let response = self
            .llm
            .chat(
                &[ChatMessage::system(system), ChatMessage::user(user)],
                ChatOptions::default(),
            )
            .await?;

        let summary: Option<PostSummary> = parse_json_block(&response.content);

        Ok(PostBundle { summary, news: fresh })
    }
}
