use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{info, warn};

use crate::news::{Article, NewsRetriever, SearchEngine, SearchError};

/// Scraping news retriever: queries a search engine's HTML frontend, then
/// pulls readable content out of the top result pages.
pub struct SearchClient {
    client: Client,
    max_results: usize,
}

struct SearchHit {
    title: String,
    url: String,
}

impl SearchClient {
    pub fn new(max_results: usize) -> Self {
        Self {
            client: Client::builder()
                .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36")
                .build()
                .unwrap_or_default(),
            max_results,
        }
    }

    async fn result_hits(&self, query: &str, engine: SearchEngine) -> Result<Vec<SearchHit>, SearchError> {
        let (url, selector) = match engine {
            SearchEngine::DuckDuckGo => (
                format!("https://html.duckduckgo.com/html/?q={}", urlencoding::encode(query)),
                ".result__a",
            ),
            SearchEngine::Bing => (
                format!("https://www.bing.com/search?q={}", urlencoding::encode(query)),
                "li.b_algo h2 a",
            ),
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SearchError::Http(e.to_string()))?;

        let html_content = response
            .text()
            .await
            .map_err(|e| SearchError::Http(e.to_string()))?;
        let document = Html::parse_document(&html_content);
        let selector = Selector::parse(selector).expect("static selector");

        Ok(document
            .select(&selector)
            .filter_map(|element| {
                let mut href = element.value().attr("href")?.to_string();

                // DuckDuckGo often uses redirects like /l/?uddg=URL
                if href.contains("uddg=") {
                    if let Some(pos) = href.find("uddg=") {
                        let encoded_url = &href[pos + 5..];
                        if let Some(end_pos) = encoded_url.find('&') {
                            href = urlencoding::decode(&encoded_url[..end_pos]).ok()?.to_string();
                        } else {
                            href = urlencoding::decode(encoded_url).ok()?.to_string();
                        }
                    }
                }

                if href.contains("duckduckgo.com") || href.starts_with('/') {
                    return None;
                }

                let title = element.text().collect::<Vec<_>>().join(" ").trim().to_string();
                Some(SearchHit { title, url: href })
            })
            .take(self.max_results)
            .collect())
    }

    async fn page_content(&self, url: &str) -> String {
        info!("Fetching article: {}", url);
        let response = match self.client.get(url).send().await {
            Ok(res) => res,
            Err(e) => {
                warn!("Failed to fetch {}: {}", url, e);
                return String::new();
            }
        };

        if !response.status().is_success() {
            warn!("Fetching {} returned status {}", url, response.status());
            return String::new();
        }

        let html = response.text().await.unwrap_or_default();

        let mut cursor = std::io::Cursor::new(html.clone());
        let base_url = match reqwest::Url::parse(url) {
            Ok(u) => u,
            Err(_) => return String::new(),
        };

        match llm_readability::extractor::extract(&mut cursor, &base_url) {
            Ok(product) => html_to_markdown_rs::convert(&product.content, None)
                .ok()
                .and_then(|result| result.content)
                .unwrap_or_else(|| product.content.clone()),
            Err(_) => {
                // Fallback to raw body text if readability fails
                let document = Html::parse_document(&html);
                let body_selector = Selector::parse("body").expect("static selector");
                document
                    .select(&body_selector)
                    .next()
                    .map(|e| e.text().collect::<Vec<_>>().join(" "))
                    .unwrap_or_default()
                    .chars()
                    .take(2000)
                    .collect()
            }
        }
    }
}

#[async_trait]
impl NewsRetriever for SearchClient {
    async fn search(&self, query: &str, engine: SearchEngine) -> Result<Vec<Article>, SearchError> {
        info!("Searching news for: {}", query);
        let hits = self.result_hits(query, engine).await?;

        let mut articles = Vec::with_capacity(hits.len());
        for hit in hits {
            let content = self.page_content(&hit.url).await;
            articles.push(Article {
                title: hit.title,
                url: hit.url,
                content,
            });
        }

        Ok(articles)
    }
}
