use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::config::VideoConfig;
use crate::llm::{LlmError, VideoGenerator};

/// Video generation client. The upstream service accepts a prompt and
/// answers with a hosted asset URL; any provider-side polling or retrying is
/// its own concern.
pub struct VideoClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl VideoClient {
    pub fn new(config: &VideoConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.api_base.clone(),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl VideoGenerator for VideoClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "prompt": prompt,
        });

        let response = self
            .client
            .post(format!("{}/videos/generations", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(LlmError::RateLimited);
            }
            return Err(LlmError::Api(format!("Video Error {}: {}", status, text)));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let url = json["data"][0]["url"]
            .as_str()
            .or_else(|| json["url"].as_str())
            .ok_or(LlmError::InvalidRequest)?
            .to_string();

        Ok(url)
    }
}
