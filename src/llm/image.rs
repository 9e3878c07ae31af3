use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::config::ImageConfig;
use crate::llm::{
    models::{ImageRequest, ImageStyle},
    ImageGenerator, LlmError,
};

/// Image generation over the OpenAI images endpoint. Returns a hosted URL.
pub struct OpenAiImageClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiImageClient {
    pub fn new(config: &ImageConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.api_base.clone(),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImageClient {
    async fn generate(&self, request: ImageRequest) -> Result<String, LlmError> {
        let prompt = match request.style {
            Some(ImageStyle::Meme) => format!(
                "Internet meme style, bold impact-font caption, high contrast. {}",
                request.prompt
            ),
            None => request.prompt,
        };

        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "n": 1,
            "size": "1024x1024",
        });

        let response = self
            .client
            .post(format!("{}/images/generations", self.base_url))
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
            return Err(LlmError::Api(format!("Image Error {}: {}", status, text)));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let url = json["data"][0]["url"]
            .as_str()
            .ok_or(LlmError::InvalidRequest)?
            .to_string();

        Ok(url)
    }
}
