//! Anthropic Messages API adapter.

use super::{CompletionRequest, LlmProvider};
use crate::error::ProtocolError;
use async_trait::async_trait;
use std::time::Duration;

const ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_TOKENS: u32 = 4096;

pub struct AnthropicProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("failed to build reqwest client"),
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> String {
        format!("anthropic:{}", self.model)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, ProtocolError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": request.system_prompt,
            "messages": [{
                "role": "user",
                "content": request.user_prompt,
            }],
        });

        let response = self
            .client
            .post(ENDPOINT)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProtocolError::ProviderCall(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProtocolError::ProviderCall(format!(
                "anthropic API error ({status}): {body}"
            )));
        }

        let parsed: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProtocolError::ProviderCall(e.to_string()))?;

        Ok(parsed["content"][0]["text"].as_str().unwrap_or("").to_string())
    }
}
