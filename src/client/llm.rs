//! Chat-completion client for the hosted language model

use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;

use crate::config::{self, ChatConfig};
use crate::error::{ApiError, ConfigError, Result};

/// Client for an OpenAI-style chat-completions endpoint
pub struct LlmClient {
    http: HttpClient,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl LlmClient {
    pub fn new(http: HttpClient, config: &ChatConfig) -> Self {
        Self {
            http,
            url: config.url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        }
    }

    /// The configured API key, rejected before any network call when it is
    /// missing or an obvious placeholder
    fn require_key(&self) -> Result<&str> {
        match self.api_key.as_deref() {
            None => Err(ConfigError::MissingCredential("chat.api_key").into()),
            Some(key) if config::is_placeholder(key) => {
                Err(ConfigError::PlaceholderCredential("chat.api_key").into())
            }
            Some(key) => Ok(key),
        }
    }

    /// One chat completion: system prompt + user message in, reply text out
    pub async fn complete(&self, system_prompt: &str, message: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct Completion {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMessage,
        }

        #[derive(Deserialize)]
        struct ChoiceMessage {
            content: String,
        }

        let key = self.require_key()?;
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": message },
            ],
        });

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(
                ApiError::Upstream(format!("chat completion returned status {status}")).into(),
            );
        }

        let completion: Completion = response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse completion: {e}"))
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ApiError::InvalidResponse("completion had no choices".to_string()).into())
    }
}
