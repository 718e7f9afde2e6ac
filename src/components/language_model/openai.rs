use super::models::{ChatMessage, Completion, FunctionCall, FunctionDefinition};
use super::LanguageModel;
use crate::config::Config;
use crate::error::{model_error, AppResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Client for OpenAI-compatible chat-completions APIs using function calling
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    functions: Option<&'a [FunctionDefinition]>,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
    function_call: Option<FunctionCall>,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.openai_base_url, &config.openai_api_key, &config.openai_model)
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        functions: Option<&[FunctionDefinition]>,
    ) -> AppResult<Completion> {
        let request = OpenAiRequest {
            model: &self.model,
            messages,
            functions,
            temperature: self.temperature,
        };

        debug!(
            "Sending {} messages to {} (functions: {})",
            messages.len(),
            self.model,
            functions.map_or(0, |f| f.len())
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| model_error(&format!("Failed to send completion request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(model_error(&format!(
                "Completion request failed with status {}: {}",
                status, error_text
            )));
        }

        let response_json: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| model_error(&format!("Failed to parse completion response: {}", e)))?;

        let choice = response_json
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| model_error("No response from assistant"))?;

        Ok(Completion {
            content: choice.message.content,
            function_call: choice.message.function_call,
        })
    }
}
