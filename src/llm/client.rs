use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::backend::{CompletionBackend, Prompt, ResponseFormat};
use crate::error::LlmError;

const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Instruction appended to the system prompt when JSON is requested
const JSON_INSTRUCTION: &str =
    "Respond with a single JSON object only. Do not wrap it in prose or code fences.";

/// Configuration for the Anthropic API client
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key (from ANTHROPIC_API_KEY env var)
    pub api_key: String,
    /// Model to use (ANTHROPIC_MODEL env var, defaults to a Sonnet model)
    pub model: String,
    /// Temperature (0-1, lower = more deterministic)
    pub temperature: f64,
    /// Maximum tokens in response
    pub max_tokens: u32,
}

impl AnthropicConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY environment variable not set")?;
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self::new(api_key, model))
    }

    /// Create with custom settings
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            temperature: 0.1,
            max_tokens: 4096,
        }
    }
}

/// Anthropic messages API client, used as the extraction and scoring capability
pub struct AnthropicClient {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Send a message to Claude and get the text of the first content block
    pub async fn send_message(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let request = AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: Some(self.config.temperature),
            system: Some(system.to_string()),
            messages: vec![Message {
                role: "user".to_string(),
                content: user.to_string(),
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_URL)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        let response: AnthropicResponse = decode_body(&body)?;

        debug!(
            "Anthropic response: {} content blocks, stop_reason={:?}",
            response.content.len(),
            response.stop_reason
        );

        response
            .content
            .into_iter()
            .find(|c| c.content_type == "text" && !c.text.trim().is_empty())
            .map(|c| c.text)
            .ok_or(LlmError::EmptyResponse)
    }
}

impl CompletionBackend for AnthropicClient {
    async fn complete(&self, prompt: &Prompt, format: ResponseFormat) -> Result<String, LlmError> {
        match format {
            ResponseFormat::Text => self.send_message(&prompt.system, &prompt.user).await,
            ResponseFormat::Json => {
                let system = format!("{}\n\n{}", prompt.system, JSON_INSTRUCTION);
                self.send_message(&system, &prompt.user).await
            }
        }
    }
}

/// Map a non-success HTTP status onto the error taxonomy
pub(crate) fn status_error(status: StatusCode, body: String) -> LlmError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        LlmError::RateLimited(body)
    } else {
        LlmError::Api {
            status: status.as_u16(),
            body,
        }
    }
}

/// Parse a successful response body; a body that does not match is permanent
pub(crate) fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, LlmError> {
    serde_json::from_str(body).map_err(|e| LlmError::Decode(e.to_string()))
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_success_body_is_permanent() {
        let err = decode_body::<AnthropicResponse>("<html>gateway</html>").unwrap_err();

        assert!(matches!(err, LlmError::Decode(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "busy".to_string()),
            LlmError::RateLimited(_)
        ));
        let err = status_error(StatusCode::BAD_GATEWAY, String::new());
        assert!(err.is_transient());
        let err = status_error(StatusCode::UNAUTHORIZED, String::new());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_parse_response_content() {
        let json = r#"{
            "content": [
                {"type": "text", "text": "{\"pains\": []}"}
            ],
            "stop_reason": "end_turn"
        }"#;

        let response: AnthropicResponse = serde_json::from_str(json).unwrap();

        assert_eq!(response.content[0].content_type, "text");
        assert_eq!(response.stop_reason.as_deref(), Some("end_turn"));
    }

    #[test]
    fn test_config_new_defaults() {
        let config = AnthropicConfig::new("key".to_string(), "model".to_string());
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.temperature, 0.1);
    }
}
