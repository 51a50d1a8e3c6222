use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    error::{AppError, AppResult},
    server_config::cfg,
    HttpClient,
};

/// Per-call overrides for a generation request. Unset fields fall back to the
/// client's configured defaults.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

/// Seam between the digest pipeline and the text-generation backend.
/// The pipeline only ever sees prompt-in, text-out.
#[async_trait]
pub trait Generate: Send + Sync {
    async fn generate(&self, prompt: &str, options: GenerateOptions) -> AppResult<String>;
}

/// Chat-completions client. Constructed once at startup and injected into the
/// pipeline; holds no mutable state beyond the pooled HTTP client.
#[derive(Clone)]
pub struct GenerationClient {
    http_client: HttpClient,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f64,
}

impl GenerationClient {
    pub fn new(
        http_client: HttpClient,
        endpoint: String,
        api_key: String,
        model: String,
        temperature: f64,
    ) -> Self {
        Self {
            http_client,
            endpoint,
            api_key,
            model,
            temperature,
        }
    }

    pub fn from_config(http_client: HttpClient) -> Self {
        Self::new(
            http_client,
            cfg.api.endpoint.clone(),
            cfg.api.key.clone(),
            cfg.model.id.clone(),
            cfg.model.temperature,
        )
    }

    fn request_body(&self, prompt: &str, options: &GenerateOptions) -> serde_json::Value {
        let mut body = json!({
            "model": options.model.as_deref().unwrap_or(&self.model),
            "temperature": options.temperature.unwrap_or(self.temperature),
            "messages": [
                {
                    "role": "user",
                    "content": prompt
                }
            ]
        });
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        body
    }
}

#[async_trait]
impl Generate for GenerationClient {
    async fn generate(&self, prompt: &str, options: GenerateOptions) -> AppResult<String> {
        let resp = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt, &options))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(AppError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let resp = resp.json::<serde_json::Value>().await?;
        let parsed = serde_json::from_value::<ChatApiResponseOrError>(resp.clone())
            .context(format!("Could not parse chat response: {}", resp))?;

        let parsed = match parsed {
            ChatApiResponseOrError::Error(error) => {
                return Err(AppError::Provider {
                    status: status.as_u16(),
                    message: error.message,
                });
            }
            ChatApiResponseOrError::Response(parsed) => parsed,
        };

        let choice = parsed.choices.first().context("No choices in response")?;
        tracing::debug!(
            "Generation used {} tokens ({} prompt, {} completion)",
            parsed.usage.total_tokens,
            parsed.usage.prompt_tokens,
            parsed.usage.completion_tokens,
        );

        Ok(choice.message.content.clone())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ModelLength,
    Error,
    ToolCalls,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: i32,
    pub message: ChatMessage,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiResponse {
    pub choices: Vec<ChatChoice>,
    pub usage: PromptUsage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiError {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatApiResponseOrError {
    Response(ChatApiResponse),
    Error(ChatApiError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> GenerationClient {
        GenerationClient::new(
            HttpClient::new(),
            "https://example.com/v1/chat/completions".to_string(),
            "test-key".to_string(),
            "test-model".to_string(),
            0.3,
        )
    }

    #[test]
    fn test_request_body_defaults() {
        let client = test_client();
        let body = client.request_body("Summarize this", &GenerateOptions::default());

        assert_eq!(body["model"], "test-model");
        assert_eq!(body["temperature"], 0.3);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Summarize this");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_request_body_overrides() {
        let client = test_client();
        let body = client.request_body(
            "Summarize this",
            &GenerateOptions {
                model: Some("other-model".to_string()),
                max_tokens: Some(500),
                temperature: Some(0.7),
            },
        );

        assert_eq!(body["model"], "other-model");
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["max_tokens"], 500);
    }

    #[test]
    fn test_parse_api_error() {
        let resp = json!({ "message": "Requests rate limit exceeded" });
        let parsed = serde_json::from_value::<ChatApiResponseOrError>(resp).unwrap();

        assert!(matches!(parsed, ChatApiResponseOrError::Error(_)));
    }

    #[test]
    fn test_parse_chat_response() {
        let resp = json!({
            "choices": [
                {
                    "index": 0,
                    "message": { "role": "assistant", "content": "A summary." },
                    "finish_reason": "stop"
                }
            ],
            "usage": { "prompt_tokens": 120, "completion_tokens": 40, "total_tokens": 160 }
        });
        let parsed = serde_json::from_value::<ChatApiResponseOrError>(resp).unwrap();

        match parsed {
            ChatApiResponseOrError::Response(r) => {
                assert_eq!(r.choices[0].message.content, "A summary.");
                assert_eq!(r.usage.total_tokens, 160);
            }
            ChatApiResponseOrError::Error(e) => panic!("Parsed as error: {:?}", e),
        }
    }
}
