//! Core `GenerationClient` trait and the OpenAI-compatible implementation.
//!
//! `ChatCompletionsClient` calls any OpenAI-compatible `/v1/chat/completions`
//! endpoint — OpenAI, Ollama (OpenAI mode), Groq, LM Studio, vLLM, etc.
//! All connection details come from [`LlmConfig`]; nothing is hardcoded.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::LlmConfig;

// ---------------------------------------------------------------------------
// ModelError
// ---------------------------------------------------------------------------

/// Errors that can occur while asking the model for text.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("model request timed out")]
    Timeout,

    /// The API rejected the credentials (HTTP 401 / 403).
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Rate limit or quota exhausted (HTTP 429).
    #[error("quota exceeded: {0}")]
    Quota(String),

    /// Any other non-success HTTP status.
    #[error("model API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be parsed as expected JSON.
    #[error("failed to parse model response: {0}")]
    Parse(String),

    /// The provider refused to answer the prompt.
    #[error("prompt was blocked: {0}")]
    Blocked(String),
}

impl From<reqwest::Error> for ModelError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ModelError::Timeout
        } else {
            ModelError::Request(e.to_string())
        }
    }
}

/// Turn a non-success HTTP response into the matching [`ModelError`].
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ModelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status.as_u16() {
        401 | 403 => ModelError::Auth(body),
        429 => ModelError::Quota(body),
        code => ModelError::Status { status: code, body },
    })
}

/// Shared HTTP client with the per-request timeout from config.
///
/// A default (no-timeout) client is used as a last-resort fallback if the
/// builder fails.
pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

// ---------------------------------------------------------------------------
// GenerationClient trait
// ---------------------------------------------------------------------------

/// Async trait for a text generation backend.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// (e.g. wrapped in `Arc<dyn GenerationClient>`).
///
/// A well-formed response that carries no text yields `Ok(String::new())`;
/// callers decide how to present that.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}

// ---------------------------------------------------------------------------
// ChatCompletionsClient
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: Option<String>,
}

impl ChatCompletionsClient {
    /// Build a client from application config.
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            client: http_client(config.timeout_secs),
            config: config.clone(),
            api_key: config.resolved_api_key(),
        }
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model":       self.config.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "stream":      false,
            "temperature": self.config.temperature,
            "max_tokens":  self.config.max_tokens
        })
    }
}

/// Pull `choices[0].message.content` out of a chat-completions response.
///
/// A missing or null content field is an empty answer, not an error.
pub(crate) fn chat_content(json: &serde_json::Value) -> Result<String, ModelError> {
    if !json["choices"].is_array() {
        return Err(ModelError::Parse("response has no `choices` array".into()));
    }
    Ok(json["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .trim()
        .to_string())
}

#[async_trait]
impl GenerationClient for ChatCompletionsClient {
    /// The `Authorization: Bearer …` header is attached **only** when a
    /// non-empty key is configured.
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let mut req = self.client.post(&url).json(&self.request_body(prompt));
        if let Some(key) = self.api_key.as_deref() {
            req = req.bearer_auth(key);
        }

        let response = check_status(req.send().await?).await?;
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ModelError::Parse(e.to_string()))?;

        let text = chat_content(&json)?;
        log::debug!("llm: chat completion returned {} bytes", text.len());
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// MockGenerationClient (tests only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use mock::MockGenerationClient;

#[cfg(test)]
mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Scripted client: answers from a queue and records every prompt.
    ///
    /// When the queue is empty it echoes the fallback answer.
    pub struct MockGenerationClient {
        answers: Mutex<VecDeque<Result<String, ModelError>>>,
        fallback: Result<String, ModelError>,
        prompts: Mutex<Vec<String>>,
    }

    impl MockGenerationClient {
        pub fn ok(text: &str) -> Self {
            Self::with_fallback(Ok(text.to_string()))
        }

        pub fn failing(err: ModelError) -> Self {
            Self::with_fallback(Err(err))
        }

        fn with_fallback(fallback: Result<String, ModelError>) -> Self {
            Self {
                answers: Mutex::new(VecDeque::new()),
                fallback,
                prompts: Mutex::new(Vec::new()),
            }
        }

        /// Queue answers consumed in call order before the fallback applies.
        pub fn then(self, answer: Result<String, ModelError>) -> Self {
            self.answers.lock().unwrap().push_back(answer);
            self
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl GenerationClient for MockGenerationClient {
        async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmProvider;

    fn make_config(api_key: Option<&str>) -> LlmConfig {
        LlmConfig {
            provider: LlmProvider::OpenAiCompatible,
            base_url: "http://localhost:11434/".into(),
            api_key: api_key.map(|s| s.to_string()),
            api_key_env: None,
            model: "qwen2.5:3b".into(),
            temperature: 0.3,
            max_tokens: 128,
            timeout_secs: 10,
        }
    }

    #[test]
    fn empty_api_key_sends_no_auth() {
        let client = ChatCompletionsClient::from_config(&make_config(Some("")));
        assert!(client.api_key.is_none());
    }

    #[test]
    fn real_api_key_is_kept() {
        let client = ChatCompletionsClient::from_config(&make_config(Some("sk-test-1234")));
        assert_eq!(client.api_key.as_deref(), Some("sk-test-1234"));
    }

    #[test]
    fn request_body_carries_prompt_and_settings() {
        let client = ChatCompletionsClient::from_config(&make_config(None));
        let body = client.request_body("Explain rain");

        assert_eq!(body["model"], "qwen2.5:3b");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Explain rain");
        assert_eq!(body["stream"], false);
        assert_eq!(body["max_tokens"], 128);
    }

    #[test]
    fn chat_content_is_trimmed() {
        let json = serde_json::json!({
            "choices": [{ "message": { "content": "  Rain is sky water.\n" } }]
        });
        assert_eq!(chat_content(&json).unwrap(), "Rain is sky water.");
    }

    #[test]
    fn null_content_is_empty_not_error() {
        let json = serde_json::json!({
            "choices": [{ "message": { "content": null } }]
        });
        assert_eq!(chat_content(&json).unwrap(), "");
    }

    #[test]
    fn missing_choices_is_parse_error() {
        let json = serde_json::json!({ "error": "nope" });
        assert!(matches!(chat_content(&json), Err(ModelError::Parse(_))));
    }

    #[test]
    fn quota_error_message_includes_reason() {
        let err = ModelError::Quota("quota exceeded".into());
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn client_is_object_safe() {
        let client: Box<dyn GenerationClient> =
            Box::new(ChatCompletionsClient::from_config(&make_config(None)));
        drop(client);
    }

    #[tokio::test]
    async fn mock_answers_in_order_then_falls_back() {
        let mock = MockGenerationClient::ok("fallback")
            .then(Ok("first".into()))
            .then(Err(ModelError::Timeout));

        assert_eq!(mock.generate("a").await.unwrap(), "first");
        assert!(matches!(mock.generate("b").await, Err(ModelError::Timeout)));
        assert_eq!(mock.generate("c").await.unwrap(), "fallback");
        assert_eq!(mock.prompts(), vec!["a", "b", "c"]);
    }
}
