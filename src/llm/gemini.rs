//! Google Gemini `generateContent` adapter.

use async_trait::async_trait;

use crate::config::LlmConfig;
use crate::llm::client::{check_status, http_client, GenerationClient, ModelError};

/// Calls `{base_url}/v1beta/models/{model}:generateContent`.
///
/// The API key travels in the `x-goog-api-key` header rather than the query
/// string so it never shows up in logged URLs.
pub struct GeminiClient {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            client: http_client(config.timeout_secs),
            config: config.clone(),
            api_key: config.resolved_api_key(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "contents": [
                { "role": "user", "parts": [ { "text": prompt } ] }
            ],
            "generationConfig": {
                "temperature":     self.config.temperature,
                "maxOutputTokens": self.config.max_tokens
            }
        })
    }
}

/// Concatenate every text part of the first candidate.
///
/// No candidates (or no text parts) is an empty answer. A prompt-level block
/// reason is reported as [`ModelError::Blocked`].
fn candidate_text(json: &serde_json::Value) -> Result<String, ModelError> {
    if let Some(reason) = json["promptFeedback"]["blockReason"].as_str() {
        return Err(ModelError::Blocked(reason.to_string()));
    }

    let parts = json["candidates"][0]["content"]["parts"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default();

    let text: String = parts
        .iter()
        .filter_map(|part| part["text"].as_str())
        .collect();

    Ok(text.trim().to_string())
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let mut req = self.client.post(self.endpoint()).json(&self.request_body(prompt));
        if let Some(key) = self.api_key.as_deref() {
            req = req.header("x-goog-api-key", key);
        }

        let response = check_status(req.send().await?).await?;
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ModelError::Parse(e.to_string()))?;

        let text = candidate_text(&json)?;
        log::debug!("llm: gemini returned {} bytes", text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_embeds_model_name() {
        let config = LlmConfig {
            base_url: "https://generativelanguage.googleapis.com/".into(),
            ..LlmConfig::default()
        };
        let client = GeminiClient::from_config(&config);
        assert_eq!(
            client.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn request_body_wraps_prompt_in_parts() {
        let client = GeminiClient::from_config(&LlmConfig::default());
        let body = client.request_body("Explain tides");

        assert_eq!(body["contents"][0]["parts"][0]["text"], "Explain tides");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 512);
    }

    #[test]
    fn joins_all_text_parts() {
        let json = serde_json::json!({
            "candidates": [{
                "content": { "parts": [ { "text": "Tides are " }, { "text": "the sea breathing." } ] }
            }]
        });
        assert_eq!(candidate_text(&json).unwrap(), "Tides are the sea breathing.");
    }

    #[test]
    fn no_candidates_is_empty_answer() {
        let json = serde_json::json!({ "candidates": [] });
        assert_eq!(candidate_text(&json).unwrap(), "");
    }

    #[test]
    fn block_reason_is_reported() {
        let json = serde_json::json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert!(matches!(candidate_text(&json), Err(ModelError::Blocked(r)) if r == "SAFETY"));
    }
}
