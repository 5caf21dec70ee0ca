//! Text generation module for the ELI5 explainer.
//!
//! This module provides:
//! * [`GenerationClient`] — async trait implemented by all model backends.
//! * [`GeminiClient`] — Google Gemini `generateContent` backend (default).
//! * [`ChatCompletionsClient`] — OpenAI-compatible REST backend.
//! * [`PromptBuilder`] — renders the explanation and translation prompts.
//! * [`ModelError`] — error variants for model calls.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use eli5::config::AppConfig;
//! use eli5::llm::{build_client, PromptBuilder};
//! use eli5::pipeline::Language;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let client = build_client(&config.llm);
//!
//!     let prompt = PromptBuilder::generation("rainbows", Language::English);
//!     let text = client.generate(&prompt).await.unwrap();
//!     println!("{text}");
//! }
//! ```

pub mod client;
pub mod gemini;
pub mod prompt;

use std::sync::Arc;

use crate::config::{LlmConfig, LlmProvider};

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::{ChatCompletionsClient, GenerationClient, ModelError};
pub use gemini::GeminiClient;
pub use prompt::PromptBuilder;

#[cfg(test)]
pub use client::MockGenerationClient;

/// Build the generation backend selected in `config`.
pub fn build_client(config: &LlmConfig) -> Arc<dyn GenerationClient> {
    log::info!(
        "llm: using {:?} backend, model {}",
        config.provider,
        config.model
    );
    match config.provider {
        LlmProvider::Gemini => Arc::new(GeminiClient::from_config(config)),
        LlmProvider::OpenAiCompatible => Arc::new(ChatCompletionsClient::from_config(config)),
    }
}
