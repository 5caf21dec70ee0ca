//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::pipeline::Language;

// ---------------------------------------------------------------------------
// LlmProvider
// ---------------------------------------------------------------------------

/// Selects which generation backend answers prompts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LlmProvider {
    /// Google Gemini `generateContent` REST API.
    Gemini,
    /// Any OpenAI-compatible REST API (OpenAI, Ollama, Groq, LM Studio …).
    OpenAiCompatible,
}

impl Default for LlmProvider {
    fn default() -> Self {
        Self::Gemini
    }
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Settings for the text generation backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Which backend to use.
    pub provider: LlmProvider,
    /// Base URL of the API endpoint.
    ///
    /// - Gemini: `https://generativelanguage.googleapis.com`
    /// - Ollama (OpenAI mode): `http://localhost:11434`
    pub base_url: String,
    /// API key stored in the settings file.  Takes precedence over
    /// `api_key_env`.
    pub api_key: Option<String>,
    /// Name of an environment variable holding the API key.
    pub api_key_env: Option<String>,
    /// Model identifier sent to the API (e.g. `"gemini-2.5-flash"`).
    pub model: String,
    /// Sampling temperature (0.0 – 1.0).
    pub temperature: f32,
    /// Upper bound on generated tokens per request.
    pub max_tokens: u32,
    /// Maximum seconds to wait for a response before timing out.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            base_url: "https://generativelanguage.googleapis.com".into(),
            api_key: None,
            api_key_env: Some("GEMINI_API_KEY".into()),
            model: "gemini-2.5-flash".into(),
            temperature: 0.7,
            max_tokens: 512,
            timeout_secs: 30,
        }
    }
}

impl LlmConfig {
    /// The API key to send, if any.
    ///
    /// Empty strings count as "no key" so local providers work unchanged.
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_deref(), self.api_key_env.as_deref())
    }
}

// ---------------------------------------------------------------------------
// OcrConfig
// ---------------------------------------------------------------------------

/// Settings for the vision model used to read text out of photos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Base URL of an OpenAI-compatible endpoint that accepts image input.
    pub base_url: String,
    /// API key stored in the settings file.
    pub api_key: Option<String>,
    /// Name of an environment variable holding the API key.
    pub api_key_env: Option<String>,
    /// Vision-capable model identifier.
    pub model: String,
    /// Maximum seconds to wait for a recognition response.
    pub timeout_secs: u64,
    /// Ask the model to fix obvious recognition mistakes (spelling, broken
    /// words) instead of transcribing character by character.
    pub language_correction: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".into(),
            api_key: None,
            api_key_env: Some("OPENAI_API_KEY".into()),
            model: "gpt-4o-mini".into(),
            timeout_secs: 30,
            language_correction: true,
        }
    }
}

impl OcrConfig {
    /// The API key to send, if any.
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_deref(), self.api_key_env.as_deref())
    }
}

fn resolve_key(explicit: Option<&str>, env_var: Option<&str>) -> Option<String> {
    if let Some(key) = explicit.filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }
    env_var
        .and_then(|name| std::env::var(name).ok())
        .filter(|k| !k.is_empty())
}

// ---------------------------------------------------------------------------
// ExplainConfig
// ---------------------------------------------------------------------------

/// What to do with a request that completes after a newer one was issued.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StalePolicy {
    /// Only the most recently issued request may update the display.
    DiscardStale,
    /// Every completion is applied in arrival order; the last one to land wins.
    LastWriteWins,
}

impl Default for StalePolicy {
    fn default() -> Self {
        Self::DiscardStale
    }
}

/// Orchestrator behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainConfig {
    /// Language selected when the app starts.
    pub default_language: Language,
    /// How out-of-order completions are handled.
    pub stale_results: StalePolicy,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            default_language: Language::default(),
            stale_results: StalePolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

/// Where saved explanations go.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Override for the documents directory.  `None` uses
    /// [`AppPaths::documents_dir`].
    pub documents_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Directory the explanation file is written into.
    pub fn resolved_dir(&self) -> PathBuf {
        self.documents_dir
            .clone()
            .unwrap_or_else(|| AppPaths::new().documents_dir)
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use eli5::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generation backend settings.
    pub llm: LlmConfig,
    /// Photo text-recognition settings.
    pub ocr: OcrConfig,
    /// Orchestrator settings.
    pub explain: ExplainConfig,
    /// Saved-file settings.
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        let default = AppConfig::default();

        assert_eq!(config.llm.model, default.llm.model);
        assert_eq!(config.llm.provider, default.llm.provider);
        assert_eq!(config.explain.default_language, Language::English);
        assert!(config.storage.documents_dir.is_none());
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.llm.provider, LlmProvider::Gemini);
        assert_eq!(cfg.llm.model, "gemini-2.5-flash");
        assert_eq!(cfg.llm.base_url, "https://generativelanguage.googleapis.com");
        assert!(cfg.llm.api_key.is_none());
        assert_eq!(cfg.llm.api_key_env.as_deref(), Some("GEMINI_API_KEY"));
        assert!(cfg.ocr.language_correction);
        assert_eq!(cfg.explain.stale_results, StalePolicy::DiscardStale);
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("settings.toml");

        let mut cfg = AppConfig::default();
        cfg.llm.provider = LlmProvider::OpenAiCompatible;
        cfg.llm.base_url = "http://localhost:11434".into();
        cfg.llm.api_key = Some("sk-test".into());
        cfg.llm.model = "qwen2.5:3b".into();
        cfg.llm.timeout_secs = 12;
        cfg.ocr.language_correction = false;
        cfg.explain.default_language = Language::Hindi;
        cfg.explain.stale_results = StalePolicy::LastWriteWins;
        cfg.storage.documents_dir = Some(dir.path().join("docs"));

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.llm.provider, LlmProvider::OpenAiCompatible);
        assert_eq!(loaded.llm.base_url, "http://localhost:11434");
        assert_eq!(loaded.llm.api_key, Some("sk-test".into()));
        assert_eq!(loaded.llm.model, "qwen2.5:3b");
        assert_eq!(loaded.llm.timeout_secs, 12);
        assert!(!loaded.ocr.language_correction);
        assert_eq!(loaded.explain.default_language, Language::Hindi);
        assert_eq!(loaded.explain.stale_results, StalePolicy::LastWriteWins);
        assert_eq!(loaded.storage.resolved_dir(), dir.path().join("docs"));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "llm = [not toml").unwrap();

        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn explicit_api_key_wins_over_env() {
        let cfg = LlmConfig {
            api_key: Some("sk-explicit".into()),
            api_key_env: Some("ELI5_TEST_KEY_UNUSED".into()),
            ..LlmConfig::default()
        };
        assert_eq!(cfg.resolved_api_key().as_deref(), Some("sk-explicit"));
    }

    #[test]
    fn empty_api_key_counts_as_missing() {
        let cfg = LlmConfig {
            api_key: Some(String::new()),
            api_key_env: Some("ELI5_TEST_KEY_THAT_IS_NEVER_SET".into()),
            ..LlmConfig::default()
        };
        assert!(cfg.resolved_api_key().is_none());
    }

    #[test]
    fn api_key_read_from_env_var() {
        std::env::set_var("ELI5_TEST_OCR_KEY", "sk-from-env");
        let cfg = OcrConfig {
            api_key: None,
            api_key_env: Some("ELI5_TEST_OCR_KEY".into()),
            ..OcrConfig::default()
        };
        assert_eq!(cfg.resolved_api_key().as_deref(), Some("sk-from-env"));
    }
}
