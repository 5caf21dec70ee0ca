//! Core `TextExtractor` trait and the vision-model implementation.
//!
//! # Overview
//!
//! [`TextExtractor`] is the interface used by the pipeline.  It is object-safe
//! and `Send + Sync` so it can be held behind an `Arc<dyn TextExtractor>`.
//!
//! [`VisionExtractor`] decodes the photo locally (so unreadable files fail
//! fast with [`RecognitionError::Decode`]), then asks a vision-capable model
//! on an OpenAI-compatible endpoint to transcribe every text region.

use std::io::Cursor;

use async_trait::async_trait;
use base64::Engine as _;
use thiserror::Error;

use crate::config::OcrConfig;
use crate::llm::client::{chat_content, check_status, http_client};
use crate::llm::ModelError;

/// Longest image side sent to the model; larger photos are downscaled.
const MAX_IMAGE_SIDE: u32 = 2048;

// ---------------------------------------------------------------------------
// RecognitionError
// ---------------------------------------------------------------------------

/// All errors that can arise while reading text from an image.
#[derive(Debug, Clone, Error)]
pub enum RecognitionError {
    /// The bytes are not an image format we can decode.
    #[error("could not decode image: {0}")]
    Decode(String),

    /// HTTP transport, authentication or provider error.
    #[error("recognition request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("recognition request timed out")]
    Timeout,

    /// Non-success HTTP status.
    #[error("vision API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be parsed.
    #[error("failed to parse recognition response: {0}")]
    Parse(String),

    /// The caller gave up on the request.
    #[error("recognition cancelled")]
    Cancelled,
}

impl From<ModelError> for RecognitionError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Timeout => RecognitionError::Timeout,
            ModelError::Parse(msg) => RecognitionError::Parse(msg),
            ModelError::Status { status, body } => RecognitionError::Status { status, body },
            other => RecognitionError::Request(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for RecognitionError {
    fn from(e: reqwest::Error) -> Self {
        ModelError::from(e).into()
    }
}

// ---------------------------------------------------------------------------
// TextExtractor trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for image text recognition.
///
/// # Contract
///
/// - Text regions are joined with single spaces in the order the engine
///   reports them.
/// - Undecodable bytes fail with [`RecognitionError::Decode`].
/// - A readable image without text yields `Ok(String::new())`.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn recognize(&self, image: &[u8]) -> Result<String, RecognitionError>;
}

/// Join recognised regions into one line of text.
///
/// ```
/// use eli5::ocr::join_regions;
///
/// assert_eq!(join_regions(["  Eiffel ", "", "Tower"]), "Eiffel Tower");
/// ```
pub fn join_regions<I, S>(regions: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    regions
        .into_iter()
        .filter_map(|region| {
            let trimmed = region.as_ref().trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode `bytes`, downscale if needed, and re-encode as PNG.
///
/// CPU-bound; call it from the blocking pool.
pub fn prepare_image(bytes: &[u8]) -> Result<Vec<u8>, RecognitionError> {
    let mut img =
        image::load_from_memory(bytes).map_err(|e| RecognitionError::Decode(e.to_string()))?;

    if img.width() > MAX_IMAGE_SIDE || img.height() > MAX_IMAGE_SIDE {
        img = img.thumbnail(MAX_IMAGE_SIDE, MAX_IMAGE_SIDE);
    }

    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| RecognitionError::Decode(e.to_string()))?;
    Ok(png)
}

// ---------------------------------------------------------------------------
// VisionExtractor
// ---------------------------------------------------------------------------

/// Reads text out of photos with a vision model.
pub struct VisionExtractor {
    client: reqwest::Client,
    config: OcrConfig,
    api_key: Option<String>,
}

impl VisionExtractor {
    pub fn from_config(config: &OcrConfig) -> Self {
        Self {
            client: http_client(config.timeout_secs),
            config: config.clone(),
            api_key: config.resolved_api_key(),
        }
    }

    fn instruction(&self) -> String {
        let mut text = String::from(
            "Read all of the text in this image. Write each separate block of text on \
             its own line, in the order a person would read them. Reply with only the \
             text you read. If the image contains no text, reply with nothing.",
        );
        if self.config.language_correction {
            text.push_str(" Fix obvious recognition mistakes such as misspelled or broken words.");
        } else {
            text.push_str(" Copy the text exactly as written.");
        }
        text
    }

    fn request_body(&self, png: &[u8]) -> serde_json::Value {
        let data_uri = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png)
        );
        serde_json::json!({
            "model": self.config.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": self.instruction() },
                    { "type": "image_url", "image_url": { "url": data_uri } }
                ]
            }],
            "stream": false,
            "temperature": 0.0
        })
    }
}

#[async_trait]
impl TextExtractor for VisionExtractor {
    async fn recognize(&self, image: &[u8]) -> Result<String, RecognitionError> {
        let bytes = image.to_vec();
        let png = tokio::task::spawn_blocking(move || prepare_image(&bytes))
            .await
            .map_err(|e| RecognitionError::Decode(format!("decode task failed: {e}")))??;

        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let mut req = self.client.post(&url).json(&self.request_body(&png));
        if let Some(key) = self.api_key.as_deref() {
            req = req.bearer_auth(key);
        }

        let response = check_status(req.send().await?).await?;
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RecognitionError::Parse(e.to_string()))?;

        let text = join_regions(chat_content(&json)?.lines());
        log::debug!("ocr: recognised {} chars", text.chars().count());
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// MockTextExtractor (tests only)
// ---------------------------------------------------------------------------

/// Returns a pre-configured result without touching the network.
#[cfg(test)]
pub struct MockTextExtractor {
    result: Result<String, RecognitionError>,
}

#[cfg(test)]
impl MockTextExtractor {
    pub fn ok(text: &str) -> Self {
        Self {
            result: Ok(text.to_string()),
        }
    }

    pub fn failing(err: RecognitionError) -> Self {
        Self { result: Err(err) }
    }
}

#[cfg(test)]
#[async_trait]
impl TextExtractor for MockTextExtractor {
    async fn recognize(&self, _image: &[u8]) -> Result<String, RecognitionError> {
        self.result.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(4, 3, image::Rgb([255, 255, 255]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn join_regions_uses_single_spaces_in_order() {
        assert_eq!(join_regions(["PARIS", "city of", "lights"]), "PARIS city of lights");
    }

    #[test]
    fn join_regions_of_nothing_is_empty() {
        assert_eq!(join_regions(Vec::<String>::new()), "");
        assert_eq!(join_regions(["", "   "]), "");
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = prepare_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, RecognitionError::Decode(_)));
    }

    #[test]
    fn valid_image_is_reencoded_as_png() {
        let png = prepare_image(&tiny_png()).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
    }

    #[tokio::test]
    async fn undecodable_image_fails_before_any_request() {
        // Port 9 is discard; the request would fail differently if it were sent.
        let config = OcrConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..OcrConfig::default()
        };
        let extractor = VisionExtractor::from_config(&config);
        let err = extractor.recognize(b"\x00\x01\x02").await.unwrap_err();
        assert!(matches!(err, RecognitionError::Decode(_)));
    }

    #[test]
    fn request_body_carries_data_uri() {
        let extractor = VisionExtractor::from_config(&OcrConfig::default());
        let body = extractor.request_body(&[1, 2, 3]);
        let url = body["messages"][0]["content"][1]["image_url"]["url"]
            .as_str()
            .unwrap();
        assert_eq!(url, "data:image/png;base64,AQID");
    }

    #[test]
    fn instruction_follows_language_correction_flag() {
        let on = VisionExtractor::from_config(&OcrConfig::default());
        assert!(on.instruction().contains("Fix obvious recognition mistakes"));

        let off = VisionExtractor::from_config(&OcrConfig {
            language_correction: false,
            ..OcrConfig::default()
        });
        assert!(off.instruction().contains("exactly as written"));
    }

    #[test]
    fn model_errors_map_to_recognition_errors() {
        assert!(matches!(
            RecognitionError::from(ModelError::Timeout),
            RecognitionError::Timeout
        ));
        assert!(matches!(
            RecognitionError::from(ModelError::Quota("slow down".into())),
            RecognitionError::Request(msg) if msg.contains("slow down")
        ));
    }
}
