//! Photo text recognition.
//!
//! ```text
//! image bytes ──▶ prepare_image (decode, downscale, PNG)   [blocking pool]
//!             ──▶ vision model (one text region per line)
//!             ──▶ join_regions (single-space join)          ──▶ topic text
//! ```

pub mod extractor;

pub use extractor::{join_regions, prepare_image, RecognitionError, TextExtractor, VisionExtractor};

// test-only re-export so the pipeline tests can import the mock directly.
#[cfg(test)]
pub use extractor::MockTextExtractor;
