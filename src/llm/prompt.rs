//! Prompt builder for explanations and translations.
//!
//! [`PromptBuilder`] renders two prompts:
//! * **Generation** — explain a topic like the reader is five, in a language.
//! * **Translation** — re-express an existing explanation in another
//!   language, keeping the same five-year-old framing.

use crate::pipeline::Language;

/// Builds the generation and translation prompts sent to the model.
///
/// # Example
/// ```rust
/// use eli5::llm::PromptBuilder;
/// use eli5::pipeline::Language;
///
/// let prompt = PromptBuilder::generation("gravity", Language::English);
/// assert!(prompt.starts_with("Explain gravity to me like I'm 5 years old"));
/// ```
pub struct PromptBuilder;

impl PromptBuilder {
    /// Prompt for a brand-new explanation of `topic`, answered in `language`.
    pub fn generation(topic: &str, language: Language) -> String {
        format!(
            "Explain {topic} to me like I'm 5 years old, using a simple analogy. \
             Keep it very short (2-3 sentences), easy to understand, and do not use \
             complex words. Answer in simple {}.",
            language.name()
        )
    }

    /// Prompt that translates `explanation` into `target`.
    pub fn translation(explanation: &str, target: Language) -> String {
        format!(
            "Translate the following text to {}, keeping it very simple and short \
             as if explaining to a 5-year-old:\n\n{explanation}",
            target.name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_prompt_matches_template() {
        let prompt = PromptBuilder::generation("volcano", Language::English);
        assert_eq!(
            prompt,
            "Explain volcano to me like I'm 5 years old, using a simple analogy. \
             Keep it very short (2-3 sentences), easy to understand, and do not use \
             complex words. Answer in simple English."
        );
    }

    #[test]
    fn generation_prompt_names_hindi() {
        let prompt = PromptBuilder::generation("rain", Language::Hindi);
        assert!(prompt.ends_with("Answer in simple Hindi."));
        assert!(prompt.contains("Explain rain to me"));
    }

    #[test]
    fn translation_prompt_matches_template() {
        let prompt = PromptBuilder::translation("A volcano is Earth burping rocks.", Language::Hindi);
        assert_eq!(
            prompt,
            "Translate the following text to Hindi, keeping it very simple and short \
             as if explaining to a 5-year-old:\n\nA volcano is Earth burping rocks."
        );
    }
}
