//! Target languages for explanations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A language the explanation can be shown in.
///
/// The picker order is the declaration order; [`Language::index`] and
/// [`Language::from_index`] map to and from that position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    English,
    Hindi,
}

impl Language {
    /// Every supported language, in picker order.
    pub const ALL: [Language; 2] = [Language::English, Language::Hindi];

    /// Position in [`Language::ALL`].
    pub fn index(self) -> usize {
        match self {
            Language::English => 0,
            Language::Hindi => 1,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// English name, as used inside prompts.
    pub fn name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi",
        }
    }

    /// Label shown in the language picker, in the language itself.
    pub fn label(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "हिंदी",
        }
    }

    /// ISO-639-1 code.
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Hindi => "hi",
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::English
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a string names no supported language.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown language: {0}")]
pub struct UnknownLanguage(pub String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    /// Accepts the English name (any case), the picker label, or the ISO code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|lang| {
                lang.name().eq_ignore_ascii_case(wanted)
                    || lang.code().eq_ignore_ascii_case(wanted)
                    || lang.label() == wanted
            })
            .ok_or_else(|| UnknownLanguage(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_follow_picker_order() {
        assert_eq!(Language::English.index(), 0);
        assert_eq!(Language::Hindi.index(), 1);
        assert_eq!(Language::from_index(1), Some(Language::Hindi));
        assert_eq!(Language::from_index(2), None);
    }

    #[test]
    fn every_language_round_trips_through_its_index() {
        for lang in Language::ALL {
            assert_eq!(Language::from_index(lang.index()), Some(lang));
        }
    }

    #[test]
    fn parses_names_codes_and_labels() {
        assert_eq!("english".parse(), Ok(Language::English));
        assert_eq!("HI".parse(), Ok(Language::Hindi));
        assert_eq!(" Hindi ".parse(), Ok(Language::Hindi));
        assert_eq!("हिंदी".parse(), Ok(Language::Hindi));
    }

    #[test]
    fn rejects_unknown_language() {
        assert_eq!(
            "Klingon".parse::<Language>(),
            Err(UnknownLanguage("Klingon".into()))
        );
    }

    #[test]
    fn default_is_english() {
        assert_eq!(Language::default(), Language::English);
        assert_eq!(Language::default().to_string(), "English");
    }
}
