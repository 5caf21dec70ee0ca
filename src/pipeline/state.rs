//! Request lifecycle and the immutable snapshot handed to presenters.
//!
//! [`ExplanationSnapshot`] is everything a presenter needs to draw the
//! screen.  The orchestrator publishes a fresh one after every change;
//! presenters never see a half-updated state.

use super::language::Language;

/// Shown when the model answers with no text at all.
pub const NO_RESPONSE: &str = "No response found";

/// Text shown in place of an explanation when a model call fails.
pub fn failure_text(reason: &str) -> String {
    format!("Something went wrong! \n{reason}")
}

// ---------------------------------------------------------------------------
// RequestState
// ---------------------------------------------------------------------------

/// What the outstanding request is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// A new explanation for a topic.
    Generation,
    /// The canonical explanation rendered in another language.
    Translation,
}

/// Lifecycle of the most recent generation or translation.
///
/// ```text
/// Idle ──submit / select──▶ Pending
/// Pending ──Ok──▶ Succeeded
/// Pending ──Err─▶ Failed(reason)
/// Succeeded / Failed ──next request──▶ Pending
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Pending(RequestKind),
    Succeeded,
    Failed(String),
}

impl RequestState {
    pub fn is_pending(&self) -> bool {
        matches!(self, RequestState::Pending(_))
    }

    /// A short human-readable label suitable for a status line.
    pub fn label(&self) -> &'static str {
        match self {
            RequestState::Idle => "Idle",
            RequestState::Pending(_) => "Thinking...",
            RequestState::Succeeded => "Done",
            RequestState::Failed(_) => "Error",
        }
    }
}

impl Default for RequestState {
    fn default() -> Self {
        RequestState::Idle
    }
}

// ---------------------------------------------------------------------------
// Explanation
// ---------------------------------------------------------------------------

/// The source-of-truth explanation from the latest successful generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explanation {
    pub text: String,
    /// Language that was active when the generation was issued.
    pub language: Language,
}

// ---------------------------------------------------------------------------
// ExplanationSnapshot
// ---------------------------------------------------------------------------

/// What the presenter should show in the response area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View<'a> {
    Loading,
    Response(&'a str),
    Blank,
}

/// Immutable picture of the orchestrator state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplanationSnapshot {
    /// Contents of the topic input box.
    pub topic_input: String,
    /// Language chosen in the picker.
    pub selected_language: Language,
    /// Latest successful generation, if any.
    pub canonical: Option<Explanation>,
    /// Text currently shown to the user.
    pub displayed: String,
    /// Language `displayed` is written in.  `None` when nothing has been
    /// shown yet or `displayed` holds a failure message.
    pub displayed_language: Option<Language>,
    pub request: RequestState,
    /// A photo is being read.  Does not affect `request`.
    pub recognizing: bool,
    /// Bumped on every published change.
    pub revision: u64,
}

impl ExplanationSnapshot {
    pub fn new(language: Language) -> Self {
        Self {
            topic_input: String::new(),
            selected_language: language,
            canonical: None,
            displayed: String::new(),
            displayed_language: None,
            request: RequestState::Idle,
            recognizing: false,
            revision: 0,
        }
    }

    /// `true` while a generation or translation is in flight.
    pub fn is_loading(&self) -> bool {
        self.request.is_pending()
    }

    pub fn view(&self) -> View<'_> {
        if self.is_loading() {
            View::Loading
        } else if self.displayed.is_empty() {
            View::Blank
        } else {
            View::Response(&self.displayed)
        }
    }

    /// The canonical explanation text, or `""` before the first success.
    pub fn canonical_text(&self) -> &str {
        self.canonical.as_ref().map_or("", |e| e.text.as_str())
    }
}

impl Default for ExplanationSnapshot {
    fn default() -> Self {
        Self::new(Language::default())
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Which collaborator a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSource {
    Model,
    Recognition,
    Storage,
}

/// A failure published on the orchestrator's diagnostics channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub source: DiagnosticSource,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_snapshot_is_blank_and_idle() {
        let snap = ExplanationSnapshot::new(Language::Hindi);
        assert_eq!(snap.selected_language, Language::Hindi);
        assert_eq!(snap.request, RequestState::Idle);
        assert_eq!(snap.view(), View::Blank);
        assert_eq!(snap.canonical_text(), "");
        assert!(snap.displayed_language.is_none());
    }

    #[test]
    fn pending_generation_shows_loading() {
        let snap = ExplanationSnapshot {
            displayed: "old".into(),
            request: RequestState::Pending(RequestKind::Generation),
            ..ExplanationSnapshot::default()
        };
        assert!(snap.is_loading());
        assert_eq!(snap.view(), View::Loading);
    }

    #[test]
    fn recognition_keeps_response_visible() {
        let snap = ExplanationSnapshot {
            displayed: "still here".into(),
            request: RequestState::Succeeded,
            recognizing: true,
            ..ExplanationSnapshot::default()
        };
        assert!(!snap.is_loading());
        assert_eq!(snap.view(), View::Response("still here"));
    }

    #[test]
    fn failure_text_embeds_reason() {
        let text = failure_text("quota exceeded");
        assert!(text.starts_with("Something went wrong!"));
        assert!(text.contains("quota exceeded"));
    }

    #[test]
    fn labels() {
        assert_eq!(RequestState::Idle.label(), "Idle");
        assert_eq!(RequestState::Pending(RequestKind::Translation).label(), "Thinking...");
        assert_eq!(RequestState::Succeeded.label(), "Done");
        assert_eq!(RequestState::Failed("x".into()).label(), "Error");
    }
}
