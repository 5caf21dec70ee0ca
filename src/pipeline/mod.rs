//! Explanation pipeline for the ELI5 explainer.
//!
//! This module owns the explanation state machine and exposes the immutable
//! snapshot that presenters render.
//!
//! # Architecture
//!
//! ```text
//! UserIntent (mpsc)
//!        │
//!        ▼
//! ExplanationOrchestrator::run()  ← async tokio task, single writer
//!        │
//!        ├─ SubmitTopic     → GenerationClient::generate  (task) → canonical + display
//!        ├─ SelectLanguage  → GenerationClient::generate  (task) → display only
//!        ├─ IngestImage     → TextExtractor::recognize    (task) → SubmitTopic
//!        └─ Save            → DocumentStore::write_explanation
//!
//! watch::Receiver<ExplanationSnapshot>  ←─── read by the presenter
//! broadcast::Receiver<Diagnostic>       ←─── failures for the status line
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use tokio::sync::mpsc;
//! use eli5::config::AppConfig;
//! use eli5::pipeline::{ExplanationOrchestrator, Language, UserIntent};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let orchestrator = ExplanationOrchestrator::from_config(&config);
//!     let mut snapshots = orchestrator.subscribe();
//!
//!     let (intent_tx, intent_rx) = mpsc::channel(16);
//!     tokio::spawn(orchestrator.run(intent_rx));
//!
//!     intent_tx.send(UserIntent::SubmitTopic("volcano".into())).await.unwrap();
//!     intent_tx.send(UserIntent::SelectLanguage(Language::Hindi)).await.unwrap();
//!
//!     while snapshots.changed().await.is_ok() {
//!         println!("{}", snapshots.borrow().displayed);
//!     }
//! }
//! ```

pub mod language;
pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use language::{Language, UnknownLanguage};
pub use runner::{ExplanationOrchestrator, UserIntent};
pub use state::{
    failure_text, Diagnostic, DiagnosticSource, Explanation, ExplanationSnapshot, RequestKind,
    RequestState, View, NO_RESPONSE,
};
