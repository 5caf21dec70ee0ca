//! Explanation orchestrator — decides between generating, translating, or
//! ignoring each user intent, and owns every piece of explanation state.
//!
//! # Flow
//!
//! ```text
//! SubmitTopic ──trim empty──▶ ignored
//!             └─▶ clear display, Pending ──▶ generate(prompt)   [task]
//!                   ├─ Ok  → canonical := text, display := text, clear input
//!                   │        └─ picker moved meanwhile → translate
//!                   └─ Err → display := "Something went wrong! …"
//!
//! SelectLanguage ──no canonical──▶ remember selection only
//!                ──generation pending──▶ remember, translate on landing
//!                ──already shown in it──▶ no-op
//!                └─▶ Pending ──▶ generate(translation prompt)    [task]
//!                      ├─ Ok  → display := text (canonical untouched)
//!                      └─ Err → display := "Something went wrong! …"
//!
//! IngestImage ──▶ recognize(bytes)                               [task]
//!                   ├─ Ok  → SubmitTopic(text)
//!                   └─ Err → diagnostic only
//! ```
//!
//! Requests run on spawned tokio tasks.  Their results come back through a
//! [`JoinSet`] and are applied only by the orchestrator, so the state has a
//! single writer and needs no lock.  Every change is published as an
//! [`ExplanationSnapshot`] on a `watch` channel.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{self, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, ExplainConfig, StalePolicy};
use crate::llm::{build_client, GenerationClient, ModelError, PromptBuilder};
use crate::ocr::{RecognitionError, TextExtractor, VisionExtractor};
use crate::storage::{DocumentStore, StorageError};

use super::language::Language;
use super::state::{
    failure_text, Diagnostic, DiagnosticSource, Explanation, ExplanationSnapshot, RequestKind,
    RequestState, NO_RESPONSE,
};

const DIAGNOSTIC_CAPACITY: usize = 16;

// ---------------------------------------------------------------------------
// UserIntent
// ---------------------------------------------------------------------------

/// Everything a presenter can ask the orchestrator to do.
#[derive(Debug, Clone)]
pub enum UserIntent {
    /// The topic box changed.
    EditTopic(String),
    /// The user pressed "explain".
    SubmitTopic(String),
    /// The language picker changed.
    SelectLanguage(Language),
    /// Text produced outside the topic box (e.g. pasted or recognised).
    IngestText(String),
    /// A photo was picked.
    IngestImage(Vec<u8>),
    /// Save the displayed explanation.
    Save,
    /// Stop reading any photo that is still being processed.
    CancelRecognition,
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Result of a background task, applied by the orchestrator.
enum Completion {
    Model {
        seq: u64,
        kind: RequestKind,
        language: Language,
        result: Result<String, ModelError>,
    },
    Recognition {
        result: Result<String, RecognitionError>,
    },
}

/// What a spawned task was doing, for when it dies without a completion.
#[derive(Debug, Clone, Copy)]
enum TaskMeta {
    Model { seq: u64, kind: RequestKind },
    Recognition,
}

// ---------------------------------------------------------------------------
// ExplanationOrchestrator
// ---------------------------------------------------------------------------

/// Owns the explanation state machine.
///
/// Operations return the snapshot they produced.  Background results are
/// applied by [`next_completion`](Self::next_completion) (one at a time),
/// [`settle`](Self::settle) (until idle) or [`run`](Self::run) (event loop).
///
/// ```rust,no_run
/// use eli5::config::AppConfig;
/// use eli5::pipeline::{ExplanationOrchestrator, Language};
///
/// # async fn example() {
/// let mut orc = ExplanationOrchestrator::from_config(&AppConfig::default());
/// orc.submit_topic("volcano");
/// let snap = orc.settle().await;
/// println!("{}", snap.displayed);
///
/// orc.select_language(Language::Hindi);
/// let snap = orc.settle().await;
/// println!("{}", snap.displayed);
/// # }
/// ```
pub struct ExplanationOrchestrator {
    state: ExplanationSnapshot,
    generation: Arc<dyn GenerationClient>,
    extractor: Arc<dyn TextExtractor>,
    store: DocumentStore,
    stale_policy: StalePolicy,

    /// Sequence number of the most recently issued model request.
    issued_seq: u64,
    /// Generations issued but not yet completed.
    outstanding_generations: usize,
    /// Recognitions issued but not yet completed.
    outstanding_recognitions: usize,
    /// Language the display shows or is about to show.  `None` after a
    /// failure, so any selection retries.
    target_language: Option<Language>,

    tasks: JoinSet<Completion>,
    task_meta: HashMap<task::Id, TaskMeta>,
    recognition_cancel: CancellationToken,
    snapshot_tx: watch::Sender<ExplanationSnapshot>,
    diagnostics_tx: broadcast::Sender<Diagnostic>,
}

impl ExplanationOrchestrator {
    /// Create an orchestrator.
    ///
    /// # Arguments
    ///
    /// * `generation` — model backend used for explanations and translations.
    /// * `extractor`  — photo text recogniser.
    /// * `store`      — where [`save_displayed_text`](Self::save_displayed_text) writes.
    /// * `config`     — default language and stale-result policy.
    pub fn new(
        generation: Arc<dyn GenerationClient>,
        extractor: Arc<dyn TextExtractor>,
        store: DocumentStore,
        config: &ExplainConfig,
    ) -> Self {
        let state = ExplanationSnapshot::new(config.default_language);
        let (snapshot_tx, _) = watch::channel(state.clone());
        let (diagnostics_tx, _) = broadcast::channel(DIAGNOSTIC_CAPACITY);

        Self {
            state,
            generation,
            extractor,
            store,
            stale_policy: config.stale_results,
            issued_seq: 0,
            outstanding_generations: 0,
            outstanding_recognitions: 0,
            target_language: None,
            tasks: JoinSet::new(),
            task_meta: HashMap::new(),
            recognition_cancel: CancellationToken::new(),
            snapshot_tx,
            diagnostics_tx,
        }
    }

    /// Wire up the production backends described by `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            build_client(&config.llm),
            Arc::new(VisionExtractor::from_config(&config.ocr)),
            DocumentStore::new(config.storage.resolved_dir()),
            &config.explain,
        )
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> ExplanationSnapshot {
        self.state.clone()
    }

    /// Receive every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ExplanationSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Receive model, recognition and storage failures.
    pub fn diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.diagnostics_tx.subscribe()
    }

    /// Number of background tasks not yet applied.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Dispatch one presenter intent.
    pub fn handle(&mut self, intent: UserIntent) -> ExplanationSnapshot {
        match intent {
            UserIntent::EditTopic(text) => self.edit_topic(&text),
            UserIntent::SubmitTopic(topic) => self.submit_topic(&topic),
            UserIntent::SelectLanguage(lang) => self.select_language(lang),
            UserIntent::IngestText(text) => self.ingest_external_text(&text),
            UserIntent::IngestImage(bytes) => self.ingest_image(bytes),
            UserIntent::Save => {
                // Failures are already logged and published as diagnostics.
                let _ = self.save_displayed_text();
                self.snapshot()
            }
            UserIntent::CancelRecognition => {
                self.cancel_recognition();
                self.snapshot()
            }
        }
    }

    /// Mirror the contents of the topic box.
    pub fn edit_topic(&mut self, text: &str) -> ExplanationSnapshot {
        if self.state.topic_input == text {
            return self.snapshot();
        }
        self.state.topic_input = text.to_string();
        self.publish()
    }

    /// Ask the model for a new explanation of `topic`.
    ///
    /// Blank topics are ignored without touching any state.
    pub fn submit_topic(&mut self, topic: &str) -> ExplanationSnapshot {
        let trimmed = topic.trim();
        if trimmed.is_empty() {
            log::debug!("pipeline: ignoring blank topic");
            return self.snapshot();
        }

        let language = self.state.selected_language;
        self.state.topic_input = topic.to_string();
        self.state.displayed.clear();
        self.state.displayed_language = None;
        self.state.request = RequestState::Pending(RequestKind::Generation);
        self.target_language = Some(language);
        self.outstanding_generations += 1;

        let prompt = PromptBuilder::generation(trimmed, language);
        let seq = self.spawn_model(RequestKind::Generation, language, prompt);
        log::info!("pipeline: generation #{seq} for {trimmed:?} in {language}");

        self.publish()
    }

    /// Switch the display language, translating the canonical explanation
    /// when needed.
    pub fn select_language(&mut self, lang: Language) -> ExplanationSnapshot {
        let changed = self.state.selected_language != lang;
        self.state.selected_language = lang;

        let has_canonical = !self.state.canonical_text().is_empty();
        if !has_canonical {
            log::debug!("pipeline: {lang} selected, nothing to translate yet");
        } else if self.outstanding_generations > 0 {
            log::debug!("pipeline: {lang} selected while generating, translating on arrival");
        } else if self.target_language == Some(lang) {
            log::debug!("pipeline: already showing {lang}, no request");
        } else {
            return self.issue_translation(lang);
        }

        if changed {
            self.publish()
        } else {
            self.snapshot()
        }
    }

    /// Treat `text` as if the user had typed it and submitted it.
    pub fn ingest_external_text(&mut self, text: &str) -> ExplanationSnapshot {
        log::debug!("pipeline: ingesting external text ({} chars)", text.chars().count());
        self.submit_topic(text)
    }

    /// Read text out of a photo, then submit it as a topic.
    pub fn ingest_image(&mut self, image: Vec<u8>) -> ExplanationSnapshot {
        let extractor = Arc::clone(&self.extractor);
        let cancel = self.recognition_cancel.clone();

        let handle = self.tasks.spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => Err(RecognitionError::Cancelled),
                result = extractor.recognize(&image) => result,
            };
            Completion::Recognition { result }
        });
        self.task_meta.insert(handle.id(), TaskMeta::Recognition);

        self.outstanding_recognitions += 1;
        self.state.recognizing = true;
        log::info!("pipeline: reading text from photo");
        self.publish()
    }

    /// Abandon every photo still being read.  The state is left untouched.
    pub fn cancel_recognition(&mut self) {
        if self.outstanding_recognitions > 0 {
            log::info!("pipeline: cancelling {} recognition(s)", self.outstanding_recognitions);
        }
        self.recognition_cancel.cancel();
        self.recognition_cancel = CancellationToken::new();
    }

    /// Write the displayed text to the explanation file.
    ///
    /// Returns `Ok(None)` without writing when nothing is displayed.
    pub fn save_displayed_text(&self) -> Result<Option<PathBuf>, StorageError> {
        if self.state.displayed.is_empty() {
            log::debug!("pipeline: nothing displayed, skipping save");
            return Ok(None);
        }

        match self.store.write_explanation(&self.state.displayed) {
            Ok(path) => Ok(Some(path)),
            Err(e) => {
                log::warn!("pipeline: save failed: {e}");
                self.report(DiagnosticSource::Storage, e.to_string());
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Completion handling
    // -----------------------------------------------------------------------

    /// Wait for one background task and apply its result.
    ///
    /// Returns `None` when nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<ExplanationSnapshot> {
        let joined = self.tasks.join_next_with_id().await?;
        self.on_joined(joined);
        Some(self.snapshot())
    }

    /// Apply completions until no background task is left.
    ///
    /// Follow-up requests issued while applying (e.g. a deferred
    /// translation) are waited for too.
    pub async fn settle(&mut self) -> ExplanationSnapshot {
        while self.next_completion().await.is_some() {}
        self.snapshot()
    }

    /// Run until `intents` is closed, applying intents and completions in
    /// arrival order.  Photos still being read are cancelled on exit.
    pub async fn run(mut self, mut intents: mpsc::Receiver<UserIntent>) {
        loop {
            tokio::select! {
                intent = intents.recv() => match intent {
                    Some(intent) => {
                        self.handle(intent);
                    }
                    None => break,
                },
                Some(joined) = self.tasks.join_next_with_id(), if !self.tasks.is_empty() => {
                    self.on_joined(joined);
                }
            }
        }

        self.recognition_cancel.cancel();
        log::info!("pipeline: intent channel closed, orchestrator shutting down");
    }

    fn on_joined(&mut self, joined: Result<(task::Id, Completion), JoinError>) {
        let id = match &joined {
            Ok((id, _)) => *id,
            Err(e) => e.id(),
        };
        let meta = self.task_meta.remove(&id);

        match joined {
            Ok((
                _,
                Completion::Model {
                    seq,
                    kind,
                    language,
                    result,
                },
            )) => self.apply_model(seq, kind, language, result),
            Ok((_, Completion::Recognition { result })) => self.apply_recognition(result),
            Err(e) => self.apply_task_failure(meta, e),
        }
    }

    fn apply_model(
        &mut self,
        seq: u64,
        kind: RequestKind,
        language: Language,
        result: Result<String, ModelError>,
    ) {
        if kind == RequestKind::Generation {
            self.outstanding_generations = self.outstanding_generations.saturating_sub(1);
        }

        if self.stale_policy == StalePolicy::DiscardStale && seq != self.issued_seq {
            log::debug!(
                "pipeline: discarding stale {kind:?} #{seq} (latest is #{})",
                self.issued_seq
            );
        } else {
            match result {
                Ok(text) => self.show_result(seq, kind, language, text),
                Err(e) => self.fail_request(kind, seq, &e.to_string()),
            }
        }

        if kind == RequestKind::Generation {
            self.follow_selection();
        }
    }

    fn show_result(&mut self, seq: u64, kind: RequestKind, language: Language, text: String) {
        let text = if text.trim().is_empty() {
            NO_RESPONSE.to_string()
        } else {
            text
        };

        log::info!("pipeline: {kind:?} #{seq} succeeded in {language}");
        if kind == RequestKind::Generation {
            self.state.canonical = Some(Explanation {
                text: text.clone(),
                language,
            });
            self.state.topic_input.clear();
        }
        self.state.displayed = text;
        self.state.displayed_language = Some(language);
        self.state.request = RequestState::Succeeded;
        self.target_language = Some(language);
        self.publish();
    }

    /// Once no generation is left, bring the display to the picked language
    /// if it moved while generating.  Failures (`target_language == None`)
    /// stay on screen.
    fn follow_selection(&mut self) {
        if self.outstanding_generations > 0 || self.state.canonical.is_none() {
            return;
        }
        let selected = self.state.selected_language;
        if matches!(self.target_language, Some(target) if target != selected) {
            log::debug!("pipeline: picker moved to {selected} while generating");
            self.issue_translation(selected);
        }
    }

    fn apply_recognition(&mut self, result: Result<String, RecognitionError>) {
        self.outstanding_recognitions = self.outstanding_recognitions.saturating_sub(1);
        self.state.recognizing = self.outstanding_recognitions > 0;

        match result {
            Ok(text) => {
                log::info!("pipeline: photo yielded {} chars", text.chars().count());
                // Blank text publishes only the `recognizing` change.
                let before = self.state.revision;
                self.ingest_external_text(&text);
                if self.state.revision == before {
                    self.publish();
                }
            }
            Err(RecognitionError::Cancelled) => {
                log::debug!("pipeline: recognition cancelled");
                self.publish();
            }
            Err(e) => {
                log::warn!("pipeline: recognition failed: {e}");
                self.report(DiagnosticSource::Recognition, e.to_string());
                self.publish();
            }
        }
    }

    /// A task panicked or was aborted, so its completion is lost.
    fn apply_task_failure(&mut self, meta: Option<TaskMeta>, e: JoinError) {
        let reason = format!("background task failed: {e}");

        match meta {
            Some(TaskMeta::Model { seq, kind }) => {
                if kind == RequestKind::Generation {
                    self.outstanding_generations = self.outstanding_generations.saturating_sub(1);
                }
                if seq == self.issued_seq && self.state.request.is_pending() {
                    self.fail_request(kind, seq, &reason);
                } else {
                    log::error!("pipeline: stale {kind:?} #{seq} lost: {e}");
                    self.report(DiagnosticSource::Model, reason);
                }
                if kind == RequestKind::Generation {
                    self.follow_selection();
                }
            }
            Some(TaskMeta::Recognition) => {
                log::error!("pipeline: recognition task lost: {e}");
                self.apply_recognition(Err(RecognitionError::Request(reason)));
            }
            None => {
                log::error!("pipeline: untracked task lost: {e}");
                self.report(DiagnosticSource::Model, reason);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn issue_translation(&mut self, lang: Language) -> ExplanationSnapshot {
        let Some(source) = self.state.canonical.as_ref().map(|c| c.text.clone()) else {
            return self.snapshot();
        };

        self.state.request = RequestState::Pending(RequestKind::Translation);
        self.target_language = Some(lang);

        let prompt = PromptBuilder::translation(&source, lang);
        let seq = self.spawn_model(RequestKind::Translation, lang, prompt);
        log::info!("pipeline: translation #{seq} to {lang}");

        self.publish()
    }

    fn spawn_model(&mut self, kind: RequestKind, language: Language, prompt: String) -> u64 {
        self.issued_seq += 1;
        let seq = self.issued_seq;
        let client = Arc::clone(&self.generation);

        let handle = self.tasks.spawn(async move {
            let result = client.generate(&prompt).await;
            Completion::Model {
                seq,
                kind,
                language,
                result,
            }
        });
        self.task_meta.insert(handle.id(), TaskMeta::Model { seq, kind });

        seq
    }

    /// Show a failure in place of the explanation; the canonical
    /// explanation is kept.
    fn fail_request(&mut self, kind: RequestKind, seq: u64, reason: &str) {
        log::error!("pipeline: {kind:?} #{seq} failed: {reason}");
        self.state.request = RequestState::Failed(reason.to_string());
        self.state.displayed = failure_text(reason);
        self.state.displayed_language = None;
        self.target_language = None;
        self.report(DiagnosticSource::Model, reason.to_string());
        self.publish();
    }

    fn report(&self, source: DiagnosticSource, message: String) {
        // No subscribers is fine.
        let _ = self.diagnostics_tx.send(Diagnostic { source, message });
    }

    fn publish(&mut self) -> ExplanationSnapshot {
        self.state.revision += 1;
        self.snapshot_tx.send_replace(self.state.clone());
        self.snapshot()
    }
}

impl Drop for ExplanationOrchestrator {
    fn drop(&mut self) {
        self.recognition_cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
