//! Application entry point — ELI5 terminal presenter.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create [`tokio`] runtime.
//! 4. Build the [`ExplanationOrchestrator`] from config and spawn its loop.
//! 5. Spawn the snapshot renderer and the diagnostics printer.
//! 6. Read commands from stdin until `:quit` or end of input.
//!
//! # Commands
//!
//! | Input            | Intent                         |
//! |------------------|--------------------------------|
//! | any other text   | explain that topic             |
//! | `:lang <name>`   | switch language (`hi`, `English`, `हिंदी`) |
//! | `:image <path>`  | read a topic from a photo      |
//! | `:cancel`        | stop reading a photo           |
//! | `:save`          | save the displayed explanation |
//! | `:help`          | list commands                  |
//! | `:quit`          | exit                           |

use std::path::PathBuf;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc, watch};

use eli5::config::AppConfig;
use eli5::pipeline::{
    ExplanationOrchestrator, ExplanationSnapshot, Language, UnknownLanguage, UserIntent, View,
};

// ---------------------------------------------------------------------------
// Command parsing
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Command {
    Intent(UserIntent),
    Image(PathBuf),
    Help,
    Quit,
}

#[derive(Debug, Error)]
enum CommandError {
    #[error("unknown command :{0} (try :help)")]
    Unknown(String),

    #[error(":{0} needs an argument")]
    MissingArgument(&'static str),

    #[error(transparent)]
    Language(#[from] UnknownLanguage),
}

fn parse_command(line: &str) -> Result<Command, CommandError> {
    let Some(rest) = line.trim().strip_prefix(':') else {
        return Ok(Command::Intent(UserIntent::SubmitTopic(line.to_string())));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    match name {
        "lang" if arg.is_empty() => Err(CommandError::MissingArgument("lang")),
        "lang" => Ok(Command::Intent(UserIntent::SelectLanguage(arg.parse()?))),
        "image" if arg.is_empty() => Err(CommandError::MissingArgument("image")),
        "image" => Ok(Command::Image(PathBuf::from(arg))),
        "cancel" => Ok(Command::Intent(UserIntent::CancelRecognition)),
        "save" => Ok(Command::Intent(UserIntent::Save)),
        "help" => Ok(Command::Help),
        "quit" | "q" => Ok(Command::Quit),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

fn print_help() {
    let languages: Vec<_> = Language::ALL
        .iter()
        .map(|l| format!("{} ({})", l.label(), l.code()))
        .collect();
    println!("Type a topic and press Enter to get a simple explanation.");
    println!("  :lang <language>   switch language: {}", languages.join(", "));
    println!("  :image <path>      explain the text in a photo");
    println!("  :cancel            stop reading a photo");
    println!("  :save              save the explanation");
    println!("  :quit              exit");
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Text for the response area, or `None` when it should stay empty.
fn render_line(snap: &ExplanationSnapshot) -> Option<String> {
    let body = match snap.view() {
        View::Loading => Some(snap.request.label().to_string()),
        View::Response(text) => Some(match snap.displayed_language {
            Some(lang) => format!("[{}] {text}", lang.label()),
            None => text.to_string(),
        }),
        View::Blank => None,
    };

    match (snap.recognizing, body) {
        (true, Some(body)) => Some(format!("(reading photo) {body}")),
        (true, None) => Some("Reading photo...".to_string()),
        (false, body) => body,
    }
}

async fn render(mut snapshots: watch::Receiver<ExplanationSnapshot>) {
    let mut last: Option<String> = None;
    while snapshots.changed().await.is_ok() {
        let line = render_line(&snapshots.borrow_and_update());
        if line.is_some() && line != last {
            if let Some(text) = &line {
                println!("{text}");
            }
        }
        last = line;
    }
}

async fn report(mut diagnostics: broadcast::Receiver<eli5::pipeline::Diagnostic>) {
    loop {
        match diagnostics.recv().await {
            Ok(diag) => eprintln!("! {:?}: {}", diag.source, diag.message),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                log::warn!("presenter: skipped {n} diagnostics");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

async fn run(config: AppConfig) -> anyhow::Result<()> {
    let orchestrator = ExplanationOrchestrator::from_config(&config);
    let renderer = tokio::spawn(render(orchestrator.subscribe()));
    tokio::spawn(report(orchestrator.diagnostics()));

    let (intent_tx, intent_rx) = mpsc::channel::<UserIntent>(16);
    let pipeline = tokio::spawn(orchestrator.run(intent_rx));

    print_help();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let intent = match parse_command(&line) {
            Ok(Command::Intent(intent)) => intent,
            Ok(Command::Image(path)) => match tokio::fs::read(&path).await {
                Ok(bytes) => UserIntent::IngestImage(bytes),
                Err(e) => {
                    eprintln!("! cannot read {}: {e}", path.display());
                    continue;
                }
            },
            Ok(Command::Help) => {
                print_help();
                continue;
            }
            Ok(Command::Quit) => break,
            Err(e) => {
                eprintln!("! {e}");
                continue;
            }
        };

        if intent_tx.send(intent).await.is_err() {
            log::error!("presenter: orchestrator stopped unexpectedly");
            break;
        }
    }

    drop(intent_tx);
    pipeline.await?;
    renderer.abort();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("ELI5 starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    rt.block_on(run(config))?;
    log::info!("ELI5 shutting down");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
