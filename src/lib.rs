//! ELI5 — explain any topic like the reader is five, in English or Hindi.
//!
//! * [`config`]   — TOML settings and platform paths.
//! * [`llm`]      — generation backends and prompt templates.
//! * [`ocr`]      — reading topic text out of photos.
//! * [`pipeline`] — the explanation orchestrator and its snapshots.
//! * [`storage`]  — saving the displayed explanation.

pub mod config;
pub mod llm;
pub mod ocr;
pub mod pipeline;
pub mod storage;
