//! Saving the displayed explanation to disk.
//!
//! There is exactly one artifact, [`EXPLANATION_FILE`], in the documents
//! directory.  Each save replaces it in full.

use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Name of the saved explanation file.
pub const EXPLANATION_FILE: &str = "ELI5_Explanation.txt";

/// Failure to write the explanation file.
#[derive(Debug, Error)]
#[error("failed to write {}: {source}", .path.display())]
pub struct StorageError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

fn at(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError {
    let path = path.to_path_buf();
    move |source| StorageError { path, source }
}

/// Directory-backed store for the explanation file.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    dir: PathBuf,
}

impl DocumentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Full path of the explanation file.
    pub fn explanation_path(&self) -> PathBuf {
        self.dir.join(EXPLANATION_FILE)
    }

    /// Replace the explanation file with `text` (UTF-8).
    ///
    /// The text goes to a sibling temp file first and is renamed into place,
    /// so readers never observe a partially written file.
    pub fn write_explanation(&self, text: &str) -> Result<PathBuf, StorageError> {
        let path = self.explanation_path();
        let tmp = self.dir.join(format!(".{EXPLANATION_FILE}.tmp"));

        std::fs::create_dir_all(&self.dir).map_err(at(&self.dir))?;

        let written = write_synced(&tmp, text)
            .map_err(at(&tmp))
            .and_then(|()| std::fs::rename(&tmp, &path).map_err(at(&path)));
        if let Err(e) = written {
            if let Err(cleanup) = std::fs::remove_file(&tmp) {
                log::debug!("storage: could not remove {}: {cleanup}", tmp.display());
            }
            return Err(e);
        }

        log::info!("storage: saved explanation to {}", path.display());
        Ok(path)
    }
}

fn write_synced(path: &Path, text: &str) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(text.as_bytes())?;
    file.sync_all()
}
