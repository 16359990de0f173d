//! On-disk compilation checkpoints.

use crate::chunker;
use crate::compiler::CompilationState;
use crate::error::{Error, Result};
use crate::file::UnitAnalysis;
use crate::writer::ReportWriter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// A [`CompilationState`] together with the document it was produced from.
///
/// The document is stored verbatim, along with the analyses it was
/// aggregated from, so a resumed run folds exactly the chunks the state
/// refers to instead of a freshly generated document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Label of the analyzed directory
    pub root_label: String,

    /// Compile chunk size in chars
    pub chunk_size: usize,

    /// Effective overlap between chunks in chars
    pub overlap: usize,

    /// Preliminary document being compiled
    pub document: String,

    /// Analyses the document was aggregated from
    #[serde(default)]
    pub analyses: Vec<UnitAnalysis>,

    /// Compilation progress
    pub state: CompilationState,

    /// Local time the checkpoint was taken
    #[serde(default)]
    pub saved_at: String,
}

impl Checkpoint {
    /// Creates a checkpoint.
    #[must_use]
    pub fn new(
        root_label: impl Into<String>,
        document: impl Into<String>,
        chunk_size: usize,
        overlap: usize,
        state: CompilationState,
    ) -> Self {
        Self {
            root_label: root_label.into(),
            chunk_size,
            overlap,
            document: document.into(),
            analyses: Vec::new(),
            state,
            saved_at: chrono::Local::now()
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        }
    }

    /// Attaches the analyses the document was built from.
    #[must_use]
    pub fn with_analyses(mut self, analyses: Vec<UnitAnalysis>) -> Self {
        self.analyses = analyses;
        self
    }

    /// Returns true if this checkpoint was made with the given settings.
    #[must_use]
    pub fn matches(&self, root_label: &str, chunk_size: usize, overlap: usize) -> bool {
        self.root_label == root_label && self.chunk_size == chunk_size && self.overlap == overlap
    }

    /// Number of chunks the stored document splits into.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        chunker::split(&self.document, self.chunk_size, Some(self.overlap)).len()
    }

    /// Returns true if the state does not point past the stored document.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.state.last_processed_index <= self.chunk_count()
    }

    /// Loads a checkpoint, returning `None` if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not parse.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(path, e)),
        };

        let checkpoint: Self = serde_json::from_str(&json)?;
        debug!(
            "Loaded checkpoint from {} at chunk {} (saved {})",
            path.display(),
            checkpoint.state.last_processed_index,
            checkpoint.saved_at
        );
        Ok(Some(checkpoint))
    }

    /// Writes the checkpoint atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        ReportWriter::new(false).write(path, &json)
    }

    /// Deletes a checkpoint file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove(path: &Path) -> Result<()> {
        ReportWriter::remove(path)
    }
}
