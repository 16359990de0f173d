//! Incremental compilation of the preliminary document into one report.
//!
//! The document is split into overlapping chunks and folded, one chunk at a
//! time, into a running report. Each fold step is a single generation call
//! that receives the chunk and the current report and returns the updated
//! report. [`CompilationState`] is the fold accumulator: it only advances
//! after a step succeeds, so a failed run can be resumed from it without
//! reprocessing or skipping chunks.

use crate::checkpoint::Checkpoint;
use crate::chunker::{self, Chunk};
use crate::config::{Config, ModelSettings};
use crate::error::{Error, Result};
use crate::file::UnitAnalysis;
use crate::generator::{GenerationRequest, TextGenerator};
use crate::prompts::{COMPILE_SYSTEM_PROMPT, PromptEngine};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Progress of a compilation.
///
/// `last_processed_index` is the number of chunks folded into
/// `running_report`, which is also the index of the next chunk to process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationState {
    /// Report accumulated so far
    pub running_report: String,

    /// Number of chunks already folded into the report
    pub last_processed_index: usize,
}

impl CompilationState {
    /// Initial state: a report header naming the root and no chunks processed.
    #[must_use]
    pub fn seeded(root_label: &str) -> Self {
        Self {
            running_report: format!("# Codebase Report: {root_label}\n\n"),
            last_processed_index: 0,
        }
    }
}

/// Bounded retry with exponential backoff for a single fold step.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries allowed per chunk after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry
    pub initial_backoff: Duration,

    /// Upper bound on any single delay
    pub max_backoff: Duration,

    /// Growth factor between consecutive delays
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Policy with the default backoff and the given retry count.
    #[must_use]
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Policy that retries immediately.
    #[must_use]
    pub const fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);

        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::config(format!(
                "retry multiplier ({}) must be a finite number >= 1",
                self.multiplier
            )));
        }

        if self.max_backoff < self.initial_backoff {
            return Err(Error::config(
                "max_backoff must not be smaller than initial_backoff",
            ));
        }

        Ok(())
    }
}

/// Time spent folding one chunk, retries included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkTiming {
    /// Chunk index
    pub index: usize,

    /// Wall-clock time for the chunk
    pub elapsed: Duration,
}

/// Result of a completed compilation.
#[derive(Debug, Clone)]
pub struct CompiledReport {
    /// Final running report
    pub report: String,

    /// Final state; its index equals `chunk_count`
    pub state: CompilationState,

    /// Number of chunks the document was split into
    pub chunk_count: usize,

    /// Retries performed across all chunks
    pub retries: u32,

    /// Timing of every chunk processed by this call
    pub chunk_timings: Vec<ChunkTiming>,
}

/// Folds a document into a running report chunk by chunk.
pub struct IncrementalCompiler {
    generator: Arc<dyn TextGenerator>,
    prompts: Arc<PromptEngine>,
    settings: ModelSettings,
    chunk_size: usize,
    overlap: Option<usize>,
    retry: RetryPolicy,
    checkpoint: Option<PathBuf>,
    checkpoint_analyses: Vec<UnitAnalysis>,
}

impl IncrementalCompiler {
    /// Creates a compiler with the chunking, model and retry settings from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in prompt templates fail to load.
    pub fn from_config(generator: Arc<dyn TextGenerator>, config: &Config) -> Result<Self> {
        Ok(Self::new(generator, Arc::new(PromptEngine::new()?), config))
    }

    pub(crate) fn new(
        generator: Arc<dyn TextGenerator>,
        prompts: Arc<PromptEngine>,
        config: &Config,
    ) -> Self {
        Self {
            generator,
            prompts,
            settings: config.compilation.clone(),
            chunk_size: config.compile_chunk_size,
            overlap: config.overlap,
            retry: config.retry.clone(),
            checkpoint: None,
            checkpoint_analyses: Vec::new(),
        }
    }

    /// Persists a [`Checkpoint`] to `path` after every folded chunk.
    ///
    /// `analyses` are stored alongside the document so a resumed run can
    /// reuse them instead of analyzing the files again.
    #[must_use]
    pub fn with_checkpoint(mut self, path: PathBuf, analyses: Vec<UnitAnalysis>) -> Self {
        self.checkpoint = Some(path);
        self.checkpoint_analyses = analyses;
        self
    }

    /// Compile chunk size in chars.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap between chunks after clamping, in chars.
    #[must_use]
    pub fn overlap(&self) -> usize {
        chunker::effective_overlap(self.chunk_size, self.overlap)
    }

    /// Compiles `document` into a single report.
    ///
    /// Without `initial`, compilation starts from [`CompilationState::seeded`].
    /// With it, chunks before `initial.last_processed_index` are skipped and
    /// the fold continues from `initial.running_report`.
    ///
    /// A failed step is retried according to the retry policy, continuing
    /// from the state before the failing chunk. An empty document yields the
    /// initial report without any generation call.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if `initial` points past the last chunk
    /// - [`Error::CompilationStalled`] if a chunk still fails after all
    ///   retries; the error carries the state to resume from, the retry
    ///   count and the timings of the chunks folded so far
    pub async fn compile(
        &self,
        root_label: &str,
        document: &str,
        initial: Option<CompilationState>,
    ) -> Result<CompiledReport> {
        if let Some(overlap) = self.overlap.filter(|&o| o >= self.chunk_size) {
            warn!(
                "Overlap {} is not smaller than chunk size {}, using {}",
                overlap,
                self.chunk_size,
                self.overlap()
            );
        }

        let chunks = chunker::split(document, self.chunk_size, self.overlap);
        let mut state = initial.unwrap_or_else(|| CompilationState::seeded(root_label));

        if state.last_processed_index > chunks.len() {
            return Err(Error::invalid_state(format!(
                "resume index {} exceeds chunk count {}",
                state.last_processed_index,
                chunks.len()
            )));
        }

        info!(
            "Compiling {} chunks (starting at {})",
            chunks.len(),
            state.last_processed_index
        );

        let mut retries = 0;
        let mut chunk_timings = Vec::with_capacity(chunks.len() - state.last_processed_index);

        for chunk in &chunks[state.last_processed_index..] {
            let started = Instant::now();
            let mut attempt: u32 = 0;

            let report = loop {
                match self.fold(root_label, chunk, chunks.len(), &state).await {
                    Ok(report) => break report,
                    Err(e) => {
                        attempt += 1;
                        if attempt > self.retry.max_retries {
                            warn!(
                                "Chunk {}/{} failed {} times, giving up: {}",
                                chunk.index + 1,
                                chunks.len(),
                                attempt,
                                e
                            );
                            return Err(Error::CompilationStalled {
                                chunk_index: chunk.index,
                                attempts: attempt,
                                message: e.to_string(),
                                state: Box::new(state),
                                retries,
                                chunk_timings,
                            });
                        }

                        let delay = self.retry.backoff(attempt);
                        warn!(
                            transient = e.is_transient(),
                            "Chunk {}/{} failed (attempt {}), resuming from chunk {} in {:?}: {}",
                            chunk.index + 1,
                            chunks.len(),
                            attempt,
                            state.last_processed_index,
                            delay,
                            e
                        );
                        retries += 1;
                        tokio::time::sleep(delay).await;
                    }
                }
            };

            state.running_report = report;
            state.last_processed_index = chunk.index + 1;

            let elapsed = started.elapsed();
            chunk_timings.push(ChunkTiming {
                index: chunk.index,
                elapsed,
            });
            debug!(
                "Folded chunk {}/{} in {:.2}s",
                chunk.index + 1,
                chunks.len(),
                elapsed.as_secs_f64()
            );

            self.save_checkpoint(root_label, document, &state);
        }

        if let Some(path) = &self.checkpoint {
            if let Err(e) = Checkpoint::remove(path) {
                warn!("Failed to remove checkpoint {}: {}", path.display(), e);
            }
        }

        Ok(CompiledReport {
            report: state.running_report.clone(),
            state,
            chunk_count: chunks.len(),
            retries,
            chunk_timings,
        })
    }

    /// One fold step: merges `chunk` into the running report.
    async fn fold(
        &self,
        root_label: &str,
        chunk: &Chunk,
        total_chunks: usize,
        state: &CompilationState,
    ) -> Result<String> {
        let prompt = self.prompts.compile_chunk(
            root_label,
            chunk.index,
            total_chunks,
            &state.running_report,
            &chunk.text,
        )?;
        let request = GenerationRequest::new(COMPILE_SYSTEM_PROMPT, prompt, &self.settings);

        let report = self.generator.generate(&request).await?;

        // An empty answer would wipe the running report.
        if report.trim().is_empty() {
            return Err(Error::EmptyResponse);
        }

        Ok(report)
    }

    fn save_checkpoint(&self, root_label: &str, document: &str, state: &CompilationState) {
        let Some(path) = &self.checkpoint else {
            return;
        };

        let checkpoint =
            Checkpoint::new(root_label, document, self.chunk_size, self.overlap(), state.clone())
                .with_analyses(self.checkpoint_analyses.clone());
        if let Err(e) = checkpoint.save(path) {
            warn!("Failed to write checkpoint {}: {}", path.display(), e);
        }
    }
}
