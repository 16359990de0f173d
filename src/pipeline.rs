use crate::{
    aggregator::{aggregate, file_section_count},
    analyzer::UnitAnalyzer,
    checkpoint::Checkpoint,
    chunker,
    collector::FileCollector,
    compiler::{ChunkTiming, CompilationState, IncrementalCompiler},
    config::Config,
    error::{Error, Result},
    file::{UnitAnalysis, read_source_unit, relative_label},
    generator::{OpenAiGenerator, TextGenerator},
    metrics::{PerformanceMetrics, PerformanceRecorder},
    prompts::PromptEngine,
    standardizer::Standardizer,
    writer::ReportWriter,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Everything produced by a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    /// Final standardized report
    pub report: String,

    /// Report produced by the incremental compiler
    pub compiled_report: String,

    /// Concatenated per-file analyses
    pub preliminary: String,

    /// Per-file analyses in collection order
    pub analyses: Vec<UnitAnalysis>,

    /// Number of chunks the preliminary document was split into
    pub chunk_count: usize,

    /// Compilation retries across all chunks
    pub retries: u32,

    /// False if compilation stalled and `compiled_report` is partial
    pub compilation_complete: bool,

    /// True if standardization failed and `report` is the fallback
    pub standardization_failed: bool,

    /// Where the report was written, if anywhere
    pub output_path: Option<PathBuf>,

    /// Stage timings
    pub metrics: PerformanceMetrics,
}

impl PipelineOutput {
    /// Number of files whose analysis is a failure placeholder.
    #[must_use]
    pub fn failed_analyses(&self) -> usize {
        self.analyses.iter().filter(|a| a.failed).count()
    }

    /// Prints a human-readable summary to stderr.
    pub fn print_summary(&self) {
        eprintln!("\n╔═══════════════════════════════════════════════════════╗");
        eprintln!("║               Report Pipeline Summary                 ║");
        eprintln!("╠═══════════════════════════════════════════════════════╣");
        eprintln!(
            "║ Files Analyzed:       {:>8}                        ║",
            self.analyses.len()
        );
        eprintln!(
            "║   - Failed:           {:>8}                        ║",
            self.failed_analyses()
        );
        eprintln!(
            "║ Compile Chunks:       {:>8}                        ║",
            self.chunk_count
        );
        eprintln!(
            "║ Compile Retries:      {:>8}                        ║",
            self.retries
        );
        eprintln!(
            "║ Compilation:          {:>8}                        ║",
            if self.compilation_complete { "complete" } else { "partial" }
        );
        eprintln!(
            "║ Standardization:      {:>8}                        ║",
            if self.standardization_failed { "failed" } else { "ok" }
        );
        eprintln!(
            "║ Total Time:           {:>8.2}s                       ║",
            self.metrics.total_ms / 1000.0
        );
        eprintln!("╚═══════════════════════════════════════════════════════╝");
        if let Some(path) = &self.output_path {
            eprintln!("Report written to {}\n", path.display());
        }
    }
}

/// Main pipeline orchestrator: collect, analyze, aggregate, compile, standardize.
pub struct Pipeline {
    config: Config,
    collector: FileCollector,
    generator: Arc<dyn TextGenerator>,
    prompts: Arc<PromptEngine>,
    writer: ReportWriter,
}

impl Pipeline {
    /// Creates a pipeline that talks to the configured chat completions endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - No API key is configured
    /// - The HTTP client cannot be built
    pub fn new(config: Config) -> Result<Self> {
        if config.api_key.is_none() {
            return Err(Error::MissingApiKey {
                service: config.api_url.clone(),
            });
        }

        let generator = Arc::new(OpenAiGenerator::from_config(&config)?);
        Self::with_generator(config, generator)
    }

    /// Creates a pipeline that uses `generator` for every generation call.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails.
    pub fn with_generator(config: Config, generator: Arc<dyn TextGenerator>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            collector: FileCollector::new(&config)?,
            prompts: Arc::new(PromptEngine::new()?),
            writer: ReportWriter::new(config.backup_existing),
            generator,
            config,
        })
    }

    /// Executes the complete pipeline.
    ///
    /// # Process
    ///
    /// 1. **Collect**: Enumerates eligible files under the root directory
    /// 2. **Analyze**: One generation call per file, strictly in order
    /// 3. **Aggregate**: Concatenates analyses into the preliminary document
    /// 4. **Compile**: Folds the preliminary document into one report
    /// 5. **Standardize**: Reformats the report into the fixed outline
    /// 6. **Write**: Persists the report when an output path is configured
    ///
    /// With `resume` enabled and a checkpoint made with the same root and
    /// chunk settings, stages 1 to 3 are skipped: the stored analyses and
    /// document are reused and compilation continues where it stopped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DirectoryNotFound`] if the root directory is missing,
    /// or an I/O error if the report cannot be written. Failures of single
    /// files, compile chunks and standardization degrade the report instead.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use codebrief::{Config, Pipeline};
    ///
    /// # async fn run() -> anyhow::Result<()> {
    /// let config = Config::builder()
    ///     .root_dir("./src")
    ///     .api_key("sk-...")
    ///     .output_path("src-report.md")
    ///     .build()?;
    ///
    /// let output = Pipeline::new(config)?.run().await?;
    /// output.print_summary();
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self), fields(root_dir = %self.config.root_dir.display()))]
    pub async fn run(self) -> Result<PipelineOutput> {
        let mut recorder = PerformanceRecorder::start();
        let root_label = self.config.root_label();

        info!("Starting pipeline execution for '{}'", root_label);

        if !self.config.root_dir.is_dir() {
            return Err(Error::directory_not_found(&self.config.root_dir));
        }

        let resumed = if self.config.resume {
            self.load_resume_checkpoint(&root_label)
        } else {
            None
        };

        let (analyses, preliminary, document, initial) = match resumed {
            Some(checkpoint) => {
                info!(
                    "Stages 1-3/6 skipped: reusing {} analyses from checkpoint saved {}",
                    checkpoint.analyses.len(),
                    checkpoint.saved_at
                );
                (
                    checkpoint.analyses,
                    checkpoint.document.clone(),
                    checkpoint.document,
                    Some(checkpoint.state),
                )
            }
            None => {
                let (analyses, preliminary) = self.analyze_tree(&root_label, &mut recorder).await?;
                // No files means nothing to compile; the seeded header is the report.
                let document = if analyses.is_empty() {
                    String::new()
                } else {
                    preliminary.clone()
                };
                (analyses, preliminary, document, None)
            }
        };

        // Stage 4: Compiling
        info!("Stage 4/6: Compiling report...");
        let stage_start = Instant::now();
        let compilation = self
            .compile(&root_label, &document, &analyses, initial)
            .await?;
        for timing in &compilation.chunk_timings {
            recorder.record(format!("compile[{}]", timing.index), timing.elapsed);
        }
        recorder.record_since("compile", stage_start);

        // Stage 5: Standardizing
        info!("Stage 5/6: Standardizing report...");
        let standardizer = Standardizer::new(
            Arc::clone(&self.generator),
            Arc::clone(&self.prompts),
            self.config.standardization.clone(),
            &root_label,
        );
        let standardized = standardizer.standardize(&compilation.report).await;
        recorder.record("standardize", standardized.elapsed);

        // Stage 6: Writing
        let stage_start = Instant::now();
        let output_path = self.write_outputs(&standardized.text, &preliminary)?;
        recorder.record_since("write", stage_start);

        let metrics = recorder.finish();

        info!(
            "✓ Pipeline completed in {:.2}s",
            metrics.total_ms / 1000.0
        );

        Ok(PipelineOutput {
            report: standardized.text,
            compiled_report: compilation.report,
            preliminary,
            analyses,
            chunk_count: compilation.chunk_count,
            retries: compilation.retries,
            compilation_complete: compilation.complete,
            standardization_failed: standardized.failed,
            output_path,
            metrics,
        })
    }

    /// Collects, analyzes and aggregates the tree (stages 1 to 3).
    async fn analyze_tree(
        &self,
        root_label: &str,
        recorder: &mut PerformanceRecorder,
    ) -> Result<(Vec<UnitAnalysis>, String)> {
        // Stage 1: Collecting
        info!("Stage 1/6: Collecting files...");
        let stage_start = Instant::now();
        let paths = self.collector.collect(&self.config.root_dir)?;
        recorder.record_since("collect", stage_start);
        info!("✓ Collected {} files", paths.len());

        // Stage 2: Analyzing
        info!("Stage 2/6: Analyzing files...");
        let stage_start = Instant::now();
        let analyses = self.analyze_all(&paths, root_label).await;
        recorder.record_since("analyze", stage_start);
        info!(
            "✓ Analyzed {} files ({} failed)",
            analyses.len(),
            analyses.iter().filter(|a| a.failed).count()
        );

        // Stage 3: Aggregating
        info!("Stage 3/6: Aggregating analyses...");
        let stage_start = Instant::now();
        let preliminary = aggregate(&analyses, root_label);
        recorder.record_since("aggregate", stage_start);
        debug!(
            "Preliminary document: {} sections, {} chars",
            file_section_count(&preliminary),
            preliminary.chars().count()
        );

        Ok((analyses, preliminary))
    }

    /// Reads and analyzes every file, one at a time, with a pause in between.
    async fn analyze_all(&self, paths: &[PathBuf], root_label: &str) -> Vec<UnitAnalysis> {
        let analyzer = UnitAnalyzer::new(
            Arc::clone(&self.generator),
            Arc::clone(&self.prompts),
            self.config.analysis.clone(),
            root_label,
        );
        let root = &self.config.root_dir;
        let mut analyses = Vec::with_capacity(paths.len());

        for (i, path) in paths.iter().enumerate() {
            if i > 0 && !self.config.file_delay.is_zero() {
                tokio::time::sleep(self.config.file_delay).await;
            }

            let analysis = match read_source_unit(root, path) {
                Ok(unit) => {
                    info!("[{}/{}] Analyzing {}", i + 1, paths.len(), unit.path);
                    analyzer.analyze(&unit).await
                }
                Err(e) => {
                    let label = relative_label(path, root);
                    warn!("Failed to read {}: {}", label, e);
                    UnitAnalysis::placeholder(label, e)
                }
            };

            analyses.push(analysis);
        }

        analyses
    }

    /// Runs the incremental compiler, turning a stall into a partial report.
    async fn compile(
        &self,
        root_label: &str,
        document: &str,
        analyses: &[UnitAnalysis],
        initial: Option<CompilationState>,
    ) -> Result<Compilation> {
        let mut compiler = IncrementalCompiler::new(
            Arc::clone(&self.generator),
            Arc::clone(&self.prompts),
            &self.config,
        );

        let checkpoint_path = self.config.checkpoint_file();
        if let Some(path) = &checkpoint_path {
            compiler = compiler.with_checkpoint(path.clone(), analyses.to_vec());
        }

        let total_chunks =
            chunker::split(document, compiler.chunk_size(), Some(compiler.overlap())).len();

        let resuming = initial.is_some();
        let outcome = match compiler.compile(root_label, document, initial).await {
            Err(Error::InvalidState { message }) if resuming => {
                warn!("Discarding checkpoint state ({}), compiling from the start", message);
                compiler.compile(root_label, document, None).await
            }
            outcome => outcome,
        };

        match outcome {
            Ok(compiled) => {
                info!(
                    "✓ Compiled {} chunks ({} retries)",
                    compiled.chunk_count, compiled.retries
                );
                Ok(Compilation {
                    report: compiled.report,
                    chunk_count: compiled.chunk_count,
                    retries: compiled.retries,
                    complete: true,
                    chunk_timings: compiled.chunk_timings,
                })
            }
            Err(Error::CompilationStalled {
                chunk_index,
                attempts,
                message,
                state,
                retries,
                chunk_timings,
            }) => {
                warn!(
                    "Compilation stalled at chunk {}/{} after {} attempts: {}",
                    chunk_index + 1,
                    total_chunks,
                    attempts,
                    message
                );
                if let Some(path) = &checkpoint_path {
                    warn!("Resume later with --resume (checkpoint: {})", path.display());
                }

                let report = format!(
                    "{}\n\n> **Note:** this report is incomplete. Compilation stopped at part {} of {}: {}\n",
                    state.running_report.trim_end(),
                    chunk_index + 1,
                    total_chunks,
                    message
                );

                Ok(Compilation {
                    report,
                    chunk_count: total_chunks,
                    retries,
                    complete: false,
                    chunk_timings,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Loads the checkpoint to resume from, if it fits the current settings.
    fn load_resume_checkpoint(&self, root_label: &str) -> Option<Checkpoint> {
        let path = self.config.checkpoint_file()?;

        let checkpoint = match Checkpoint::load(&path) {
            Ok(Some(checkpoint)) => checkpoint,
            Ok(None) => {
                info!("No checkpoint at {}, starting fresh", path.display());
                return None;
            }
            Err(e) => {
                warn!("Ignoring unreadable checkpoint {}: {}", path.display(), e);
                return None;
            }
        };

        if !checkpoint.matches(
            root_label,
            self.config.compile_chunk_size,
            self.config.effective_overlap(),
        ) {
            warn!(
                "Ignoring checkpoint {}: it was made with different root or chunk settings",
                path.display()
            );
            return None;
        }

        if !checkpoint.is_consistent() {
            warn!(
                "Ignoring checkpoint {}: chunk {} is past the end of its document",
                path.display(),
                checkpoint.state.last_processed_index
            );
            return None;
        }

        info!(
            "Resuming compilation from chunk {}",
            checkpoint.state.last_processed_index + 1
        );
        Some(checkpoint)
    }

    /// Writes the report and, if requested, the preliminary document.
    fn write_outputs(&self, report: &str, preliminary: &str) -> Result<Option<PathBuf>> {
        let Some(output) = &self.config.output_path else {
            return Ok(None);
        };

        info!("Stage 6/6: Writing report...");
        self.writer.write(output, report)?;

        if let Some(path) = self.config.preliminary_file() {
            self.writer.write(&path, preliminary)?;
            debug!("Wrote preliminary document to {}", path.display());
        }

        info!("✓ Wrote report to {}", output.display());
        Ok(Some(output.clone()))
    }
}

/// Outcome of the compile stage, complete or partial.
struct Compilation {
    report: String,
    chunk_count: usize,
    retries: u32,
    complete: bool,
    chunk_timings: Vec<ChunkTiming>,
}
