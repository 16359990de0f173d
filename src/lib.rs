//! # codebrief
//!
//! Turns a source tree into a single Markdown report by asking an LLM about
//! every file and compiling the answers incrementally.
//!
//! ## Features
//!
//! - Sorted file collection with ignore rules and optional `.gitignore` support
//! - One analysis call per file, with failures kept as placeholders
//! - Overlapping character chunks folded into a running report
//! - Per-chunk retry with backoff and resumable on-disk checkpoints
//! - Atomic report writes with automatic backups
//! - Stage timing metrics
//!
//! ## Quick Start
//!
//! ```no_run
//! use codebrief::{Config, Pipeline};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .root_dir("./src")
//!     .output_path("./report.md")
//!     .api_key("sk-...")
//!     .build()?;
//!
//! let output = Pipeline::new(config)?.run().await?;
//! println!("{} files analyzed", output.analyses.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library follows a pipeline architecture:
//! 1. **Collector**: Discovers files under the root in sorted order
//! 2. **Analyzer**: Produces one analysis per file
//! 3. **Aggregator**: Joins analyses into the preliminary document
//! 4. **Compiler**: Folds overlapping chunks of that document into one report
//! 5. **Standardizer**: Rewrites the report into a fixed outline
//! 6. **Writer**: Persists the report atomically

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod aggregator;
mod analyzer;
mod checkpoint;
mod collector;
mod compiler;
mod config;
mod error;
mod file;
mod filter;
mod generator;
mod metrics;
mod pipeline;
mod prompts;
mod standardizer;
mod writer;

pub mod api;
pub mod chunker;

pub use aggregator::{aggregate, file_section_count};
pub use analyzer::UnitAnalyzer;
pub use checkpoint::Checkpoint;
pub use chunker::Chunk;
pub use collector::FileCollector;
pub use compiler::{
    ChunkTiming, CompilationState, CompiledReport, IncrementalCompiler, RetryPolicy,
};
pub use config::{Config, ConfigBuilder, ModelSettings};
pub use error::{Error, Result};
pub use file::{SourceUnit, UnitAnalysis, read_source_unit};
pub use filter::IgnoreConfig;
pub use generator::{DEFAULT_API_URL, GenerationRequest, OpenAiGenerator, TextGenerator};
pub use metrics::{PerformanceMetrics, PerformanceRecorder, StageTiming};
pub use pipeline::{Pipeline, PipelineOutput};
pub use standardizer::{STANDARDIZATION_FAILED, StandardizedReport, Standardizer};

/// Runs the complete report pipeline with the given configuration.
///
/// This is the main entry point for the library.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - No API key is configured
/// - Root directory doesn't exist or is inaccessible
/// - The report cannot be written
///
/// # Examples
///
/// ```no_run
/// use codebrief::{Config, run};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::builder()
///     .root_dir(".")
///     .api_key("sk-...")
///     .build()?;
///
/// let output = run(config).await?;
/// println!("{}", output.report);
/// # Ok(())
/// # }
/// ```
pub async fn run(config: Config) -> Result<PipelineOutput> {
    Pipeline::new(config)?.run().await
}
