use crate::chunker;
use crate::compiler::RetryPolicy;
use crate::error::{Error, Result};
use crate::filter::{IgnoreConfig, IgnoreRules};
use crate::generator::DEFAULT_API_URL;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_COMPILE_CHUNK_SIZE: usize = 12_000;
const DEFAULT_FILE_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_MAX_FILE_SIZE: u64 = 512 * 1024;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const ANALYSIS_MAX_TOKENS: u32 = 1_024;
const COMPILATION_MAX_TOKENS: u32 = 4_096;
const STANDARDIZATION_MAX_TOKENS: u32 = 4_096;

const CHECKPOINT_SUFFIX: &str = ".checkpoint.json";
const PRELIMINARY_SUFFIX: &str = ".preliminary.md";

/// Model parameters for one kind of text-generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    /// Model identifier
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Upper bound on generated tokens
    pub max_tokens: u32,
}

impl ModelSettings {
    /// Creates settings for a model.
    #[must_use]
    pub fn new(model: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            temperature,
            max_tokens,
        }
    }

    fn validate(&self, stage: &str) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(Error::config(format!("{stage}: model must not be empty")));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::config(format!(
                "{stage}: temperature ({}) must be between 0 and 2",
                self.temperature
            )));
        }

        if self.max_tokens == 0 {
            return Err(Error::config(format!(
                "{stage}: max_tokens must be greater than 0"
            )));
        }

        Ok(())
    }
}

/// Configuration for the report pipeline.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Root directory to analyze
    pub root_dir: PathBuf,

    /// Report destination; `None` prints to stdout
    pub output_path: Option<PathBuf>,

    /// Directory names, suffixes and globs excluded from collection
    pub ignore: IgnoreConfig,

    /// Chat completions endpoint
    pub api_url: String,

    /// API key for the endpoint
    pub api_key: Option<String>,

    /// Timeout for a single HTTP request
    pub request_timeout: Duration,

    /// Model parameters for per-file analysis
    pub analysis: ModelSettings,

    /// Model parameters for compilation steps
    pub compilation: ModelSettings,

    /// Model parameters for the standardization call
    pub standardization: ModelSettings,

    /// Chunk size, in chars, used when compiling the preliminary document
    pub compile_chunk_size: usize,

    /// Overlap between compile chunks; `None` uses the chunker default.
    /// An overlap not smaller than the chunk size is clamped by the chunker.
    pub overlap: Option<usize>,

    /// Pause between consecutive file analyses
    pub file_delay: Duration,

    /// Files larger than this many bytes are skipped
    pub max_file_size: u64,

    /// Retry policy for compilation steps
    pub retry: RetryPolicy,

    /// Resume compilation from an existing checkpoint
    pub resume: bool,

    /// Write the preliminary document next to the report
    pub keep_intermediate: bool,

    /// Create backups of existing files
    pub backup_existing: bool,

    /// Explicit checkpoint location
    pub checkpoint_path: Option<PathBuf>,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use codebrief::Config;
    ///
    /// let config = Config::builder()
    ///     .root_dir("./src")
    ///     .compile_chunk_size(8_000)
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// The root directory is not checked here; a missing root is reported by
    /// the collector when the pipeline runs.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Chunk size is zero
    /// - Model settings are out of range
    /// - Retry policy is invalid
    /// - An exclude glob does not parse
    pub fn validate(&self) -> Result<()> {
        if self.compile_chunk_size == 0 {
            return Err(Error::config("compile_chunk_size must be greater than 0"));
        }

        if self.max_file_size == 0 {
            return Err(Error::config("max_file_size must be greater than 0"));
        }

        if self.api_url.trim().is_empty() {
            return Err(Error::config("api_url must not be empty"));
        }

        self.analysis.validate("analysis")?;
        self.compilation.validate("compilation")?;
        self.standardization.validate("standardization")?;
        self.retry.validate()?;

        IgnoreRules::new(&self.ignore)?;

        if self.resume && self.checkpoint_file().is_none() {
            return Err(Error::config(
                "resume requires an output path or an explicit checkpoint path",
            ));
        }

        Ok(())
    }

    /// Returns the label naming the analyzed directory in reports.
    #[must_use]
    pub fn root_label(&self) -> String {
        let canonical = self.root_dir.canonicalize().ok();
        let path = canonical.as_deref().unwrap_or(&self.root_dir);

        path.file_name().map_or_else(
            || path.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        )
    }

    /// Returns where the compilation checkpoint is stored, if anywhere.
    ///
    /// Defaults to `<output>.checkpoint.json` when an output path is set.
    #[must_use]
    pub fn checkpoint_file(&self) -> Option<PathBuf> {
        self.checkpoint_path
            .clone()
            .or_else(|| self.output_path.as_deref().map(|p| with_suffix(p, CHECKPOINT_SUFFIX)))
    }

    /// Overlap between compile chunks after clamping, in chars.
    #[must_use]
    pub fn effective_overlap(&self) -> usize {
        chunker::effective_overlap(self.compile_chunk_size, self.overlap)
    }

    /// Returns where the preliminary document is written, if requested.
    #[must_use]
    pub fn preliminary_file(&self) -> Option<PathBuf> {
        if !self.keep_intermediate {
            return None;
        }
        self.output_path
            .as_deref()
            .map(|p| with_suffix(p, PRELIMINARY_SUFFIX))
    }
}

/// Appends `suffix` to the full file name of `path`.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            output_path: None,
            ignore: IgnoreConfig::default(),
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            analysis: ModelSettings::new(DEFAULT_MODEL, DEFAULT_TEMPERATURE, ANALYSIS_MAX_TOKENS),
            compilation: ModelSettings::new(
                DEFAULT_MODEL,
                DEFAULT_TEMPERATURE,
                COMPILATION_MAX_TOKENS,
            ),
            standardization: ModelSettings::new(
                DEFAULT_MODEL,
                DEFAULT_TEMPERATURE,
                STANDARDIZATION_MAX_TOKENS,
            ),
            compile_chunk_size: DEFAULT_COMPILE_CHUNK_SIZE,
            overlap: None,
            file_delay: DEFAULT_FILE_DELAY,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            retry: RetryPolicy::default(),
            resume: false,
            keep_intermediate: false,
            backup_existing: true,
            checkpoint_path: None,
        }
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    root_dir: Option<PathBuf>,
    output_path: Option<PathBuf>,
    ignore: Option<IgnoreConfig>,
    api_url: Option<String>,
    api_key: Option<String>,
    request_timeout: Option<Duration>,
    model: Option<String>,
    temperature: Option<f32>,
    compile_chunk_size: Option<usize>,
    overlap: Option<usize>,
    file_delay: Option<Duration>,
    max_file_size: Option<u64>,
    retry: Option<RetryPolicy>,
    resume: bool,
    keep_intermediate: bool,
    backup_existing: Option<bool>,
    checkpoint_path: Option<PathBuf>,
}

impl ConfigBuilder {
    /// Sets the root directory to analyze.
    #[must_use]
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(path.into());
        self
    }

    /// Sets the report file. Without one the report goes to stdout.
    #[must_use]
    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Sets the ignore rules used during collection.
    #[must_use]
    pub fn ignore(mut self, ignore: IgnoreConfig) -> Self {
        self.ignore = Some(ignore);
        self
    }

    /// Sets the chat completions endpoint.
    #[must_use]
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the HTTP request timeout.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the model used by every stage.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the sampling temperature used by every stage.
    #[must_use]
    pub const fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the compile chunk size in chars.
    #[must_use]
    pub const fn compile_chunk_size(mut self, size: usize) -> Self {
        self.compile_chunk_size = Some(size);
        self
    }

    /// Sets the overlap between compile chunks in chars.
    #[must_use]
    pub const fn overlap(mut self, overlap: usize) -> Self {
        self.overlap = Some(overlap);
        self
    }

    /// Sets the pause between file analyses.
    #[must_use]
    pub const fn file_delay(mut self, delay: Duration) -> Self {
        self.file_delay = Some(delay);
        self
    }

    /// Sets the maximum size of an analyzed file in bytes.
    #[must_use]
    pub const fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    /// Sets the compilation retry policy.
    #[must_use]
    pub const fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Enables resuming from a checkpoint.
    #[must_use]
    pub const fn resume(mut self, enabled: bool) -> Self {
        self.resume = enabled;
        self
    }

    /// Enables writing the preliminary document.
    #[must_use]
    pub const fn keep_intermediate(mut self, enabled: bool) -> Self {
        self.keep_intermediate = enabled;
        self
    }

    /// Enables or disables backup creation.
    #[must_use]
    pub const fn backup_existing(mut self, enabled: bool) -> Self {
        self.backup_existing = Some(enabled);
        self
    }

    /// Sets an explicit checkpoint path.
    #[must_use]
    pub fn checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_path = Some(path.into());
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let defaults = Config::default();

        let stage = |base: ModelSettings| ModelSettings {
            model: self.model.clone().unwrap_or(base.model),
            temperature: self.temperature.unwrap_or(base.temperature),
            max_tokens: base.max_tokens,
        };

        let config = Config {
            root_dir: self.root_dir.clone().unwrap_or(defaults.root_dir),
            output_path: self.output_path.clone(),
            ignore: self.ignore.clone().unwrap_or(defaults.ignore),
            api_url: self.api_url.clone().unwrap_or(defaults.api_url),
            api_key: self.api_key.clone(),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            analysis: stage(defaults.analysis),
            compilation: stage(defaults.compilation),
            standardization: stage(defaults.standardization),
            compile_chunk_size: self
                .compile_chunk_size
                .unwrap_or(defaults.compile_chunk_size),
            overlap: self.overlap,
            file_delay: self.file_delay.unwrap_or(defaults.file_delay),
            max_file_size: self.max_file_size.unwrap_or(defaults.max_file_size),
            retry: self.retry.clone().unwrap_or(defaults.retry),
            resume: self.resume,
            keep_intermediate: self.keep_intermediate,
            backup_existing: self.backup_existing.unwrap_or(defaults.backup_existing),
            checkpoint_path: self.checkpoint_path.clone(),
        };

        config.validate()?;
        Ok(config)
    }
}
