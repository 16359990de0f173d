//! # Quick Start API
//!
//! High-level, ergonomic API for common use cases.
//!
//! ## Examples
//!
//! ```no_run
//! use codebrief::api::Report;
//!
//! # async fn run() -> codebrief::Result<()> {
//! // Analyze the current directory and print the report
//! let output = Report::current_dir().api_key("sk-...").run().await?;
//! println!("{}", output.report);
//!
//! // Analyze a project and write the report to disk
//! Report::dir("./project")
//!     .api_key("sk-...")
//!     .model("gpt-4o")
//!     .output("./project-report.md")
//!     .max_retries(5)
//!     .run()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::compiler::RetryPolicy;
use crate::filter::IgnoreConfig;
use crate::generator::TextGenerator;
use crate::{Config, Pipeline, PipelineOutput, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Entry point for the quick start API.
///
/// Builds a [`Config`] with a fluent interface and runs the [`Pipeline`].
#[derive(Clone)]
#[must_use = "call .run() to generate the report"]
pub struct Report {
    dir: PathBuf,
    output: Option<PathBuf>,
    api_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    chunk_size: Option<usize>,
    overlap: Option<usize>,
    delay: Option<Duration>,
    max_retries: Option<u32>,
    ignore: IgnoreConfig,
    resume: bool,
    keep_intermediate: bool,
    generator: Option<Arc<dyn TextGenerator>>,
}

impl Default for Report {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            output: None,
            api_url: None,
            api_key: None,
            model: None,
            temperature: None,
            chunk_size: None,
            overlap: None,
            delay: None,
            max_retries: None,
            ignore: IgnoreConfig::default(),
            resume: false,
            keep_intermediate: false,
            generator: None,
        }
    }
}

impl Report {
    /// Report on the current directory.
    pub fn current_dir() -> Self {
        Self::default()
    }

    /// Report on the specified directory.
    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Self {
            dir: path.into(),
            ..Self::default()
        }
    }

    /// Write the report to a file instead of returning it only.
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Set the chat completions endpoint.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Set the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the model used for every call.
    ///
    /// Default: `gpt-4o-mini`
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the sampling temperature.
    ///
    /// Default: `0.2`
    pub const fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the compile chunk size in characters.
    ///
    /// Default: `12_000`
    pub const fn chunk_size(mut self, chars: usize) -> Self {
        self.chunk_size = Some(chars);
        self
    }

    /// Set the overlap between compile chunks in characters.
    pub const fn overlap(mut self, chars: usize) -> Self {
        self.overlap = Some(chars);
        self
    }

    /// Set the pause between file analyses.
    ///
    /// Default: 500 ms
    pub const fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Set how many times a failing compile chunk is retried.
    ///
    /// Default: `3`
    pub const fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Add glob patterns to exclude from collection.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use codebrief::api::Report;
    ///
    /// let report = Report::dir("./project").exclude(["docs/**", "**/*.snap"]);
    /// ```
    pub fn exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore = self
            .ignore
            .exclude_globs(patterns.into_iter().map(Into::into).collect());
        self
    }

    /// Honour `.gitignore` files while collecting.
    pub fn respect_gitignore(mut self) -> Self {
        self.ignore = self.ignore.respect_gitignore(true);
        self
    }

    /// Resume compilation from the checkpoint next to the output file.
    pub const fn resume(mut self) -> Self {
        self.resume = true;
        self
    }

    /// Also write the preliminary document next to the output file.
    pub const fn keep_intermediate(mut self) -> Self {
        self.keep_intermediate = true;
        self
    }

    /// Use a custom text-generation backend instead of the HTTP client.
    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Run the pipeline and return its output.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the directory does
    /// not exist, or the report cannot be written.
    pub async fn run(self) -> Result<PipelineOutput> {
        let generator = self.generator.clone();
        let config = self.build_config()?;

        let pipeline = match generator {
            Some(generator) => Pipeline::with_generator(config, generator)?,
            None => Pipeline::new(config)?,
        };

        pipeline.run().await
    }

    fn build_config(self) -> Result<Config> {
        let mut builder = Config::builder()
            .root_dir(self.dir)
            .ignore(self.ignore)
            .resume(self.resume)
            .keep_intermediate(self.keep_intermediate);

        if let Some(output) = self.output {
            builder = builder.output_path(output);
        }
        if let Some(url) = self.api_url {
            builder = builder.api_url(url);
        }
        if let Some(key) = self.api_key {
            builder = builder.api_key(key);
        }
        if let Some(model) = self.model {
            builder = builder.model(model);
        }
        if let Some(temperature) = self.temperature {
            builder = builder.temperature(temperature);
        }
        if let Some(size) = self.chunk_size {
            builder = builder.compile_chunk_size(size);
        }
        if let Some(overlap) = self.overlap {
            builder = builder.overlap(overlap);
        }
        if let Some(delay) = self.delay {
            builder = builder.file_delay(delay);
        }
        if let Some(retries) = self.max_retries {
            builder = builder.retry(RetryPolicy::with_max_retries(retries));
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::testing::ScriptedGenerator;
    use assert_fs::prelude::*;

    #[test]
    fn report_builder_has_sensible_defaults() {
        let report = Report::current_dir();
        assert_eq!(report.dir, PathBuf::from("."));
        assert!(report.output.is_none());

        let config = report.build_config().unwrap();
        assert_eq!(config.compilation.model, "gpt-4o-mini");
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn report_builder_is_fluent() {
        let config = Report::dir("./project")
            .output("./project-report.md")
            .model("gpt-4o")
            .temperature(0.5)
            .chunk_size(4_000)
            .overlap(100)
            .max_retries(7)
            .resume()
            .build_config()
            .unwrap();

        assert_eq!(config.root_dir, PathBuf::from("./project"));
        assert_eq!(config.output_path, Some(PathBuf::from("./project-report.md")));
        assert_eq!(config.analysis.model, "gpt-4o");
        assert_eq!(config.compile_chunk_size, 4_000);
        assert_eq!(config.overlap, Some(100));
        assert_eq!(config.retry.max_retries, 7);
        assert!(config.resume);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(Report::current_dir().chunk_size(0).build_config().is_err());
        assert!(Report::current_dir().exclude(["["]).build_config().is_err());
    }

    #[tokio::test]
    async fn run_with_custom_generator() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("main.rs").write_str("fn main() {}").unwrap();

        let generator = Arc::new(ScriptedGenerator::constant("# Codebase Report\n\nAll good."));
        let output = Report::dir(temp.path())
            .delay(Duration::ZERO)
            .generator(generator.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(output.analyses.len(), 1);
        assert_eq!(output.report, "# Codebase Report\n\nAll good.");
        assert_eq!(generator.call_count(), 3);
    }
}
