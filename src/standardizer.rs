use crate::config::{Config, ModelSettings};
use crate::error::Result;
use crate::generator::{GenerationRequest, TextGenerator};
use crate::prompts::{PromptEngine, STANDARDIZE_SYSTEM_PROMPT};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Text returned when the standardization call fails.
pub const STANDARDIZATION_FAILED: &str = "_We are sorry: the final report could not be \
    standardized. The compiled report is reproduced below unchanged._";

/// Output of [`Standardizer::standardize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardizedReport {
    /// Reformatted report, or the apology followed by the input report
    pub text: String,

    /// Time spent in the call
    pub elapsed: Duration,

    /// Whether the call failed and `text` is the fallback
    pub failed: bool,
}

/// Reformats a compiled report into the fixed section outline.
pub struct Standardizer {
    generator: Arc<dyn TextGenerator>,
    prompts: Arc<PromptEngine>,
    settings: ModelSettings,
    title: String,
}

impl Standardizer {
    /// Creates a standardizer with the settings and root label from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in prompt templates fail to load.
    pub fn from_config(generator: Arc<dyn TextGenerator>, config: &Config) -> Result<Self> {
        Ok(Self::new(
            generator,
            Arc::new(PromptEngine::new()?),
            config.standardization.clone(),
            &config.root_label(),
        ))
    }

    pub(crate) fn new(
        generator: Arc<dyn TextGenerator>,
        prompts: Arc<PromptEngine>,
        settings: ModelSettings,
        root_label: &str,
    ) -> Self {
        Self {
            generator,
            prompts,
            settings,
            title: format!("{root_label} Codebase Report"),
        }
    }

    /// Standardizes `report` with a single generation call.
    ///
    /// Best-effort: on any failure the result is an apology placeholder
    /// followed by the unmodified report, so nothing already compiled is lost.
    pub async fn standardize(&self, report: &str) -> StandardizedReport {
        let started = Instant::now();

        let outcome = match self.prompts.standardize(&self.title, report) {
            Ok(prompt) => {
                let request =
                    GenerationRequest::new(STANDARDIZE_SYSTEM_PROMPT, prompt, &self.settings);
                self.generator.generate(&request).await
            }
            Err(e) => Err(e),
        };

        let (text, failed) = match outcome {
            Ok(text) if !text.trim().is_empty() => (text, false),
            Ok(_) => {
                warn!("Standardization returned no text");
                (fallback(report), true)
            }
            Err(e) => {
                warn!("Standardization failed: {}", e);
                (fallback(report), true)
            }
        };

        let elapsed = started.elapsed();
        info!("Standardized report in {:.2}s", elapsed.as_secs_f64());

        StandardizedReport {
            text,
            elapsed,
            failed,
        }
    }
}

fn fallback(report: &str) -> String {
    format!("{STANDARDIZATION_FAILED}\n\n{report}")
}
