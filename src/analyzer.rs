use crate::config::{Config, ModelSettings};
use crate::error::Result;
use crate::file::{SourceUnit, UnitAnalysis};
use crate::generator::{GenerationRequest, TextGenerator};
use crate::prompts::{ANALYSIS_SYSTEM_PROMPT, PromptEngine};
use std::sync::Arc;
use tracing::{debug, warn};

/// Turns one source file into a [`UnitAnalysis`] with a single generation call.
pub struct UnitAnalyzer {
    generator: Arc<dyn TextGenerator>,
    prompts: Arc<PromptEngine>,
    settings: ModelSettings,
    root_label: String,
}

impl UnitAnalyzer {
    /// Creates an analyzer with the analysis settings and root label from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in prompt templates fail to load.
    pub fn from_config(generator: Arc<dyn TextGenerator>, config: &Config) -> Result<Self> {
        Ok(Self::new(
            generator,
            Arc::new(PromptEngine::new()?),
            config.analysis.clone(),
            config.root_label(),
        ))
    }

    pub(crate) fn new(
        generator: Arc<dyn TextGenerator>,
        prompts: Arc<PromptEngine>,
        settings: ModelSettings,
        root_label: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            prompts,
            settings,
            root_label: root_label.into(),
        }
    }

    /// Analyzes a unit.
    ///
    /// Never fails: any error is turned into a placeholder analysis that keeps
    /// the unit's path. There is no retry at this level.
    pub async fn analyze(&self, unit: &SourceUnit) -> UnitAnalysis {
        let prompt = match self.prompts.analyze_file(&self.root_label, unit) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!("Failed to build analysis prompt for {}: {}", unit.path, e);
                return UnitAnalysis::placeholder(&unit.path, e);
            }
        };

        let request = GenerationRequest::new(ANALYSIS_SYSTEM_PROMPT, prompt, &self.settings);

        match self.generator.generate(&request).await {
            Ok(text) if !text.trim().is_empty() => {
                debug!("Analyzed {} ({} chars)", unit.path, text.len());
                UnitAnalysis::new(&unit.path, text.trim())
            }
            Ok(_) => {
                warn!("Empty analysis for {}", unit.path);
                UnitAnalysis::placeholder(&unit.path, "the service returned no text")
            }
            Err(e) => {
                warn!("Analysis failed for {}: {}", unit.path, e);
                UnitAnalysis::placeholder(&unit.path, e)
            }
        }
    }
}
