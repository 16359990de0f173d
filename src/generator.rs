//! Text-generation service client.
//!
//! The pipeline talks to the service only through [`TextGenerator`], so any
//! backend (or a scripted fake in tests) can be plugged in.

use crate::config::{Config, ModelSettings};
use crate::error::{Error, Result, from_http_status};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

/// Default OpenAI-compatible chat completions endpoint.
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// One call to the text-generation service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    /// Fixed instruction for the model
    pub system_prompt: String,
    /// Per-call prompt
    pub user_prompt: String,
    /// Model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
}

impl GenerationRequest {
    /// Creates a request from prompts and model settings.
    #[must_use]
    pub fn new(
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
        settings: &ModelSettings,
    ) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }
}

/// A black-box text-generation service.
///
/// Implementations must not retry internally; callers own the retry policy.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the service name for logging.
    fn name(&self) -> &str;

    /// Generates text for the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the service is unreachable, rejects the request or
    /// answers without text.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for OpenAI-compatible chat completions endpoints.
pub struct OpenAiGenerator {
    api_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiGenerator {
    /// Creates a client for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        api_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_url: api_url.into(),
            api_key,
            client,
        })
    }

    /// Creates a client from the endpoint, key and timeout in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.api_url.clone(),
            config.api_key.clone(),
            config.request_timeout,
        )
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| Error::MissingApiKey {
            service: self.name().to_string(),
        })?;

        let body = ChatRequest {
            model: &request.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(
            model = %request.model,
            prompt_chars = request.user_prompt.len(),
            "Sending generation request"
        );

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body_text = response.text().await?;

        if !(200..300).contains(&status) {
            return Err(from_http_status(status, &body_text));
        }

        trace!("Generation response: {} bytes", body_text.len());

        let parsed: ChatResponse = serde_json::from_str(&body_text)
            .map_err(|e| Error::generation(format!("Failed to parse response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(Error::EmptyResponse)
    }
}

/// Scripted generator for tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::{GenerationRequest, TextGenerator};
    use crate::error::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    type Responder = dyn Fn(&GenerationRequest, usize) -> Result<String> + Send + Sync;

    /// Answers each call with a function of the request and the 0-based call number.
    pub(crate) struct ScriptedGenerator {
        responder: Box<Responder>,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedGenerator {
        pub(crate) fn new(
            responder: impl Fn(&GenerationRequest, usize) -> Result<String> + Send + Sync + 'static,
        ) -> Self {
            Self {
                responder: Box::new(responder),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Always answers with the same text.
        pub(crate) fn constant(text: &str) -> Self {
            let text = text.to_string();
            Self::new(move |_, _| Ok(text.clone()))
        }

        pub(crate) fn requests(&self) -> Vec<GenerationRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub(crate) fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, request: &GenerationRequest) -> Result<String> {
            let call = {
                let mut requests = self.requests.lock().unwrap();
                requests.push(request.clone());
                requests.len() - 1
            };
            (self.responder)(request, call)
        }
    }
}
