use crate::compiler::{ChunkTiming, CompilationState};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for the codebrief library.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// Root path is missing or is not a directory.
    #[error("Directory not found: '{path}'")]
    DirectoryNotFound {
        /// Path that was requested
        path: PathBuf,
    },

    /// Invalid UTF-8 encountered in file.
    #[error("Invalid UTF-8 encoding in file '{path}'. File may be binary or use unsupported encoding.")]
    InvalidUtf8 {
        /// Path to file with encoding issues
        path: PathBuf,
    },

    /// Prompt template rendering error.
    #[error("Failed to render template '{template}': {message}")]
    Template {
        /// Template name
        template: String,
        /// Error message
        message: String,
    },

    /// JSON serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },

    /// No API key was configured for the text-generation service.
    #[error("API key not configured for text-generation service '{service}'")]
    MissingApiKey {
        /// Service name
        service: String,
    },

    /// Text-generation service answered with a non-success status.
    #[error("Text-generation service returned HTTP {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Transport or decoding failure while talking to the text-generation service.
    #[error("Text generation failed: {message}")]
    Generation {
        /// Error message
        message: String,
    },

    /// Text-generation service returned no usable text.
    #[error("Text-generation service returned an empty response")]
    EmptyResponse,

    /// A compilation state does not fit the document it is applied to.
    #[error("Invalid compilation state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// A chunk kept failing after all retries; `state` is the last good resumption point.
    #[error(
        "Compilation stalled at chunk {chunk_index} after {attempts} attempts: {message}"
    )]
    CompilationStalled {
        /// Index of the chunk that could not be folded
        chunk_index: usize,
        /// Number of attempts made for that chunk
        attempts: u32,
        /// Last underlying error message
        message: String,
        /// State after the last successfully folded chunk
        state: Box<CompilationState>,
        /// Retries performed across all chunks, including the failing one
        retries: u32,
        /// Timing of every chunk folded before the stall
        chunk_timings: Vec<ChunkTiming>,
    },

    /// System time error.
    #[error("System time error: {message}")]
    SystemTime {
        /// Error message
        message: String,
    },
}

impl Error {
    /// Creates an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a directory not found error.
    #[must_use]
    pub fn directory_not_found(path: impl Into<PathBuf>) -> Self {
        Self::DirectoryNotFound { path: path.into() }
    }

    /// Creates an invalid UTF-8 error.
    #[must_use]
    pub fn invalid_utf8(path: impl Into<PathBuf>) -> Self {
        Self::InvalidUtf8 { path: path.into() }
    }

    /// Creates a template error.
    #[must_use]
    pub fn template(template: impl Into<String>, source: &tera::Error) -> Self {
        // Tera hides the useful part of the message in the source chain.
        let mut message = source.to_string();
        let mut cause = std::error::Error::source(source);
        while let Some(inner) = cause {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            cause = std::error::Error::source(inner);
        }

        Self::Template {
            template: template.into(),
            message,
        }
    }

    /// Creates a generation (transport) error.
    #[must_use]
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    /// Creates an invalid state error.
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Returns true if this is an IO error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns true if retrying the same request may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Generation { .. } | Self::EmptyResponse => true,
            Self::Api { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Maps an HTTP status code and body returned by the text-generation service to an error.
#[must_use]
pub(crate) fn from_http_status(status: u16, body: &str) -> Error {
    let message = match status {
        401 => "invalid API key".to_string(),
        403 => "access denied".to_string(),
        404 => format!("model or endpoint not found: {body}"),
        429 => format!("rate limited: {body}"),
        _ => body.to_string(),
    };
    Error::Api { status, message }
}

// Conversion implementations for convenient error handling
impl From<std::time::SystemTimeError> for Error {
    fn from(e: std::time::SystemTimeError) -> Self {
        Self::SystemTime {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Generation {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("test message");
        assert!(err.is_config());
        assert!(err.to_string().contains("test message"));
    }

    #[test]
    fn test_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::io("/tmp/test.txt", io_err);
        assert!(err.is_io());
        assert!(err.to_string().contains("/tmp/test.txt"));
    }

    #[test]
    fn test_directory_not_found_message() {
        let err = Error::directory_not_found("/no/such/dir");
        assert!(matches!(err, Error::DirectoryNotFound { .. }));
        assert!(err.to_string().contains("/no/such/dir"));
    }

    #[test]
    fn test_http_status_mapping() {
        let err = from_http_status(401, "unauthorized");
        assert!(matches!(err, Error::Api { status: 401, .. }));
        assert!(!err.is_transient());

        let err = from_http_status(429, "slow down");
        assert!(err.is_transient());
        assert!(err.to_string().contains("rate limited"));

        let err = from_http_status(503, "unavailable");
        assert!(err.is_transient());

        assert!(!from_http_status(400, "bad request").is_transient());
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::generation("connection reset").is_transient());
        assert!(Error::EmptyResponse.is_transient());
        assert!(!Error::config("bad").is_transient());
        assert!(
            !Error::MissingApiKey {
                service: "openai".to_string()
            }
            .is_transient()
        );
    }

    #[test]
    fn test_compilation_stalled_keeps_state() {
        let state = CompilationState::seeded("demo");
        let err = Error::CompilationStalled {
            chunk_index: 2,
            attempts: 4,
            message: "boom".to_string(),
            state: Box::new(state.clone()),
            retries: 3,
            chunk_timings: Vec::new(),
        };

        assert!(err.to_string().contains("chunk 2"));
        if let Error::CompilationStalled { state: kept, .. } = err.clone() {
            assert_eq!(*kept, state);
        } else {
            panic!("expected CompilationStalled");
        }
    }

    #[test]
    fn test_template_error_keeps_template_name() {
        let source = tera::Tera::one_off("{{ missing }}", &tera::Context::new(), false)
            .unwrap_err();
        let err = Error::template("compile_chunk", &source);

        assert!(matches!(&err, Error::Template { template, .. } if template == "compile_chunk"));
        assert!(err.to_string().contains("compile_chunk"));
    }

    #[test]
    fn test_error_clone() {
        let err = Error::config("test");
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }

    #[test]
    fn test_serialization_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(err.to_string().contains("Serialization error"));
    }
}
