//! Error types for persona-forge operations.
//!
//! Defines error types for the subsystems shared across modules:
//! - LLM API interactions
//! - Prompt template rendering and loading
//! - Batch submission validation
//! - Persona edit recording
//!
//! Stage- and task-level failures live next to the pipeline code in
//! [`crate::pipeline::retry`] and [`crate::pipeline::runner`].

use thiserror::Error;

use crate::storage::StorageError;

/// Errors that can occur during LLM operations.
///
/// Every variant is treated as transient by the retry stage: the attempt is
/// counted against the stage budget and the next attempt is made.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: OPENAI_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("LLM response contained no content")]
    EmptyResponse,

    #[error("LLM request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Completion client unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur while loading or rendering prompt templates.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template '{template}' is missing required parameter '{parameter}'")]
    MissingParameter { template: String, parameter: String },

    #[error("Failed to render template '{template}': {source}")]
    Render {
        template: String,
        #[source]
        source: tera::Error,
    },

    #[error("Failed to parse prompt file '{path}': {message}")]
    ParseError { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors that reject a batch submission before any task is scheduled.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("At least one non-blank attribute is required")]
    NoAttributes,
}

/// Errors that can occur while recording a persona edit.
#[derive(Debug, Error)]
pub enum PersonaEditError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::ApiError {
            code: 503,
            message: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "API error (503): overloaded");

        let err = LlmError::Timeout { seconds: 30 };
        assert!(err.to_string().contains("30 seconds"));
    }

    #[test]
    fn test_template_error_display() {
        let err = TemplateError::MissingParameter {
            template: "persona".to_string(),
            parameter: "attribute".to_string(),
        };
        assert!(err.to_string().contains("persona"));
        assert!(err.to_string().contains("attribute"));
    }

    #[test]
    fn test_submission_error_display() {
        assert_eq!(
            SubmissionError::MissingField("scenario").to_string(),
            "Missing required field: scenario"
        );
        assert!(SubmissionError::NoAttributes
            .to_string()
            .contains("non-blank attribute"));
    }
}
