//! Top-level error type and its outward payload
//!
//! Internal errors are mapped to a small set of stable codes before they
//! leave the process, with secrets and sensitive paths scrubbed from the
//! message.

use crate::llm::provider::LlmError;
use crate::pipeline::{PipelineError, StepErrorKind};
use crate::validation::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAX_ERROR_MESSAGE_LEN: usize = 500;

static SECRET_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").ok());

static SENSITIVE_PATH_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+").ok()
});

/// Main error type for agent runs
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("LLM provider error: {0}")]
    Llm(#[from] LlmError),

    #[error("Unknown agent: {name}")]
    UnknownAgent { name: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Stable error codes exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidInput,
    UpstreamFailure,
    Timeout,
    Cancelled,
    UnknownAgent,
    InvalidRequest,
    ConfigurationError,
    InternalError,
}

/// Error as reported on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
}

impl AgentError {
    /// Convert to the sanitized payload returned by the server
    pub fn to_error_payload(&self) -> ErrorPayload {
        let (code, step, message) = match self {
            AgentError::Pipeline(PipelineError::StepFailed {
                failed_step, source, ..
            }) => {
                let code = match source.kind {
                    StepErrorKind::InvalidInput => ErrorCode::InvalidInput,
                    StepErrorKind::UpstreamFailure => ErrorCode::UpstreamFailure,
                    StepErrorKind::Timeout => ErrorCode::Timeout,
                };
                (code, Some(failed_step.clone()), source.message.clone())
            }
            AgentError::Pipeline(e @ PipelineError::Cancelled { .. }) => {
                (ErrorCode::Cancelled, None, e.to_string())
            }
            AgentError::Pipeline(e @ PipelineError::Aborted { .. }) => {
                (ErrorCode::InternalError, None, e.to_string())
            }
            AgentError::Validation(e) => (ErrorCode::InvalidInput, None, e.to_string()),
            AgentError::Config(e) => (ErrorCode::ConfigurationError, None, e.to_string()),
            AgentError::Llm(LlmError::Timeout(message)) => {
                (ErrorCode::Timeout, None, message.clone())
            }
            AgentError::Llm(e) => (ErrorCode::UpstreamFailure, None, e.to_string()),
            AgentError::UnknownAgent { name } => (
                ErrorCode::UnknownAgent,
                None,
                format!("No agent named '{name}'"),
            ),
            AgentError::InvalidRequest { message } => {
                (ErrorCode::InvalidRequest, None, message.clone())
            }
            AgentError::Internal { message } => (ErrorCode::InternalError, None, message.clone()),
        };

        ErrorPayload {
            code,
            message: sanitize_error_message(&message),
            step,
        }
    }

    pub fn unknown_agent<S: Into<String>>(name: S) -> Self {
        Self::UnknownAgent { name: name.into() }
    }

    pub fn invalid_request<S: Into<String>>(message: S) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Scrub secrets and sensitive paths, cap the length
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = message.to_string();

    if let Some(secrets) = SECRET_PATTERN.as_ref() {
        sanitized = secrets.replace_all(&sanitized, "${1}=***").to_string();
    }

    if let Some(paths) = SENSITIVE_PATH_PATTERN.as_ref() {
        sanitized = paths.replace_all(&sanitized, "/***REDACTED***/").to_string();
    }

    if sanitized.len() > MAX_ERROR_MESSAGE_LEN {
        let suffix = "...[truncated]";
        let mut cut = MAX_ERROR_MESSAGE_LEN - suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str(suffix);
    }

    sanitized
}

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;
