//! Agent step contract and the generic step implementations
//!
//! A step is a named unit of work: it reads a [`ContextView`], may emit
//! [`ProgressEvent`](super::ProgressEvent)s through the borrowed
//! [`EventSink`], and resolves to a JSON value that the runner merges into
//! the pipeline context under the step's output key.

use super::channel::EventSink;
use super::context::{ContextView, PipelineContext};
use super::runner::{run_steps, PipelineError};
use crate::llm::provider::LlmError;
use crate::tools::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Outcome of a single step invocation
pub type StepResult = Result<Value, StepError>;

/// Category of a step failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepErrorKind {
    InvalidInput,
    UpstreamFailure,
    Timeout,
}

impl fmt::Display for StepErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StepErrorKind::InvalidInput => "invalid input",
            StepErrorKind::UpstreamFailure => "upstream failure",
            StepErrorKind::Timeout => "timeout",
        };
        f.write_str(label)
    }
}

/// Error raised by a step during execution
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct StepError {
    pub kind: StepErrorKind,
    pub message: String,
}

impl StepError {
    pub fn new<S: Into<String>>(kind: StepErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::new(StepErrorKind::InvalidInput, message)
    }

    pub fn upstream_failure<S: Into<String>>(message: S) -> Self {
        Self::new(StepErrorKind::UpstreamFailure, message)
    }

    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::new(StepErrorKind::Timeout, message)
    }
}

impl From<LlmError> for StepError {
    fn from(error: LlmError) -> Self {
        match error {
            LlmError::Timeout(_) => StepError::timeout(error.to_string()),
            LlmError::InvalidRequest(_) => StepError::invalid_input(error.to_string()),
            _ => StepError::upstream_failure(error.to_string()),
        }
    }
}

impl From<ToolError> for StepError {
    fn from(error: ToolError) -> Self {
        match error {
            ToolError::Timeout(_) => StepError::timeout(error.to_string()),
            _ => StepError::upstream_failure(error.to_string()),
        }
    }
}

/// A named unit of work run by the pipeline runner
#[async_trait]
pub trait AgentStep: Send + Sync {
    /// Step name, used in errors, logs and metrics
    fn name(&self) -> &str;

    /// Context keys projected into the step's [`ContextView`]
    fn input_keys(&self) -> Vec<String>;

    /// Context key the step's output is stored under
    fn output_key(&self) -> &str;

    /// Execute the step. `emit` is only valid for the duration of this call.
    async fn run(&self, input: ContextView, emit: &EventSink) -> StepResult;
}

type TransformFn = dyn Fn(&ContextView) -> StepResult + Send + Sync;

/// Deterministic step backed by a plain function over its view
pub struct TransformStep {
    name: String,
    input_keys: Vec<String>,
    output_key: String,
    transform: Box<TransformFn>,
}

impl TransformStep {
    pub fn new<F>(
        name: impl Into<String>,
        input_keys: &[&str],
        output_key: impl Into<String>,
        transform: F,
    ) -> Self
    where
        F: Fn(&ContextView) -> StepResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            input_keys: input_keys.iter().map(|k| k.to_string()).collect(),
            output_key: output_key.into(),
            transform: Box::new(transform),
        }
    }
}

#[async_trait]
impl AgentStep for TransformStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_keys(&self) -> Vec<String> {
        self.input_keys.clone()
    }

    fn output_key(&self) -> &str {
        &self.output_key
    }

    async fn run(&self, input: ContextView, _emit: &EventSink) -> StepResult {
        (self.transform)(&input)
    }
}

/// Step composed of inner steps, run in order against a nested context.
///
/// The nested context is seeded from the crew's own view; the crew's output is
/// the last inner step's output. Inner events flow straight to the caller.
/// Cancellation is only honoured at the outer pipeline's step boundaries.
pub struct CrewStep {
    name: String,
    input_keys: Vec<String>,
    output_key: String,
    steps: Vec<Arc<dyn AgentStep>>,
}

impl CrewStep {
    pub fn new(name: impl Into<String>, input_keys: &[&str], output_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_keys: input_keys.iter().map(|k| k.to_string()).collect(),
            output_key: output_key.into(),
            steps: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: Arc<dyn AgentStep>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[Arc<dyn AgentStep>] {
        &self.steps
    }
}

#[async_trait]
impl AgentStep for CrewStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_keys(&self) -> Vec<String> {
        self.input_keys.clone()
    }

    fn output_key(&self) -> &str {
        &self.output_key
    }

    async fn run(&self, input: ContextView, emit: &EventSink) -> StepResult {
        let context = PipelineContext::from(input);
        match run_steps(&self.steps, context, emit, None, None).await {
            Ok(outcome) => Ok(outcome.output),
            Err(PipelineError::StepFailed {
                failed_step,
                source,
                ..
            }) => Err(StepError::new(
                source.kind,
                format!("{failed_step}: {}", source.message),
            )),
            Err(PipelineError::Cancelled { next_step }) => Err(StepError::upstream_failure(
                format!("crew cancelled before {next_step}"),
            )),
            Err(other @ PipelineError::Aborted { .. }) => {
                Err(StepError::upstream_failure(other.to_string()))
            }
        }
    }
}
