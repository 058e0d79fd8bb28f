//! Pipeline runner: sequential step execution with event forwarding
//!
//! The runner owns the [`PipelineContext`] for the whole run, projects a view
//! for each step, merges the step's output under its declared key and aborts
//! on the first failure. Progress events go straight into the run's
//! [`EventSink`] as they are emitted; nothing is buffered until the end.

use super::channel::{event_channel, EventSink, EventStream};
use super::context::PipelineContext;
use super::event::ProgressEvent;
use super::step::{AgentStep, StepError};
use crate::observability::metrics::metrics;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outward-facing error of a pipeline run
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("Step '{failed_step}' (#{index}) failed: {source}")]
    StepFailed {
        failed_step: String,
        index: usize,
        #[source]
        source: StepError,
    },

    #[error("Pipeline cancelled before step '{next_step}'")]
    Cancelled { next_step: String },

    #[error("Pipeline task aborted: {reason}")]
    Aborted { reason: String },
}

impl PipelineError {
    /// Name of the step that failed, if the run failed inside a step
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            PipelineError::StepFailed { failed_step, .. } => Some(failed_step),
            _ => None,
        }
    }

    /// Underlying step error, if any
    pub fn step_error(&self) -> Option<&StepError> {
        match self {
            PipelineError::StepFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Final output of a run plus the context it left behind
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub output: Value,
    pub context: PipelineContext,
}

/// Run `steps` in order against `context`.
///
/// Cancellation (token or consumer disconnect) is only checked when `cancel`
/// is provided, and only between steps.
pub(crate) async fn run_steps(
    steps: &[Arc<dyn AgentStep>],
    mut context: PipelineContext,
    sink: &EventSink,
    cancel: Option<&CancellationToken>,
    step_timeout: Option<Duration>,
) -> Result<RunOutcome, PipelineError> {
    let mut last_output = None;

    for (index, step) in steps.iter().enumerate() {
        if let Some(cancel) = cancel {
            if cancel.is_cancelled() || sink.is_closed() {
                info!(next_step = step.name(), "Pipeline cancelled at step boundary");
                return Err(PipelineError::Cancelled {
                    next_step: step.name().to_string(),
                });
            }
        }

        debug!(step = step.name(), index, "Running step");
        let started = Instant::now();

        let result = match context.view(&step.input_keys()) {
            Ok(view) => invoke_step(step.as_ref(), view, sink, step_timeout).await,
            Err(missing) => Err(StepError::invalid_input(format!(
                "missing context key '{missing}'"
            ))),
        };

        metrics().record_step(step.name(), started.elapsed(), result.is_ok());

        match result {
            Ok(value) => {
                debug!(
                    step = step.name(),
                    output_key = step.output_key(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Step completed"
                );
                context.insert(step.output_key(), value.clone());
                last_output = Some(value);
            }
            Err(source) => {
                warn!(step = step.name(), index, error = %source, "Step failed");
                return Err(PipelineError::StepFailed {
                    failed_step: step.name().to_string(),
                    index,
                    source,
                });
            }
        }
    }

    let output = last_output.unwrap_or_else(|| context.to_json());
    Ok(RunOutcome { output, context })
}

async fn invoke_step(
    step: &dyn AgentStep,
    view: super::context::ContextView,
    sink: &EventSink,
    step_timeout: Option<Duration>,
) -> Result<Value, StepError> {
    match step_timeout {
        Some(limit) => match tokio::time::timeout(limit, step.run(view, sink)).await {
            Ok(result) => result,
            Err(_) => Err(StepError::timeout(format!(
                "step '{}' exceeded {}ms",
                step.name(),
                limit.as_millis()
            ))),
        },
        None => step.run(view, sink).await,
    }
}

/// An ordered sequence of agent steps
pub struct Pipeline {
    name: String,
    steps: Vec<Arc<dyn AgentStep>>,
    step_timeout: Option<Duration>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            step_timeout: None,
        }
    }

    pub fn with_step(mut self, step: Arc<dyn AgentStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Bound every step invocation by `timeout`
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout
    }

    /// Run every step in order, forwarding events into `sink`.
    ///
    /// Returns the last step's output, or the initial context as a JSON
    /// object when the pipeline has no steps.
    #[tracing::instrument(name = "pipeline_run", skip_all, fields(pipeline = %self.name))]
    pub async fn execute(
        &self,
        initial: PipelineContext,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<Value, PipelineError> {
        info!(steps = self.steps.len(), "Starting pipeline");
        let outcome = run_steps(&self.steps, initial, sink, Some(cancel), self.step_timeout).await?;
        info!(keys = outcome.context.len(), "Pipeline completed");
        Ok(outcome.output)
    }

    /// Run the pipeline on its own task.
    ///
    /// The returned [`PipelineRun`] exposes the event stream immediately; the
    /// stream ends once the outcome is known.
    pub fn spawn(self: Arc<Self>, initial: PipelineContext) -> PipelineRun {
        let (sink, events) = event_channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let outcome = tokio::spawn(async move {
            let result = self.execute(initial, &sink, &token).await;
            drop(sink);
            result
        });

        PipelineRun {
            events,
            outcome,
            cancel,
        }
    }
}

/// Handle to a spawned pipeline run
pub struct PipelineRun {
    pub events: EventStream,
    pub outcome: JoinHandle<Result<Value, PipelineError>>,
    pub cancel: CancellationToken,
}

impl PipelineRun {
    /// Request cooperative cancellation at the next step boundary
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run to end, collecting every event it emitted
    pub async fn finish(self) -> (Vec<ProgressEvent>, Result<Value, PipelineError>) {
        let events = self.events.collect_remaining().await;
        let result = join_outcome(self.outcome).await;
        (events, result)
    }
}

/// Flatten a run's join handle into a pipeline result
pub async fn join_outcome(
    outcome: JoinHandle<Result<Value, PipelineError>>,
) -> Result<Value, PipelineError> {
    match outcome.await {
        Ok(result) => result,
        Err(e) => Err(PipelineError::Aborted {
            reason: e.to_string(),
        }),
    }
}
