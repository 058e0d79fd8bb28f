//! Agent pipeline orchestration
//!
//! A pipeline is an ordered list of [`AgentStep`]s. The runner threads a
//! [`PipelineContext`] through the steps and relays their [`ProgressEvent`]s
//! to the caller through a per-run event channel.

pub mod channel;
pub mod context;
pub mod event;
pub mod runner;
pub mod step;

pub use channel::{event_channel, EventSink, EventStream};
pub use context::{ContextView, PipelineContext};
pub use event::ProgressEvent;
pub use runner::{join_outcome, Pipeline, PipelineError, PipelineRun, RunOutcome};
pub use step::{AgentStep, CrewStep, StepError, StepErrorKind, StepResult, TransformStep};
