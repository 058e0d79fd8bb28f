//! The agents served by songcrew
//!
//! An [`Agent`] turns incoming messages into an initial pipeline context (or
//! rejects them with a user-facing reply), owns the pipeline that does the
//! work, and renders the pipeline's output back into messages.
//! [`AgentRun`] drives one invocation end to end and keeps the run metrics.

pub mod evaluator;
pub mod report;
pub mod song_writer;

use crate::config::ServiceConfig;
use crate::error::AgentError;
use crate::llm::provider::LlmProvider;
use crate::observability::metrics::metrics;
use crate::pipeline::{
    join_outcome, EventStream, Pipeline, PipelineContext, PipelineError, ProgressEvent,
};
use crate::protocol::{AgentManifest, Message};
use crate::tools::PageFetcher;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{info, warn};
use uuid::Uuid;

pub use evaluator::{ArtistRepertoireAgent, EvaluateStep, SongEvaluation};
pub use report::{render_report, MarkdownReportAgent};
pub use song_writer::{ResearchStep, SongWriterAgent, WriteSongStep};

/// Outcome of preparing an agent's input
#[derive(Debug, Clone, PartialEq)]
pub enum Prepared {
    /// Input accepted; run the pipeline from this context
    Run(PipelineContext),
    /// Input rejected; answer with these messages and run nothing
    Reply(Vec<Message>),
}

/// A named pipeline exposed by the server
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn manifest(&self) -> AgentManifest;

    /// Validate the conversation and build the initial context
    fn prepare(&self, input: &[Message]) -> Prepared;

    fn pipeline(&self) -> Arc<Pipeline>;

    /// Turn the pipeline's final output into reply messages
    fn render_output(&self, output: &Value) -> Vec<Message>;
}

/// Agents by name
#[derive(Default, Clone)]
pub struct AgentRegistry {
    agents: BTreeMap<String, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The three songcrew agents wired to shared collaborators
    pub fn standard(
        config: &ServiceConfig,
        provider: Arc<dyn LlmProvider>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        let settings = config.model_settings();
        let step_timeout = config.step_timeout();

        let mut registry = Self::new();
        registry.register(Arc::new(SongWriterAgent::new(
            provider.clone(),
            fetcher,
            settings.clone(),
            step_timeout,
        )));
        registry.register(Arc::new(ArtistRepertoireAgent::new(
            provider,
            settings,
            config.evaluation.persist_path.clone(),
            step_timeout,
        )));
        registry.register(Arc::new(MarkdownReportAgent::new(step_timeout)));
        registry
    }

    /// Add an agent, replacing any agent with the same name
    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        self.agents.insert(agent.name().to_string(), agent);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.agents.keys().map(String::as_str).collect()
    }

    pub fn manifests(&self) -> Vec<AgentManifest> {
        self.agents.values().map(|agent| agent.manifest()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// A started run's slot in the in-flight gauge.
///
/// Dropped without [`InFlight::settle`], the run is counted as cancelled.
struct InFlight {
    started: Instant,
    settled: bool,
}

impl InFlight {
    fn begin(started: Instant) -> Self {
        metrics().run_started();
        Self {
            started,
            settled: false,
        }
    }

    /// Hand the final accounting to the caller
    fn settle(mut self) -> Duration {
        self.settled = true;
        self.started.elapsed()
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.settled {
            metrics().run_cancelled(self.started.elapsed());
            info!("Run dropped before finishing");
        }
    }
}

enum RunState {
    Rejected(Vec<Message>),
    Running {
        events: EventStream,
        outcome: JoinHandle<Result<Value, PipelineError>>,
        guard: DropGuard,
        in_flight: InFlight,
    },
}

/// One invocation of an agent.
///
/// Dropping an unfinished run, or the future returned by
/// [`AgentRun::finish`], cancels its pipeline at the next step boundary and
/// counts the run as cancelled.
pub struct AgentRun {
    pub run_id: Uuid,
    agent: Arc<dyn Agent>,
    state: RunState,
}

impl AgentRun {
    /// Validate `input` and, if accepted, spawn the agent's pipeline
    pub fn start(agent: Arc<dyn Agent>, input: &[Message]) -> Self {
        let run_id = Uuid::new_v4();

        let state = match agent.prepare(input) {
            Prepared::Reply(reply) => {
                info!(%run_id, agent = agent.name(), "Input rejected, replying without a run");
                metrics().run_rejected();
                RunState::Rejected(reply)
            }
            Prepared::Run(context) => {
                info!(%run_id, agent = agent.name(), "Starting run");
                let in_flight = InFlight::begin(Instant::now());
                let run = agent.pipeline().spawn(context);
                RunState::Running {
                    events: run.events,
                    outcome: run.outcome,
                    guard: run.cancel.drop_guard(),
                    in_flight,
                }
            }
        };

        Self {
            run_id,
            agent,
            state,
        }
    }

    pub fn agent_name(&self) -> &str {
        self.agent.name()
    }

    /// Whether the input was rejected before any step ran
    pub fn is_rejected(&self) -> bool {
        matches!(self.state, RunState::Rejected(_))
    }

    /// Next progress event; `None` once the pipeline has finished emitting
    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        match &mut self.state {
            RunState::Rejected(_) => None,
            RunState::Running { events, .. } => events.recv().await,
        }
    }

    /// Wait for the outcome, returning any events not yet consumed
    #[tracing::instrument(name = "agent_run", skip_all, fields(run_id = %self.run_id, agent = %self.agent.name()))]
    pub async fn finish(self) -> (Vec<ProgressEvent>, Result<Vec<Message>, AgentError>) {
        let (events, outcome, guard, in_flight) = match self.state {
            RunState::Rejected(reply) => return (Vec::new(), Ok(reply)),
            RunState::Running {
                events,
                outcome,
                guard,
                in_flight,
            } => (events, outcome, guard, in_flight),
        };

        let remaining = events.collect_remaining().await;
        let result = join_outcome(outcome).await;
        let _token: CancellationToken = guard.disarm();
        let elapsed = in_flight.settle();

        let result = match result {
            Ok(output) => {
                metrics().run_completed(elapsed);
                info!(elapsed_ms = elapsed.as_millis() as u64, "Run completed");
                Ok(self.agent.render_output(&output))
            }
            Err(error @ PipelineError::Cancelled { .. }) => {
                metrics().run_cancelled(elapsed);
                info!(%error, "Run cancelled");
                Err(AgentError::from(error))
            }
            Err(error) => {
                metrics().run_failed(elapsed);
                warn!(%error, "Run failed");
                Err(AgentError::from(error))
            }
        };

        (remaining, result)
    }

    /// Run to completion, collecting every event
    pub async fn run(
        agent: Arc<dyn Agent>,
        input: &[Message],
    ) -> (Vec<ProgressEvent>, Result<Vec<Message>, AgentError>) {
        Self::start(agent, input).finish().await
    }
}

/// Render a JSON output as a single plain-text message
pub(crate) fn text_output(output: &Value) -> Vec<Message> {
    let text = match output {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    vec![Message::user_text(text)]
}

/// Content of the last message's first part, if any
pub(crate) fn last_first_content(input: &[Message]) -> Option<&Value> {
    input.last().and_then(Message::first_content)
}
