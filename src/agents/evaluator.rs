//! A&R evaluation agent
//!
//! Scores a song for commercial potential and artistic merit. The model is
//! held to the JSON schema of [`SongEvaluation`], and each evaluation can
//! optionally be written to a markdown file.

use super::{last_first_content, Agent, Prepared};
use crate::llm::provider::{LlmProvider, ModelSettings};
use crate::llm::structured::complete_structured;
use crate::pipeline::{
    AgentStep, ContextView, EventSink, Pipeline, PipelineContext, ProgressEvent, StepError,
    StepResult,
};
use crate::protocol::{AgentManifest, Capability, Message, MessagePart};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const AGENT_NAME: &str = "artist_repertoire_agent";

const SCHEMA_NAME: &str = "song_evaluation";

const EVALUATOR_PROMPT: &str = "You are an A&R representative for a major record label. \
You evaluate the commercial potential and artistic merit of songs.

For the song you are given, report:
1. Hit potential score (1-10): how likely is it to succeed commercially?
2. Target audience: who would stream or buy it?
3. Strengths: what works well (hooks, lyrics, production)?
4. Concerns: what might limit its success?
5. Market comparison: which successful artists or songs does it recall?
6. Recommendation: sign, pass, or needs work?

Keep the feedback concise and industry-focused.";

/// Structured A&R feedback for one song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SongEvaluation {
    /// How likely the song is to succeed commercially
    #[schemars(range(min = 1, max = 10))]
    pub hit_potential_score: u8,
    /// Who would stream or buy this song
    pub target_audience: String,
    /// What works well: hooks, lyrics, production
    pub strengths: String,
    /// What might limit its success
    pub concerns: String,
    /// Successful artists or songs it is reminiscent of
    pub market_comparison: String,
    /// "Sign", "Pass" or "Needs work"
    pub recommendation: String,
}

/// Markdown document written when persistence is enabled (pure function)
pub fn evaluation_markdown(evaluation: &SongEvaluation) -> Result<String, serde_json::Error> {
    let pretty = serde_json::to_string_pretty(evaluation)?;
    Ok(format!("## Song Evaluation\n\n```json\n{pretty}\n```\n"))
}

async fn persist_evaluation(path: &Path, evaluation: &SongEvaluation) -> std::io::Result<()> {
    let document = evaluation_markdown(evaluation)?;
    tokio::fs::write(path, document).await
}

/// Asks the model for a schema-constrained evaluation of `song`
pub struct EvaluateStep {
    provider: Arc<dyn LlmProvider>,
    settings: ModelSettings,
    persist_path: Option<PathBuf>,
}

impl EvaluateStep {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        settings: ModelSettings,
        persist_path: Option<PathBuf>,
    ) -> Self {
        Self {
            provider,
            settings,
            persist_path,
        }
    }
}

#[async_trait]
impl AgentStep for EvaluateStep {
    fn name(&self) -> &str {
        "evaluate"
    }

    fn input_keys(&self) -> Vec<String> {
        vec!["song".to_string()]
    }

    fn output_key(&self) -> &str {
        "evaluation"
    }

    async fn run(&self, input: ContextView, emit: &EventSink) -> StepResult {
        let song = input.get_str("song").unwrap_or_default();

        emit.emit(ProgressEvent::thought(
            "Evaluating commercial potential and artistic merit",
        ));
        let evaluation: SongEvaluation = complete_structured(
            self.provider.as_ref(),
            &self.settings,
            EVALUATOR_PROMPT,
            song,
            SCHEMA_NAME,
        )
        .await?;
        debug!(
            score = evaluation.hit_potential_score,
            recommendation = %evaluation.recommendation,
            "Song evaluated"
        );

        if let Some(path) = &self.persist_path {
            if let Err(e) = persist_evaluation(path, &evaluation).await {
                warn!(path = %path.display(), error = %e, "Failed to persist evaluation");
            }
        }

        emit.emit(ProgressEvent::finished(format!(
            "Hit potential {}/10: {}",
            evaluation.hit_potential_score, evaluation.recommendation
        )));
        serde_json::to_value(&evaluation)
            .map_err(|e| StepError::upstream_failure(format!("Unserializable evaluation: {e}")))
    }
}

/// Evaluates songs for commercial potential and artistic merit
pub struct ArtistRepertoireAgent {
    pipeline: Arc<Pipeline>,
}

impl ArtistRepertoireAgent {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        settings: ModelSettings,
        persist_path: Option<PathBuf>,
        step_timeout: Option<Duration>,
    ) -> Self {
        let mut pipeline = Pipeline::new(AGENT_NAME).with_step(Arc::new(EvaluateStep::new(
            provider,
            settings,
            persist_path,
        )));
        if let Some(timeout) = step_timeout {
            pipeline = pipeline.with_step_timeout(timeout);
        }
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

impl Agent for ArtistRepertoireAgent {
    fn name(&self) -> &str {
        AGENT_NAME
    }

    fn manifest(&self) -> AgentManifest {
        AgentManifest {
            name: AGENT_NAME.to_string(),
            description:
                "An A&R agent that evaluates songs for commercial potential and artistic merit."
                    .to_string(),
            capabilities: vec![
                Capability::new("Song Evaluation", "Assess commercial and artistic potential of songs"),
                Capability::new("Market Comparison", "Compare songs to current hits and artists"),
                Capability::new(
                    "A&R Recommendation",
                    "Provide sign/pass/needs work recommendations",
                ),
            ],
            tags: ["music", "A&R", "song-evaluation"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
            steps: self.pipeline.step_names().iter().map(|s| s.to_string()).collect(),
        }
    }

    /// The song is the last message's first part; anything may be evaluated
    fn prepare(&self, input: &[Message]) -> Prepared {
        let song = match last_first_content(input) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        };
        Prepared::Run(PipelineContext::new().with("song", song))
    }

    fn pipeline(&self) -> Arc<Pipeline> {
        self.pipeline.clone()
    }

    fn render_output(&self, output: &Value) -> Vec<Message> {
        vec![Message::new(vec![MessagePart::json(output.clone())])]
    }
}
