//! Markdown report agent
//!
//! Combines a song and its A&R feedback into a markdown report. Deterministic:
//! no model is involved.

use super::{last_first_content, Agent, Prepared};
use crate::pipeline::{Pipeline, PipelineContext, StepError, TransformStep};
use crate::protocol::{AgentManifest, Capability, Message, MessagePart};
use crate::validation::{parse_report_input, ReportInput};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const AGENT_NAME: &str = "markdown_report_agent";

/// Feedback fields in report order, with their labels
const FEEDBACK_FIELDS: [(&str, &str); 6] = [
    ("hit_potential_score", "Hit Potential Score"),
    ("target_audience", "Target Audience"),
    ("strengths", "Strengths"),
    ("concerns", "Concerns"),
    ("market_comparison", "Market Comparison"),
    ("recommendation", "Recommendation"),
];

fn render_value(value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

/// Render the report (pure function)
///
/// # Examples
/// ```
/// use songcrew::agents::render_report;
/// use songcrew::validation::ReportInput;
///
/// let report = render_report(&ReportInput { song: "La la la".into(), ..Default::default() });
/// assert!(report.starts_with("## Generated Song\n\n```\nLa la la\n```"));
/// ```
pub fn render_report(input: &ReportInput) -> String {
    let mut lines = vec![
        "## Generated Song".to_string(),
        String::new(),
        "```".to_string(),
        input.song.clone(),
        "```".to_string(),
        String::new(),
        "## A&R Feedback".to_string(),
        String::new(),
    ];
    lines.extend(FEEDBACK_FIELDS.iter().map(|(key, label)| {
        format!("- **{label}:** {}", render_value(input.feedback.get(*key)))
    }));
    lines.join("\n")
}

/// Formats a song and its A&R feedback as markdown
pub struct MarkdownReportAgent {
    pipeline: Arc<Pipeline>,
}

impl MarkdownReportAgent {
    pub fn new(step_timeout: Option<Duration>) -> Self {
        let format = TransformStep::new("format_report", &["song", "feedback"], "report", |view| {
            let song = view
                .get_str("song")
                .ok_or_else(|| StepError::invalid_input("'song' must be a string"))?;
            let feedback = view
                .get("feedback")
                .and_then(Value::as_object)
                .ok_or_else(|| StepError::invalid_input("'feedback' must be an object"))?;

            Ok(Value::String(render_report(&ReportInput {
                song: song.to_string(),
                feedback: feedback.clone(),
            })))
        });

        let mut pipeline = Pipeline::new(AGENT_NAME).with_step(Arc::new(format));
        if let Some(timeout) = step_timeout {
            pipeline = pipeline.with_step_timeout(timeout);
        }
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

impl Agent for MarkdownReportAgent {
    fn name(&self) -> &str {
        AGENT_NAME
    }

    fn manifest(&self) -> AgentManifest {
        AgentManifest {
            name: AGENT_NAME.to_string(),
            description:
                "Agent that formats the original song and A&R feedback JSON into a markdown report."
                    .to_string(),
            capabilities: vec![Capability::new(
                "Report Formatting",
                "Render a song and its A&R feedback as markdown",
            )],
            tags: vec!["music".to_string(), "markdown".to_string()],
            steps: self.pipeline.step_names().iter().map(|s| s.to_string()).collect(),
        }
    }

    fn prepare(&self, input: &[Message]) -> Prepared {
        let payload = last_first_content(input).cloned().unwrap_or(Value::Null);
        match parse_report_input(&payload) {
            Ok(ReportInput { song, feedback }) => Prepared::Run(
                PipelineContext::new()
                    .with("song", song)
                    .with("feedback", Value::Object(feedback)),
            ),
            Err(e) => Prepared::Reply(vec![Message::user_text(format!(
                "Error parsing input: {}",
                e.reason()
            ))]),
        }
    }

    fn pipeline(&self) -> Arc<Pipeline> {
        self.pipeline.clone()
    }

    fn render_output(&self, output: &Value) -> Vec<Message> {
        let markdown = render_value(Some(output));
        vec![Message::new(vec![MessagePart::markdown(markdown)])]
    }
}
