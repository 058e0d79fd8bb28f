//! Progress events surfaced by agent steps while a pipeline runs

use serde::{Deserialize, Serialize};

/// Intermediate progress reported by a step.
///
/// Serialized with an explicit `type` discriminant so that consumers on the
/// other side of the wire can dispatch without inspecting field shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Reasoning or intermediate notes produced by a step
    Thought { text: String },
    /// A step invoked a named tool
    ToolCall { tool_name: String },
    /// A step (or a sub-task of a crew step) produced its result
    Finished { result: String },
}

impl ProgressEvent {
    pub fn thought(text: impl Into<String>) -> Self {
        Self::Thought { text: text.into() }
    }

    pub fn tool_call(tool_name: impl Into<String>) -> Self {
        Self::ToolCall {
            tool_name: tool_name.into(),
        }
    }

    pub fn finished(result: impl Into<String>) -> Self {
        Self::Finished {
            result: result.into(),
        }
    }

    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::Thought { .. } => "thought",
            ProgressEvent::ToolCall { .. } => "tool_call",
            ProgressEvent::Finished { .. } => "finished",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, ProgressEvent::Finished { .. })
    }
}
