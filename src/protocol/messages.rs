//! Wire types for the agent server
//!
//! Messages are ordered lists of immutable parts. Run requests name an agent
//! and carry the conversation so far; the agent reads the last message.

use crate::error::ErrorPayload;
use crate::pipeline::ProgressEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Default content type of a message part
pub const TEXT_PLAIN: &str = "text/plain";
pub const APPLICATION_JSON: &str = "application/json";
pub const TEXT_MARKDOWN: &str = "text/markdown";

fn default_content_type() -> String {
    TEXT_PLAIN.to_string()
}

/// One piece of a message
///
/// # Examples
/// ```
/// use songcrew::protocol::MessagePart;
///
/// let part = MessagePart::text("https://example.com");
/// assert_eq!(part.content_type, "text/plain");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePart {
    /// Usually a string; structured parts carry any JSON value
    pub content: Value,
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

impl MessagePart {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Value::String(content.into()),
            content_type: TEXT_PLAIN.to_string(),
        }
    }

    pub fn json(content: Value) -> Self {
        Self {
            content,
            content_type: APPLICATION_JSON.to_string(),
        }
    }

    pub fn markdown(content: impl Into<String>) -> Self {
        Self {
            content: Value::String(content.into()),
            content_type: TEXT_MARKDOWN.to_string(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.content.as_str()
    }
}

/// Ordered sequence of parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub parts: Vec<MessagePart>,
}

impl Message {
    pub fn new(parts: Vec<MessagePart>) -> Self {
        Self { parts }
    }

    /// Single plain-text part
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(vec![MessagePart::text(text)])
    }

    /// Concatenation of every part's string content
    pub fn text(&self) -> String {
        self.parts.iter().filter_map(MessagePart::as_str).collect()
    }

    /// Raw content of the first part, if any
    pub fn first_content(&self) -> Option<&Value> {
        self.parts.first().map(|part| &part.content)
    }
}

/// How the caller wants results delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Sync,
    Stream,
}

/// Body of `POST /runs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub agent_name: String,
    pub input: Vec<Message>,
    #[serde(default)]
    pub mode: RunMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// Result of a synchronous run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResponse {
    pub run_id: Uuid,
    pub agent_name: String,
    pub status: RunStatus,
    pub output: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
    /// Progress events emitted during the run, in order
    #[serde(default)]
    pub events: Vec<ProgressEvent>,
    pub created_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Terminal SSE payload of a successful streamed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunCompleted {
    pub run_id: Uuid,
    pub output: Vec<Message>,
}

/// Terminal SSE payload of a failed streamed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailed {
    pub run_id: Uuid,
    pub error: ErrorPayload,
}

/// Agent description returned by `GET /agents`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentManifest {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Step names in execution order
    #[serde(default)]
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub description: String,
}

impl Capability {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_part_content_type_defaults_to_text_plain() {
        let part: MessagePart = serde_json::from_value(json!({"content": "hi"})).unwrap();
        assert_eq!(part.content_type, TEXT_PLAIN);
        assert_eq!(part.as_str(), Some("hi"));
    }

    #[test]
    fn test_message_text_skips_structured_parts() {
        let message = Message::new(vec![
            MessagePart::text("https://"),
            MessagePart::json(json!({"ignored": true})),
            MessagePart::text("example.com"),
        ]);

        assert_eq!(message.text(), "https://example.com");
        assert_eq!(message.first_content(), Some(&json!("https://")));
    }

    #[test]
    fn test_empty_message_has_no_first_content() {
        let message = Message::new(vec![]);
        assert_eq!(message.text(), "");
        assert!(message.first_content().is_none());
    }

    #[test]
    fn test_run_request_mode_defaults_to_sync() {
        let request: RunRequest = serde_json::from_value(json!({
            "agent_name": "song_writer_agent",
            "input": [{"parts": [{"content": "https://example.com"}]}]
        }))
        .unwrap();

        assert_eq!(request.mode, RunMode::Sync);
        assert_eq!(request.input[0].text(), "https://example.com");

        let stream: RunMode = serde_json::from_value(json!("stream")).unwrap();
        assert_eq!(stream, RunMode::Stream);
    }

    #[test]
    fn test_run_response_omits_absent_error() {
        let now = Utc::now();
        let response = RunResponse {
            run_id: Uuid::new_v4(),
            agent_name: "markdown_report_agent".to_string(),
            status: RunStatus::Completed,
            output: vec![Message::user_text("## Generated Song")],
            error: None,
            events: vec![ProgressEvent::thought("formatting")],
            created_at: now,
            finished_at: now,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "completed");
        assert!(json.get("error").is_none());
        assert_eq!(json["events"][0]["type"], "thought");
    }
}
