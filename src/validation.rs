//! Input validation for agent pipelines
//!
//! Pure guards run before any step: a bad external input is answered with a
//! plain message and no pipeline run is attempted.

use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

/// Rejected external input
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("not a url")]
    NotAUrl { input: String },

    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("feedback must be a JSON object, not a JSON-encoded string")]
    EncodedFeedback,

    #[error("feedback must be a JSON object, got {0}")]
    InvalidFeedback(&'static str),
}

impl ValidationError {
    /// Short reason suitable for a user-facing message
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// Validated input of the report formatter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportInput {
    pub song: String,
    pub feedback: Map<String, Value>,
}

/// Accept only absolute URLs with both a scheme and a host
pub fn validate_url(raw: &str) -> Result<Url, ValidationError> {
    let trimmed = raw.trim();
    let not_a_url = || ValidationError::NotAUrl {
        input: trimmed.to_string(),
    };

    let url = Url::parse(trimmed).map_err(|_| not_a_url())?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(not_a_url()),
    }
}

/// Parse the report formatter's payload.
///
/// The payload is a JSON object, or a string holding one. `song` and
/// `feedback` are optional and default to empty values.
pub fn parse_report_input(raw: &Value) -> Result<ReportInput, ValidationError> {
    let decoded;
    let payload = match raw {
        Value::String(text) => {
            decoded = serde_json::from_str::<Value>(text)
                .map_err(|e| ValidationError::MalformedJson(e.to_string()))?;
            &decoded
        }
        other => other,
    };

    let object = payload
        .as_object()
        .ok_or_else(|| ValidationError::NotAnObject(json_kind(payload)))?;

    let song = match object.get("song") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(song)) => song.clone(),
        Some(other) => other.to_string(),
    };

    let feedback = match object.get("feedback") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(feedback)) => feedback.clone(),
        Some(Value::String(_)) => return Err(ValidationError::EncodedFeedback),
        Some(other) => return Err(ValidationError::InvalidFeedback(json_kind(other))),
    };

    Ok(ReportInput { song, feedback })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_urls_are_accepted() {
        for raw in [
            "https://example.com",
            "http://localhost:8080/path?q=1",
            "  https://example.com/song  ",
            "ftp://files.example.org/a.txt",
        ] {
            assert!(validate_url(raw).is_ok(), "expected {raw:?} to validate");
        }
    }

    #[test]
    fn test_strings_without_scheme_or_host_are_rejected() {
        for raw in [
            "",
            "example.com",
            "not a url",
            "mailto:someone@example.com",
            "file:///etc/passwd",
            "https://",
            "/relative/path",
        ] {
            let error = validate_url(raw).unwrap_err();
            assert_eq!(error.reason(), "not a url", "input {raw:?}");
        }
    }

    #[test]
    fn test_report_input_from_object() {
        let input = parse_report_input(&json!({
            "song": "La la la",
            "feedback": {"hit_potential_score": 7}
        }))
        .unwrap();

        assert_eq!(input.song, "La la la");
        assert_eq!(input.feedback.get("hit_potential_score"), Some(&json!(7)));
    }

    #[test]
    fn test_report_input_from_encoded_string() {
        let raw = json!(r#"{"song": "Hum", "feedback": {"recommendation": "Sign"}}"#);
        let input = parse_report_input(&raw).unwrap();

        assert_eq!(input.song, "Hum");
        assert_eq!(input.feedback.get("recommendation"), Some(&json!("Sign")));
    }

    #[test]
    fn test_report_input_defaults_missing_fields() {
        let input = parse_report_input(&json!({})).unwrap();
        assert_eq!(input, ReportInput::default());

        let input = parse_report_input(&json!({"song": null, "feedback": null})).unwrap();
        assert_eq!(input, ReportInput::default());
    }

    #[test]
    fn test_report_input_renders_non_string_song_as_json() {
        let input = parse_report_input(&json!({"song": 42})).unwrap();
        assert_eq!(input.song, "42");
    }

    #[test]
    fn test_report_input_rejects_unparsable_string() {
        let error = parse_report_input(&json!("this is { not json")).unwrap_err();
        assert!(matches!(error, ValidationError::MalformedJson(_)));
    }

    #[test]
    fn test_report_input_rejects_non_objects() {
        assert_eq!(
            parse_report_input(&json!([1, 2])).unwrap_err(),
            ValidationError::NotAnObject("an array")
        );
        assert_eq!(
            parse_report_input(&json!("\"just a string\"")).unwrap_err(),
            ValidationError::NotAnObject("a string")
        );
    }

    #[test]
    fn test_encoded_feedback_is_rejected() {
        let raw = json!({"song": "x", "feedback": "{\"hit_potential_score\": 7}"});
        assert_eq!(
            parse_report_input(&raw).unwrap_err(),
            ValidationError::EncodedFeedback
        );
    }

    #[test]
    fn test_non_object_feedback_is_rejected() {
        let raw = json!({"feedback": 7});
        assert_eq!(
            parse_report_input(&raw).unwrap_err(),
            ValidationError::InvalidFeedback("a number")
        );
    }
}
