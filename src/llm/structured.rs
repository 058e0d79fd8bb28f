//! Prompt helpers: plain-text and schema-constrained completions
//!
//! Structured completions derive a JSON schema from the target type with
//! `schemars`, ask the provider for a schema-constrained response and validate
//! the returned JSON with `jsonschema` before deserializing it.

use super::provider::{
    CompletionRequest, JsonSchemaDefinition, LlmError, LlmProvider, Message, ModelSettings,
    ResponseFormat,
};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Single-turn completion returning trimmed, non-empty text
pub async fn complete_text(
    provider: &dyn LlmProvider,
    settings: &ModelSettings,
    system: &str,
    user: &str,
) -> Result<String, LlmError> {
    let request = CompletionRequest::from_settings(
        settings,
        vec![Message::system(system), Message::user(user)],
    );
    let response = provider.complete(request).await?;

    response
        .content
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| LlmError::InvalidResponse("Model returned an empty completion".to_string()))
}

/// JSON schema for `T`, without the meta-schema marker or numeric `format`
/// annotations (strict response formats reject `uint8` and friends)
pub fn schema_value<T: JsonSchema>() -> Result<Value, LlmError> {
    let root = schemars::schema_for!(T);
    let mut schema = serde_json::to_value(root)
        .map_err(|e| LlmError::InvalidRequest(format!("Schema generation failed: {e}")))?;
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
    }
    strip_numeric_formats(&mut schema);
    Ok(schema)
}

fn strip_numeric_formats(schema: &mut Value) {
    match schema {
        Value::Object(object) => {
            let numeric = matches!(
                object.get("type").and_then(Value::as_str),
                Some("integer" | "number")
            );
            if numeric {
                object.remove("format");
            }
            object.values_mut().for_each(strip_numeric_formats);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_numeric_formats),
        _ => {}
    }
}

/// Single-turn completion constrained to the JSON schema of `T`
pub async fn complete_structured<T>(
    provider: &dyn LlmProvider,
    settings: &ModelSettings,
    system: &str,
    user: &str,
    schema_name: &str,
) -> Result<T, LlmError>
where
    T: DeserializeOwned + JsonSchema,
{
    let schema = schema_value::<T>()?;
    let request = CompletionRequest::from_settings(
        settings,
        vec![Message::system(system), Message::user(user)],
    )
    .with_response_format(ResponseFormat::JsonSchema {
        json_schema: JsonSchemaDefinition {
            name: schema_name.to_string(),
            strict: Some(true),
            schema: schema.clone(),
        },
    });

    let response = provider.complete(request).await?;
    let content = response
        .content
        .ok_or_else(|| LlmError::InvalidResponse("Model returned no content".to_string()))?;

    parse_structured(&content, &schema)
}

/// Parse and validate a structured completion body (pure function)
pub fn parse_structured<T: DeserializeOwned>(content: &str, schema: &Value) -> Result<T, LlmError> {
    let body = strip_code_fence(content);
    let value: Value = serde_json::from_str(body)
        .map_err(|e| LlmError::InvalidResponse(format!("Completion is not valid JSON: {e}")))?;

    let validator = jsonschema::validator_for(schema)
        .map_err(|e| LlmError::InvalidRequest(format!("Schema compilation error: {e}")))?;
    validator.validate(&value).map_err(|errors| {
        let messages: Vec<String> = errors
            .map(|e| format!("At '{}': {}", e.instance_path, e))
            .collect();
        LlmError::InvalidResponse(format!(
            "Completion does not match schema: {}",
            messages.join("; ")
        ))
    })?;

    debug!("Structured completion validated against schema");
    serde_json::from_value(value)
        .map_err(|e| LlmError::InvalidResponse(format!("Completion has wrong shape: {e}")))
}

/// Models sometimes wrap JSON in a markdown fence despite the response format
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::MockLlmProvider;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    #[serde(deny_unknown_fields)]
    struct Rating {
        #[schemars(range(min = 1, max = 5))]
        stars: u8,
        comment: String,
    }

    #[test]
    fn test_schema_value_drops_meta_schema() {
        let schema = schema_value::<Rating>().unwrap();
        assert!(schema.get("$schema").is_none());
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["additionalProperties"], false);
        assert!(schema["properties"]["stars"].get("format").is_none());
        assert_eq!(schema["properties"]["stars"]["maximum"], 5.0);
    }

    #[test]
    fn test_parse_structured_accepts_fenced_json() {
        let schema = schema_value::<Rating>().unwrap();
        let content = "```json\n{\"stars\": 4, \"comment\": \"catchy\"}\n```";

        let rating: Rating = parse_structured(content, &schema).unwrap();
        assert_eq!(
            rating,
            Rating {
                stars: 4,
                comment: "catchy".to_string()
            }
        );
    }

    #[test]
    fn test_parse_structured_rejects_out_of_range_values() {
        let schema = schema_value::<Rating>().unwrap();
        let result = parse_structured::<Rating>(r#"{"stars": 9, "comment": "x"}"#, &schema);
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_structured_rejects_non_json() {
        let schema = schema_value::<Rating>().unwrap();
        let result = parse_structured::<Rating>("five stars!", &schema);
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_complete_text_rejects_blank_completion() {
        let provider = MockLlmProvider::single_response("   ");
        let result =
            complete_text(&provider, &ModelSettings::default(), "system", "user").await;
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_complete_structured_round_trip_through_provider() {
        let provider = MockLlmProvider::single_response(r#"{"stars": 2, "comment": "meh"}"#);
        let rating: Rating = complete_structured(
            &provider,
            &ModelSettings::default(),
            "rate it",
            "a song",
            "rating",
        )
        .await
        .unwrap();

        assert_eq!(rating.stars, 2);
        let requests = provider.requests().await;
        assert_eq!(requests.len(), 1);
        assert!(matches!(
            requests[0].response_format,
            Some(ResponseFormat::JsonSchema { .. })
        ));
    }
}
