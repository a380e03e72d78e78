use crate::api::models::AssistantTurn;
use crate::error::{Mail2CrmError, Result};
use crate::models::ToolCall;
use serde_json::Value;
use uuid::Uuid;

fn first_message(response_json: &Value) -> Result<&Value> {
    let choices = response_json
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| Mail2CrmError::Other("No choices in response".to_string()))?;

    let first_choice = choices
        .first()
        .ok_or_else(|| Mail2CrmError::Other("Empty choices array".to_string()))?;

    first_choice
        .get("message")
        .ok_or_else(|| Mail2CrmError::Other("No message in response".to_string()))
}

/// Parse a chat completion response and extract tool calls if present.
///
/// Malformed entries are kept rather than dropped so that every call the model
/// issued still gets an answer: a missing `id` is replaced with a generated one,
/// a missing name becomes an empty name (which no tool matches), and missing
/// arguments default to `{}`.
pub fn parse_tool_calls(response_json: &Value) -> Result<Option<Vec<ToolCall>>> {
    let message = first_message(response_json)?;

    let raw_calls = match message.get("tool_calls").and_then(|tc| tc.as_array()) {
        Some(calls) if !calls.is_empty() => calls,
        _ => return Ok(None),
    };

    let tool_calls = raw_calls
        .iter()
        .map(|raw| {
            let id = raw
                .get("id")
                .and_then(|i| i.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| {
                    let generated = format!("call_{}", Uuid::new_v4().simple());
                    tracing::warn!(id = %generated, "tool call missing 'id' field, generated one");
                    generated
                });
            let function = raw.get("function");
            let name = function
                .and_then(|f| f.get("name"))
                .and_then(|n| n.as_str())
                .unwrap_or_default();
            let arguments = match function.and_then(|f| f.get("arguments")) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => "{}".to_string(),
                // Some providers send the arguments as an object instead of a string
                Some(other) => other.to_string(),
            };
            ToolCall::new(id, name, arguments)
        })
        .collect();

    Ok(Some(tool_calls))
}

/// Extract text content from a chat completion response
pub fn extract_content(response_json: &Value) -> Result<Option<String>> {
    let message = first_message(response_json)?;

    Ok(message
        .get("content")
        .and_then(|c| c.as_str())
        .map(|s| s.to_string()))
}

pub fn parse_assistant_turn(response_json: &Value) -> Result<AssistantTurn> {
    Ok(AssistantTurn {
        content: extract_content(response_json)?,
        tool_calls: parse_tool_calls(response_json)?.unwrap_or_default(),
    })
}
