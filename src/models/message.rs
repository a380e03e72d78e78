use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::email::Email;
use super::tool::ToolCall;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

impl Message {
    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
        }
    }

    pub fn is_tool(&self) -> bool {
        matches!(self, Message::Tool { .. })
    }
}

/// Message history for one email. Only grows; dropped once the email is done.
#[derive(Clone, Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn for_email(system_prompt: &str, email: &Email) -> Self {
        Self {
            messages: vec![
                Message::System {
                    content: system_prompt.to_string(),
                },
                Message::User {
                    content: email.to_prompt(),
                },
            ],
        }
    }

    pub fn push_assistant(&mut self, content: Option<String>, tool_calls: Vec<ToolCall>) {
        self.messages.push(Message::Assistant {
            content,
            tool_calls,
        });
    }

    /// Appends the answer to `call`. The payload is serialized as-is, whether
    /// it is a success value or an `{"error": ...}` object.
    pub fn push_tool_result(&mut self, call: &ToolCall, payload: &Value) {
        let content = serde_json::to_string(payload)
            .unwrap_or_else(|e| format!("{{\"error\":\"unserializable tool result: {}\"}}", e));
        self.messages.push(Message::Tool {
            tool_call_id: call.id.clone(),
            name: call.name().to_string(),
            content,
        });
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn tool_message_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_tool()).count()
    }
}
