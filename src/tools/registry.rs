use crate::crm::{CrmApi, NewNote, NewOpportunity, NewPerson, PersonUpdate};
use crate::error::{Mail2CrmError, Result};
use crate::mail::MailApi;
use crate::models::Email;
use async_trait::async_trait;
use futures::future::BoxFuture;
use jsonschema::{Draft, JSONSchema};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use super::{crm_tools, mail_tools};

pub type ToolHandler = Box<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    validator: JSONSchema,
    handler: ToolHandler,
}

impl Tool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Result<Self>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let name = name.into();
        let validator = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&input_schema)
            .map_err(|e| Mail2CrmError::Tool(format!("Invalid schema for tool '{}': {}", name, e)))?;

        Ok(Self {
            name,
            description: description.into(),
            input_schema,
            validator,
            handler: Box::new(move |args| -> BoxFuture<'static, Result<Value>> {
                Box::pin(handler(args))
            }),
        })
    }

    pub fn validate_arguments(&self, arguments: &Value) -> std::result::Result<(), String> {
        if let Err(errors) = self.validator.validate(arguments) {
            let error_messages: Vec<String> = errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{}: {}", path, e)
                    }
                })
                .collect();
            return Err(error_messages.join("; "));
        }
        Ok(())
    }

    /// Function declaration in the chat-completions `tools` format.
    pub fn to_llm_schema(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema,
            }
        })
    }
}

/// `{"error": message}`, the shape every failed tool call resolves to.
pub fn error_payload(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

/// Fixed name-to-handler table exposed to the model.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The CRM table first, then the mail table. On a name clash the CRM
    /// operation is the one that resolves.
    pub fn with_backends(crm: Arc<dyn CrmApi>, mail: Arc<dyn MailApi>) -> Result<Self> {
        let mut registry = Self::new();
        for tool in crm_tools(crm)? {
            registry.register(tool);
        }
        for tool in mail_tools(mail)? {
            registry.register(tool);
        }
        Ok(registry)
    }

    /// The declarations sent to the model, without any backend behind them.
    pub fn declarations() -> Result<Vec<Value>> {
        let backend = Arc::new(Disconnected);
        Ok(Self::with_backends(backend.clone(), backend)?.schema())
    }

    /// Adds `tool` unless a tool with that name is already registered.
    /// Returns whether it was added.
    pub fn register(&mut self, tool: Tool) -> bool {
        if self.index.contains_key(&tool.name) {
            tracing::warn!(tool = %tool.name, "tool already registered, keeping the first one");
            return false;
        }
        self.index.insert(tool.name.clone(), self.tools.len());
        self.tools.push(tool);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn schema(&self) -> Vec<Value> {
        self.tools.iter().map(Tool::to_llm_schema).collect()
    }

    /// Run a named tool. Failures of any kind come back as an error payload,
    /// never as `Err`.
    pub async fn invoke(&self, name: &str, arguments: Value) -> Value {
        tracing::info!(tool = name, args = %arguments, "model requested tool");

        let Some(tool) = self.get(name) else {
            tracing::error!(tool = name, "tool not found");
            return error_payload(format!("Tool '{}' not found", name));
        };

        if let Err(message) = tool.validate_arguments(&arguments) {
            tracing::error!(tool = name, error = %message, "tool arguments failed validation");
            return error_payload(format!("invalid arguments for '{}': {}", name, message));
        }

        match (tool.handler)(arguments).await {
            Ok(result) => {
                tracing::info!(tool = name, result = %result, "tool returned");
                result
            }
            Err(e) => {
                tracing::error!(tool = name, error = %e, "error executing tool");
                error_payload(e.to_string())
            }
        }
    }
}

/// Backend for a registry that is only inspected, never invoked.
struct Disconnected;

impl Disconnected {
    fn refuse<T>() -> Result<T> {
        Err(Mail2CrmError::Other("no backend connected".to_string()))
    }
}

#[async_trait]
impl CrmApi for Disconnected {
    async fn get_person_by_email(&self, _email: &str) -> Result<Value> {
        Self::refuse()
    }

    async fn create_person(&self, _person: &NewPerson) -> Result<Value> {
        Self::refuse()
    }

    async fn update_person(&self, _person_id: &str, _update: &PersonUpdate) -> Result<Value> {
        Self::refuse()
    }

    async fn get_opportunities_by_person_id(&self, _person_id: &str) -> Result<Vec<Value>> {
        Self::refuse()
    }

    async fn create_opportunity(&self, _opportunity: &NewOpportunity) -> Result<Value> {
        Self::refuse()
    }

    async fn create_note(&self, _note: &NewNote) -> Result<Value> {
        Self::refuse()
    }
}

#[async_trait]
impl MailApi for Disconnected {
    async fn get_unread_emails(&self) -> Result<Vec<Email>> {
        Self::refuse()
    }

    async fn mark_email_as_read(&self, _email_id: &str) -> Result<()> {
        Self::refuse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_tool(name: &str, marker: &'static str) -> Tool {
        Tool::new(
            name,
            "Echo the marker",
            json!({"type": "object", "properties": {}}),
            move |_args| async move { Ok(json!({ "from": marker })) },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_first_registration_wins() {
        let mut registry = ToolRegistry::new();
        assert!(registry.register(echo_tool("lookup", "crm")));
        assert!(!registry.register(echo_tool("lookup", "mail")));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.invoke("lookup", json!({})).await, json!({"from": "crm"}));
    }
}
