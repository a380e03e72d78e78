use crate::api::models::{AssistantTurn, RequestBody};
use crate::api::response::parse_assistant_turn;
use crate::error::{Mail2CrmError, Result};
use crate::models::Message;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

/// The decision-making collaborator: given the conversation so far and the
/// available tools, produce the next assistant turn.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[Message], tools: &[Value]) -> Result<AssistantTurn>;
}

/// OpenAI-compatible chat completion client.
pub struct ChatClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl ChatClient {
    pub fn new(api_key: &str, endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e| {
                Mail2CrmError::Config(format!("Invalid authorization header: {}", e))
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    async fn complete(&self, messages: &[Message], tools: &[Value]) -> Result<AssistantTurn> {
        let request_body = RequestBody::new(&self.model, messages, tools);

        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "sending chat completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Too many requests".to_string());
            return Err(Mail2CrmError::RateLimited { message });
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Mail2CrmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let response_text = response.text().await?;
        tracing::trace!(raw = %response_text, "chat completion response");

        let response_json: Value = serde_json::from_str(&response_text)?;
        parse_assistant_turn(&response_json)
    }
}
