//! The bounded model/tool loop that turns one email into CRM updates.

use crate::api::ChatModel;
use crate::error::Result;
use crate::mail::MailApi;
use crate::models::{Conversation, Email, ToolCall};
use crate::prompts::SYSTEM_PROMPT;
use crate::retry::{retry_with_backoff, RetryPolicy, Sleeper, TokioSleeper};
use crate::tools::{error_payload, ToolRegistry};
use serde_json::Value;
use std::sync::Arc;

pub const DEFAULT_MAX_DEPTH: usize = 5;

/// How processing of a single email ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The model answered without requesting tools.
    Completed { text: String },
    /// The model was still requesting tools when the depth bound was hit.
    MaxIterationsReached,
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ProcessReport {
    pub email_id: String,
    pub outcome: Outcome,
    pub conversation: Conversation,
    pub llm_calls: usize,
    pub tool_invocations: usize,
}

/// Counts for one pass over the inbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub fetched: usize,
    pub completed: usize,
    pub exhausted: usize,
    pub failed: usize,
}

pub struct EmailAgent {
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    max_depth: usize,
    system_prompt: String,
}

impl EmailAgent {
    pub fn new(model: Arc<dyn ChatModel>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            model,
            tools,
            retry: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
            max_depth: DEFAULT_MAX_DEPTH,
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Drive the model until it stops asking for tools or `max_depth` tool
    /// rounds have run. Side effects of tools that already ran are kept
    /// whatever the outcome.
    pub async fn process_email(&self, email: &Email) -> Result<ProcessReport> {
        let mut conversation = Conversation::for_email(&self.system_prompt, email);
        let schema = self.tools.schema();
        let mut llm_calls = 0;
        let mut tool_invocations = 0;
        let mut depth = 0;

        tracing::info!(email_id = %email.id, subject = %email.subject, "processing email");

        while depth < self.max_depth {
            tracing::debug!(email_id = %email.id, depth, "requesting model turn");
            let turn = retry_with_backoff(&self.retry, self.sleeper.as_ref(), || {
                self.model.complete(conversation.messages(), &schema)
            })
            .await?;
            llm_calls += 1;

            if !turn.has_tool_calls() {
                let text = turn.content.clone().unwrap_or_default();
                conversation.push_assistant(turn.content, Vec::new());
                tracing::info!(email_id = %email.id, depth, "model finished");
                return Ok(ProcessReport {
                    email_id: email.id.clone(),
                    outcome: Outcome::Completed { text },
                    conversation,
                    llm_calls,
                    tool_invocations,
                });
            }

            let calls = turn.tool_calls.clone();
            conversation.push_assistant(turn.content, turn.tool_calls);

            for call in &calls {
                let payload = match parse_arguments(call) {
                    Ok(arguments) => {
                        tool_invocations += 1;
                        self.tools.invoke(call.name(), arguments).await
                    }
                    Err(payload) => payload,
                };
                conversation.push_tool_result(call, &payload);
            }

            depth += 1;
        }

        tracing::warn!(
            email_id = %email.id,
            max_depth = self.max_depth,
            "max recursion depth reached, the model may be stuck in a tool loop"
        );
        Ok(ProcessReport {
            email_id: email.id.clone(),
            outcome: Outcome::MaxIterationsReached,
            conversation,
            llm_calls,
            tool_invocations,
        })
    }
}

fn parse_arguments(call: &ToolCall) -> std::result::Result<Value, Value> {
    serde_json::from_str(&call.function.arguments).map_err(|e| {
        tracing::error!(tool = call.name(), error = %e, "model sent malformed tool arguments");
        error_payload(format!("invalid JSON arguments: {}", e))
    })
}

/// Process every unread email once, one after another. A failure on one
/// email is logged and does not stop the rest.
pub async fn run_inbox(mail: &dyn MailApi, agent: &EmailAgent) -> Result<RunSummary> {
    run_inbox_with(mail, agent, |_| {}).await
}

/// [`run_inbox`], handing each finished report to `on_report`.
pub async fn run_inbox_with<F>(
    mail: &dyn MailApi,
    agent: &EmailAgent,
    mut on_report: F,
) -> Result<RunSummary>
where
    F: FnMut(&ProcessReport),
{
    let emails = mail.get_unread_emails().await?;
    let mut summary = RunSummary {
        fetched: emails.len(),
        ..RunSummary::default()
    };

    if emails.is_empty() {
        tracing::info!("no unread emails");
        return Ok(summary);
    }

    for email in &emails {
        match agent.process_email(email).await {
            Ok(report) => match &report.outcome {
                Outcome::Completed { .. } => {
                    on_report(&report);
                    summary.completed += 1;
                    if let Err(e) = mail.mark_email_as_read(&email.id).await {
                        tracing::error!(email_id = %email.id, error = %e, "failed to mark email as read");
                    }
                }
                Outcome::MaxIterationsReached => {
                    on_report(&report);
                    summary.exhausted += 1;
                }
            },
            Err(e) => {
                summary.failed += 1;
                tracing::error!(
                    email_id = %email.id,
                    rate_limited = e.is_rate_limited(),
                    error = %e,
                    "failed to process email"
                );
            }
        }
    }

    tracing::info!(
        fetched = summary.fetched,
        completed = summary.completed,
        exhausted = summary.exhausted,
        failed = summary.failed,
        "inbox pass finished"
    );
    Ok(summary)
}
