use crate::error::{Mail2CrmError, Result};
use crate::mail::auth::TokenSource;
use crate::models::Email;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Mailbox operations the agent and the inbox runner need.
#[async_trait]
pub trait MailApi: Send + Sync {
    async fn get_unread_emails(&self) -> Result<Vec<Email>>;
    async fn mark_email_as_read(&self, email_id: &str) -> Result<()>;
}

/// Whose inbox to read: the signed-in user, or a named user when running
/// with application permissions.
#[derive(Clone, Debug, PartialEq)]
pub enum Mailbox {
    Me,
    User(String),
}

impl Mailbox {
    fn path(&self) -> String {
        match self {
            Mailbox::Me => "me".to_string(),
            Mailbox::User(id) => format!("users/{}", id),
        }
    }
}

#[derive(Deserialize)]
struct GraphMessageList {
    #[serde(default)]
    value: Vec<GraphMessage>,
}

#[derive(Deserialize)]
struct GraphMessage {
    id: String,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    body: Option<GraphBody>,
    #[serde(default)]
    sender: Option<GraphRecipient>,
}

#[derive(Deserialize)]
struct GraphBody {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct GraphRecipient {
    #[serde(rename = "emailAddress", default)]
    email_address: Option<GraphAddress>,
}

#[derive(Deserialize)]
struct GraphAddress {
    #[serde(default)]
    address: Option<String>,
}

impl From<GraphMessage> for Email {
    fn from(message: GraphMessage) -> Self {
        Email {
            id: message.id,
            subject: message
                .subject
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "No Subject".to_string()),
            body: message.body.and_then(|b| b.content).unwrap_or_default(),
            sender: message
                .sender
                .and_then(|s| s.email_address)
                .and_then(|a| a.address)
                .unwrap_or_default(),
        }
    }
}

/// Microsoft Graph mail client.
pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    mailbox: Mailbox,
    page_size: u32,
    tokens: TokenSource,
}

impl GraphClient {
    pub fn new(base_url: &str, mailbox: Mailbox, tokens: TokenSource) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            mailbox,
            page_size: DEFAULT_PAGE_SIZE,
            tokens,
        })
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    async fn authorized(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let token = self.tokens.access_token().await?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate();
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(Mail2CrmError::Mail {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl MailApi for GraphClient {
    async fn get_unread_emails(&self) -> Result<Vec<Email>> {
        let url = format!(
            "{}/{}/mailFolders/inbox/messages",
            self.base_url,
            self.mailbox.path()
        );
        let top = self.page_size.to_string();

        let response = self
            .authorized(Method::GET, &url)
            .await?
            .query(&[
                ("$filter", "isRead eq false"),
                ("$select", "id,subject,body,sender"),
                ("$top", top.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "error fetching unread emails");
                e
            })?;

        let list: GraphMessageList = self.check(response).await?.json().await?;
        let emails: Vec<Email> = list.value.into_iter().map(Email::from).collect();
        tracing::info!(count = emails.len(), "fetched unread emails");
        Ok(emails)
    }

    async fn mark_email_as_read(&self, email_id: &str) -> Result<()> {
        let url = format!(
            "{}/{}/messages/{}",
            self.base_url,
            self.mailbox.path(),
            email_id
        );

        let response = self
            .authorized(Method::PATCH, &url)
            .await?
            .json(&json!({ "isRead": true }))
            .send()
            .await?;
        self.check(response).await?;

        tracing::info!(email_id, "email marked as read");
        Ok(())
    }
}
