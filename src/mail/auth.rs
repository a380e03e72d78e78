use crate::error::{Mail2CrmError, Result};
use crate::mail::token_cache::{CachedToken, TokenCache};
use crate::retry::Sleeper;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const SLOW_DOWN_INCREMENT_SECS: u64 = 5;

/// How the mail client proves its identity to Microsoft Graph.
#[derive(Clone, Debug, PartialEq)]
pub enum GraphAuth {
    /// A token obtained out of band; never refreshed.
    Static(String),
    /// Application permissions (client id + secret).
    ClientCredentials {
        tenant: String,
        client_id: String,
        client_secret: String,
    },
    /// Delegated permissions via the device-code login.
    DeviceCode {
        tenant: String,
        client_id: String,
        scopes: Vec<String>,
    },
}

#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    expires_in: u64,
    interval: Option<u64>,
    message: Option<String>,
}

/// Lazily acquires an access token and keeps it in the injected cache.
pub struct TokenSource {
    http: reqwest::Client,
    auth: GraphAuth,
    authority: String,
    cache: Arc<dyn TokenCache>,
    sleeper: Arc<dyn Sleeper>,
}

impl TokenSource {
    pub fn new(
        auth: GraphAuth,
        authority: impl Into<String>,
        cache: Arc<dyn TokenCache>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            auth,
            authority: authority.into().trim_end_matches('/').to_string(),
            cache,
            sleeper,
        })
    }

    pub async fn access_token(&self) -> Result<String> {
        if let GraphAuth::Static(token) = &self.auth {
            return Ok(token.clone());
        }

        if let Some(cached) = self.cache.get() {
            return Ok(cached.access_token);
        }

        let token = match &self.auth {
            GraphAuth::Static(token) => CachedToken::new(token.clone(), None),
            GraphAuth::ClientCredentials {
                tenant,
                client_id,
                client_secret,
            } => {
                self.client_credentials(tenant, client_id, client_secret)
                    .await?
            }
            GraphAuth::DeviceCode {
                tenant,
                client_id,
                scopes,
            } => self.device_code(tenant, client_id, scopes).await?,
        };

        if let Err(e) = self.cache.set(token.clone()) {
            tracing::warn!(error = %e, "failed to store access token in cache");
        }
        tracing::info!("obtained Microsoft Graph access token");
        Ok(token.access_token)
    }

    /// Drop the cached token so the next request acquires a new one.
    pub fn invalidate(&self) {
        if matches!(self.auth, GraphAuth::Static(_)) {
            return;
        }
        match self.cache.clear() {
            Ok(()) => tracing::info!("discarded rejected Microsoft Graph access token"),
            Err(e) => tracing::warn!(error = %e, "failed to clear token cache"),
        }
    }

    fn endpoint(&self, tenant: &str, leaf: &str) -> String {
        format!("{}/{}/oauth2/v2.0/{}", self.authority, tenant, leaf)
    }

    async fn client_credentials(
        &self,
        tenant: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<CachedToken> {
        let response = self
            .http
            .post(self.endpoint(tenant, "token"))
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("scope", GRAPH_DEFAULT_SCOPE),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        let body: TokenResponse = response.json().await?;
        match body.access_token {
            Some(access_token) => Ok(CachedToken::new(access_token, body.expires_in)),
            None => Err(Mail2CrmError::Auth(format!(
                "Could not acquire access token: {}",
                describe_error(&body)
            ))),
        }
    }

    async fn device_code(
        &self,
        tenant: &str,
        client_id: &str,
        scopes: &[String],
    ) -> Result<CachedToken> {
        let scope = scopes.join(" ");
        let response = self
            .http
            .post(self.endpoint(tenant, "devicecode"))
            .form(&[("client_id", client_id), ("scope", scope.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(Mail2CrmError::Auth(format!(
                "Failed to initiate device flow (status {}): {}",
                status, text
            )));
        }

        let flow: DeviceCodeResponse = response.json().await?;
        match &flow.message {
            Some(message) => tracing::info!("{}", message),
            None => tracing::info!(
                "Go to {} and enter code: {}",
                flow.verification_uri,
                flow.user_code
            ),
        }

        let mut interval = flow
            .interval
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        let max_polls = flow.expires_in.div_ceil(interval);
        let mut waited = 0u64;

        for _ in 0..max_polls {
            if waited >= flow.expires_in {
                break;
            }
            self.sleeper.sleep(Duration::from_secs(interval)).await;
            waited += interval;

            let response = self
                .http
                .post(self.endpoint(tenant, "token"))
                .form(&[
                    ("client_id", client_id),
                    ("grant_type", DEVICE_CODE_GRANT),
                    ("device_code", flow.device_code.as_str()),
                ])
                .send()
                .await?;
            let body: TokenResponse = response.json().await?;

            if let Some(access_token) = body.access_token {
                return Ok(CachedToken::new(access_token, body.expires_in));
            }

            match body.error.as_deref() {
                Some("authorization_pending") => {
                    tracing::debug!("waiting for user to complete device login");
                }
                Some("slow_down") => {
                    interval += SLOW_DOWN_INCREMENT_SECS;
                }
                _ => {
                    return Err(Mail2CrmError::Auth(format!(
                        "Device flow failed: {}",
                        describe_error(&body)
                    )));
                }
            }
        }

        Err(Mail2CrmError::Auth(
            "Device flow timed out before the user completed login".to_string(),
        ))
    }
}

fn describe_error(body: &TokenResponse) -> String {
    match (&body.error, &body.error_description) {
        (_, Some(description)) => description.clone(),
        (Some(error), None) => error.clone(),
        (None, None) => "No error description".to_string(),
    }
}
