use thiserror::Error;

#[derive(Debug, Error)]
pub enum Mail2CrmError {
    #[error("LLM API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// HTTP 429 from the LLM endpoint. Kept apart from `Api` so the backoff
    /// policy and callers can tell throttling from hard failures.
    #[error("LLM rate limit exceeded: {message}")]
    RateLimited { message: String },

    #[error("CRM API error (status {status}): {message}")]
    Crm { status: u16, message: String },

    #[error("Mail API error (status {status}): {message}")]
    Mail { status: u16, message: String },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Other(String),
}

impl Mail2CrmError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Mail2CrmError::RateLimited { .. })
    }
}

impl From<anyhow::Error> for Mail2CrmError {
    fn from(err: anyhow::Error) -> Self {
        Mail2CrmError::Other(err.to_string())
    }
}

impl From<String> for Mail2CrmError {
    fn from(msg: String) -> Self {
        Mail2CrmError::Other(msg)
    }
}

impl From<&str> for Mail2CrmError {
    fn from(msg: &str) -> Self {
        Mail2CrmError::Other(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Mail2CrmError>;
