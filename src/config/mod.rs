mod agent;
mod crm;
mod defaults;
mod llm;
mod mail;
mod validation;

use crate::cli::Args;
use crate::error::{Mail2CrmError, Result};
use crate::mail::{FileTokenCache, GraphAuth, Mailbox, DEFAULT_AUTHORITY, DEFAULT_GRAPH_BASE_URL};
use crate::retry::RetryPolicy;
use crate::review::REVIEW_QUEUE_FILE;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use agent::AgentConfig;
pub use crm::CrmConfig;
pub use defaults::*;
pub use llm::LlmConfig;
pub use mail::MailConfig;
pub use validation::{expand_env_var_in_string, normalize_endpoint};

/// Everything the binary needs, resolved from CLI > env > file > defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm_api_key: String,
    pub llm_endpoint: String,
    pub llm_model: String,
    pub system_prompt: Option<String>,
    pub crm_base_url: String,
    pub crm_api_key: String,
    pub graph_auth: GraphAuth,
    pub mailbox: Mailbox,
    pub graph_base_url: String,
    pub authority: String,
    pub token_cache: PathBuf,
    pub page_size: Option<u32>,
    pub max_depth: usize,
    pub retry: RetryPolicy,
    pub review_queue: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FileConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub crm: CrmConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Non-empty process environment variables.
pub fn process_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn required(value: Option<String>, what: &str) -> Result<String> {
    value.ok_or_else(|| Mail2CrmError::Config(format!("{} is not set", what)))
}

fn parse_env<T: std::str::FromStr>(
    env: &dyn Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>> {
    match env(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| Mail2CrmError::Config(format!("{} has an invalid value: {}", name, raw))),
        None => Ok(None),
    }
}

impl Config {
    pub fn from_env_and_args(args: &Args) -> Result<Self> {
        let file = FileConfig::from_args(args)?;
        Self::resolve(args, file, &process_env)
    }

    /// Merge the layers. `env` stands in for the process environment.
    pub fn resolve(
        args: &Args,
        file: FileConfig,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let llm_api_key = required(
            env("LLM_API_KEY")
                .or_else(|| env("GEMINI_API_KEY"))
                .or_else(|| file.llm.api_key.clone()),
            "LLM_API_KEY (or GEMINI_API_KEY)",
        )?;
        let (crm_base_url, crm_api_key) = file.crm_credentials(env)?;
        let review_queue = file.review_queue_path(env);

        let FileConfig {
            llm, mail, agent, ..
        } = file;

        let llm_endpoint = args
            .api_endpoint
            .clone()
            .or_else(|| env("LLM_API_ENDPOINT"))
            .or(llm.endpoint)
            .map(|endpoint| normalize_endpoint(&endpoint))
            .unwrap_or_else(|| DEFAULT_LLM_ENDPOINT.to_string());

        let llm_model = args
            .model
            .clone()
            .or_else(|| env("LLM_MODEL"))
            .or_else(|| env("GEMINI_DEFAULT_MODEL"))
            .or(llm.model)
            .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string());

        let graph_auth = Self::graph_auth(env, &mail)?;
        let user_id = env("MS_GRAPH_USER_ID").or(mail.user_id);
        let mailbox = match (&graph_auth, user_id) {
            (_, Some(id)) => Mailbox::User(id),
            (GraphAuth::ClientCredentials { .. }, None) => {
                return Err(Mail2CrmError::Config(
                    "MS_GRAPH_USER_ID is required with client-credential authentication"
                        .to_string(),
                ))
            }
            (_, None) => Mailbox::Me,
        };

        let max_depth = match parse_env(env, "MAIL2CRM_MAX_DEPTH")? {
            Some(depth) => depth,
            None => agent.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
        };
        let max_retries = match parse_env(env, "MAIL2CRM_MAX_RETRIES")? {
            Some(retries) => retries,
            None => agent.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
        };
        let initial_delay = match parse_env::<u64>(env, "MAIL2CRM_INITIAL_DELAY_MS")? {
            Some(ms) => Duration::from_millis(ms),
            None => agent
                .initial_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_INITIAL_DELAY),
        };

        let token_cache = env("MAIL2CRM_TOKEN_CACHE")
            .or(mail.token_cache)
            .map(PathBuf::from)
            .unwrap_or_else(FileTokenCache::default_path);

        Ok(Config {
            llm_api_key,
            llm_endpoint,
            llm_model,
            system_prompt: env("MAIL2CRM_SYSTEM_PROMPT").or(llm.system_prompt),
            crm_base_url,
            crm_api_key,
            graph_auth,
            mailbox,
            graph_base_url: mail
                .graph_base_url
                .unwrap_or_else(|| DEFAULT_GRAPH_BASE_URL.to_string()),
            authority: mail
                .authority
                .unwrap_or_else(|| DEFAULT_AUTHORITY.to_string()),
            token_cache,
            page_size: mail.page_size,
            max_depth: args.max_depth().unwrap_or(max_depth),
            retry: RetryPolicy {
                max_retries,
                initial_delay,
            },
            review_queue,
        })
    }

    fn graph_auth(env: &dyn Fn(&str) -> Option<String>, mail: &MailConfig) -> Result<GraphAuth> {
        if let Some(token) = env("MS_GRAPH_ACCESS_TOKEN").or_else(|| mail.access_token.clone()) {
            return Ok(GraphAuth::Static(token));
        }

        let client_id = required(
            env("MS_GRAPH_CLIENT_ID").or_else(|| mail.client_id.clone()),
            "MS_GRAPH_ACCESS_TOKEN or MS_GRAPH_CLIENT_ID",
        )?;
        let tenant = env("MS_GRAPH_TENANT_ID").or_else(|| mail.tenant_id.clone());

        match env("MS_GRAPH_CLIENT_SECRET").or_else(|| mail.client_secret.clone()) {
            Some(client_secret) => Ok(GraphAuth::ClientCredentials {
                tenant: required(tenant, "MS_GRAPH_TENANT_ID")?,
                client_id,
                client_secret,
            }),
            None => Ok(GraphAuth::DeviceCode {
                tenant: tenant.unwrap_or_else(|| DEFAULT_TENANT.to_string()),
                client_id,
                scopes: mail.scopes.clone().unwrap_or_else(default_device_scopes),
            }),
        }
    }
}

impl FileConfig {
    /// The file named by `--config`, or the first one discovered.
    pub fn from_args(args: &Args) -> Result<Self> {
        Self::load(args.config.as_deref(), &process_env)
    }

    /// CRM base URL and API key, env first.
    pub fn crm_credentials(
        &self,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<(String, String)> {
        let base_url = required(
            env("TWENTY_CRM_API_BASE_URL").or_else(|| self.crm.base_url.clone()),
            "TWENTY_CRM_API_BASE_URL",
        )?;
        let api_key = required(
            env("TWENTY_CRM_API_KEY").or_else(|| self.crm.api_key.clone()),
            "TWENTY_CRM_API_KEY",
        )?;
        Ok((base_url, api_key))
    }

    pub fn review_queue_path(&self, env: &dyn Fn(&str) -> Option<String>) -> PathBuf {
        env("MAIL2CRM_REVIEW_QUEUE")
            .or_else(|| self.agent.review_queue.clone())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(REVIEW_QUEUE_FILE))
    }

    /// Read the first config file found. An explicit path must exist.
    pub fn load(explicit: Option<&Path>, env: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path, env);
        }

        for path in Self::get_config_paths() {
            if path.exists() {
                return Self::from_file(&path, env);
            }
        }

        Ok(FileConfig::default())
    }

    pub fn from_file(path: &Path, env: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let is_yaml = matches!(
            path.extension().and_then(|s| s.to_str()),
            Some("yaml") | Some("yml")
        );
        let mut config: FileConfig = if is_yaml {
            serde_yaml::from_str(&contents).with_context(|| {
                format!("Failed to parse YAML config file: {}", path.display())
            })?
        } else {
            serde_json::from_str(&contents).with_context(|| {
                format!("Failed to parse JSON config file: {}", path.display())
            })?
        };

        config.llm.expand(env);
        config.crm.expand(env);
        config.mail.expand(env);
        config.agent.expand(env);
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    pub fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from(".mail2crm.yaml"),
            PathBuf::from(".mail2crm.yml"),
            PathBuf::from(".mail2crm.json"),
        ];

        if let Some(home_dir) = dirs::home_dir() {
            let config_dir = home_dir.join(".config").join("mail2crm");
            paths.push(config_dir.join("mail2crm.yaml"));
            paths.push(config_dir.join("mail2crm.yml"));
            paths.push(config_dir.join("mail2crm.json"));
        }

        paths
    }
}
