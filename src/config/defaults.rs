pub use crate::agent::DEFAULT_MAX_DEPTH;
pub use crate::retry::{DEFAULT_INITIAL_DELAY, DEFAULT_MAX_RETRIES};

pub const DEFAULT_LLM_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions";
pub const DEFAULT_LLM_MODEL: &str = "gemini-2.0-flash";

pub const DEFAULT_TENANT: &str = "common";
pub const DEFAULT_DEVICE_SCOPE: &str = "Mail.ReadWrite";

pub fn default_device_scopes() -> Vec<String> {
    vec![DEFAULT_DEVICE_SCOPE.to_string()]
}
