use super::validation::expand_opt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl LlmConfig {
    pub(super) fn expand(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        expand_opt(&mut self.api_key, lookup);
        expand_opt(&mut self.endpoint, lookup);
        expand_opt(&mut self.model, lookup);
    }
}
