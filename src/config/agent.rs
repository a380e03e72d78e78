use super::validation::expand_opt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub initial_delay_ms: Option<u64>,
    #[serde(default)]
    pub review_queue: Option<String>,
}

impl AgentConfig {
    pub(super) fn expand(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        expand_opt(&mut self.review_queue, lookup);
    }
}
