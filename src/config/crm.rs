use super::validation::expand_opt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CrmConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl CrmConfig {
    pub(super) fn expand(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        expand_opt(&mut self.base_url, lookup);
        expand_opt(&mut self.api_key, lookup);
    }
}
