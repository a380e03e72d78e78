use super::validation::expand_opt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MailConfig {
    /// Pre-issued bearer token; takes precedence over any OAuth settings.
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
    #[serde(default)]
    pub graph_base_url: Option<String>,
    #[serde(default)]
    pub authority: Option<String>,
    #[serde(default)]
    pub token_cache: Option<String>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl MailConfig {
    pub(super) fn expand(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        expand_opt(&mut self.access_token, lookup);
        expand_opt(&mut self.client_id, lookup);
        expand_opt(&mut self.client_secret, lookup);
        expand_opt(&mut self.tenant_id, lookup);
        expand_opt(&mut self.user_id, lookup);
        expand_opt(&mut self.token_cache, lookup);
    }
}
