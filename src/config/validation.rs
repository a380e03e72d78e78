use regex::Regex;
use std::sync::OnceLock;

fn env_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex is valid"))
}

/// Expand `${VAR_NAME}` references. Unset variables are left as written.
pub fn expand_env_var_in_string(value: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    env_pattern()
        .replace_all(value, |caps: &regex::Captures| {
            lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

pub(super) fn expand_opt(value: &mut Option<String>, lookup: &dyn Fn(&str) -> Option<String>) {
    if let Some(v) = value.as_mut() {
        *v = expand_env_var_in_string(v, lookup);
    }
}

/// Point a base URL at its chat-completions route.
pub fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.ends_with("/chat/completions") {
        endpoint.to_string()
    } else {
        format!("{}/chat/completions", endpoint.trim_end_matches('/'))
    }
}
