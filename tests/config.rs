use clap::Parser;
use mail2crm::cli::{Args, Command};
use mail2crm::config::{Config, FileConfig};
use mail2crm::error::Mail2CrmError;
use mail2crm::mail::{GraphAuth, Mailbox};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name: &str| vars.get(name).cloned()
}

fn base_env() -> Vec<(&'static str, &'static str)> {
    vec![
        ("GEMINI_API_KEY", "llm-key"),
        ("TWENTY_CRM_API_BASE_URL", "http://crm.local/rest"),
        ("TWENTY_CRM_API_KEY", "crm-key"),
        ("MS_GRAPH_ACCESS_TOKEN", "graph-token"),
    ]
}

fn args(argv: &[&str]) -> Args {
    Args::parse_from(argv)
}

#[test]
fn test_defaults_with_minimal_env() {
    let config = Config::resolve(&args(&["mail2crm", "run"]), FileConfig::default(), &env_of(&base_env())).unwrap();

    assert_eq!(config.llm_api_key, "llm-key");
    assert_eq!(config.llm_model, "gemini-2.0-flash");
    assert!(config.llm_endpoint.ends_with("/chat/completions"));
    assert_eq!(config.graph_auth, GraphAuth::Static("graph-token".to_string()));
    assert_eq!(config.mailbox, Mailbox::Me);
    assert_eq!(config.max_depth, 5);
    assert_eq!(config.retry.max_retries, 5);
    assert_eq!(config.retry.initial_delay, Duration::from_secs(1));
}

#[test]
fn test_missing_llm_key_is_a_config_error() {
    let env: Vec<_> = base_env()
        .into_iter()
        .filter(|(k, _)| *k != "GEMINI_API_KEY")
        .collect();
    let err = Config::resolve(&args(&["mail2crm", "run"]), FileConfig::default(), &env_of(&env)).unwrap_err();
    assert!(matches!(err, Mail2CrmError::Config(message) if message.contains("LLM_API_KEY")));
}

#[test]
fn test_cli_overrides_env_overrides_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mail2crm.yaml");
    fs::write(
        &path,
        r#"
llm:
  model: file-model
  endpoint: http://file.local/v1
crm:
  api_key: ${CRM_SECRET}
agent:
  max_depth: 7
  max_retries: 2
  initial_delay_ms: 250
"#,
    )
    .unwrap();

    let mut env = base_env();
    env.retain(|(k, _)| *k != "TWENTY_CRM_API_KEY");
    env.push(("CRM_SECRET", "from-file-secret"));
    env.push(("LLM_MODEL", "env-model"));
    env.push(("MAIL2CRM_MAX_RETRIES", "9"));
    let env = env_of(&env);

    let file = FileConfig::load(Some(path.as_path()), &env).unwrap();
    let config = Config::resolve(
        &args(&["mail2crm", "--model", "cli-model", "run", "--max-depth", "3"]),
        file,
        &env,
    )
    .unwrap();

    assert_eq!(config.llm_model, "cli-model");
    assert_eq!(config.llm_endpoint, "http://file.local/v1/chat/completions");
    assert_eq!(config.crm_api_key, "from-file-secret");
    assert_eq!(config.max_depth, 3);
    assert_eq!(config.retry.max_retries, 9);
    assert_eq!(config.retry.initial_delay, Duration::from_millis(250));
}

#[test]
fn test_client_secret_selects_application_auth() {
    let mut env: Vec<_> = base_env()
        .into_iter()
        .filter(|(k, _)| *k != "MS_GRAPH_ACCESS_TOKEN")
        .collect();
    env.push(("MS_GRAPH_CLIENT_ID", "app-id"));
    env.push(("MS_GRAPH_CLIENT_SECRET", "secret"));
    env.push(("MS_GRAPH_TENANT_ID", "tenant-1"));

    let err = Config::resolve(&args(&["mail2crm", "run"]), FileConfig::default(), &env_of(&env)).unwrap_err();
    assert!(matches!(err, Mail2CrmError::Config(_)));

    env.push(("MS_GRAPH_USER_ID", "u-42"));
    let config = Config::resolve(&args(&["mail2crm", "run"]), FileConfig::default(), &env_of(&env)).unwrap();
    assert_eq!(
        config.graph_auth,
        GraphAuth::ClientCredentials {
            tenant: "tenant-1".to_string(),
            client_id: "app-id".to_string(),
            client_secret: "secret".to_string(),
        }
    );
    assert_eq!(config.mailbox, Mailbox::User("u-42".to_string()));
}

#[test]
fn test_client_id_alone_selects_device_login() {
    let mut env: Vec<_> = base_env()
        .into_iter()
        .filter(|(k, _)| *k != "MS_GRAPH_ACCESS_TOKEN")
        .collect();
    env.push(("MS_GRAPH_CLIENT_ID", "app-id"));

    let config = Config::resolve(&args(&["mail2crm", "queue"]), FileConfig::default(), &env_of(&env)).unwrap();
    assert_eq!(
        config.graph_auth,
        GraphAuth::DeviceCode {
            tenant: "common".to_string(),
            client_id: "app-id".to_string(),
            scopes: vec!["Mail.ReadWrite".to_string()],
        }
    );
}

#[test]
fn test_invalid_numeric_env_is_rejected() {
    let mut env = base_env();
    env.push(("MAIL2CRM_MAX_DEPTH", "many"));
    let err = Config::resolve(&args(&["mail2crm", "run"]), FileConfig::default(), &env_of(&env)).unwrap_err();
    assert!(matches!(err, Mail2CrmError::Config(message) if message.contains("MAIL2CRM_MAX_DEPTH")));
}

#[test]
fn test_json_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mail2crm.json");
    fs::write(&path, r#"{ "mail": { "user_id": "u-1", "page_size": 50 } }"#).unwrap();

    let env = env_of(&base_env());
    let file = FileConfig::load(Some(path.as_path()), &env).unwrap();
    let config = Config::resolve(&args(&["mail2crm", "run"]), file, &env).unwrap();

    assert_eq!(config.mailbox, Mailbox::User("u-1".to_string()));
    assert_eq!(config.page_size, Some(50));
}

#[test]
fn test_explicit_missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let env = env_of(&[]);
    assert!(FileConfig::load(Some(dir.path().join("nope.yaml").as_path()), &env).is_err());
}

#[test]
fn test_zero_watch_interval_is_rejected() {
    assert!(Args::try_parse_from(["mail2crm", "run", "--watch", "0"]).is_err());
    let watching = Args::try_parse_from(["mail2crm", "run", "--watch", "30"]).unwrap();
    assert!(matches!(watching.command, Command::Run { watch: Some(30), .. }));
}

#[test]
fn test_review_settings_need_no_llm_or_graph_credentials() {
    let file = FileConfig::default();
    let env = env_of(&[
        ("TWENTY_CRM_API_BASE_URL", "http://crm.local/rest"),
        ("TWENTY_CRM_API_KEY", "crm-key"),
        ("MAIL2CRM_REVIEW_QUEUE", "/tmp/queue.json"),
    ]);

    assert_eq!(file.review_queue_path(&env), PathBuf::from("/tmp/queue.json"));
    assert_eq!(
        file.review_queue_path(&env_of(&[])),
        PathBuf::from("review_queue.json")
    );
    assert_eq!(
        file.crm_credentials(&env).unwrap(),
        ("http://crm.local/rest".to_string(), "crm-key".to_string())
    );
    assert!(matches!(
        file.crm_credentials(&env_of(&[])).unwrap_err(),
        Mail2CrmError::Config(message) if message.contains("TWENTY_CRM_API_BASE_URL")
    ));
}
