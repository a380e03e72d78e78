use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use mail2crm::api::ChatClient;
use mail2crm::cli::{Args, Command, LogFormat, ReviewAction};
use mail2crm::config::{process_env, Config, FileConfig};
use mail2crm::crm::{CrmApi, TwentyClient};
use mail2crm::mail::{FileTokenCache, GraphClient, MailApi, TokenSource};
use mail2crm::retry::TokioSleeper;
use mail2crm::review::{approve_item, ReviewQueue};
use mail2crm::tools::ToolRegistry;
use mail2crm::ui::{
    display_error, display_report, display_review_items, display_run_summary, display_tool_calls,
};
use mail2crm::{run_inbox_with, EmailAgent};

fn init_logging(args: &Args) {
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match args.log_format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(&args);

    if let Err(e) = run(args).await {
        display_error(&format!("{:#}", e));
        process::exit(1);
    }
}

struct Backends {
    crm: Arc<dyn CrmApi>,
    mail: Arc<dyn MailApi>,
}

fn connect(config: &Config) -> Result<Backends> {
    let crm = TwentyClient::new(&config.crm_base_url, &config.crm_api_key)?;

    let tokens = TokenSource::new(
        config.graph_auth.clone(),
        config.authority.clone(),
        Arc::new(FileTokenCache::new(config.token_cache.clone())),
        Arc::new(TokioSleeper),
    )?;
    let mut mail = GraphClient::new(&config.graph_base_url, config.mailbox.clone(), tokens)?;
    if let Some(page_size) = config.page_size {
        mail = mail.with_page_size(page_size);
    }

    Ok(Backends {
        crm: Arc::new(crm),
        mail: Arc::new(mail),
    })
}

fn build_agent(config: &Config, backends: &Backends) -> Result<EmailAgent> {
    let model = ChatClient::new(
        &config.llm_api_key,
        config.llm_endpoint.clone(),
        config.llm_model.clone(),
    )?;
    let registry = ToolRegistry::with_backends(backends.crm.clone(), backends.mail.clone())?;

    let mut agent = EmailAgent::new(Arc::new(model), Arc::new(registry))
        .with_retry_policy(config.retry)
        .with_max_depth(config.max_depth);
    if let Some(prompt) = &config.system_prompt {
        agent = agent.with_system_prompt(prompt.clone());
    }
    Ok(agent)
}

fn load_config(args: &Args) -> Result<Config> {
    let config = Config::from_env_and_args(args).context("failed to load configuration")?;
    tracing::debug!(model = %config.llm_model, endpoint = %config.llm_endpoint, "configuration loaded");
    Ok(config)
}

async fn run(args: Args) -> Result<()> {
    match &args.command {
        Command::Run { watch, .. } => {
            let config = load_config(&args)?;
            let backends = connect(&config)?;
            let agent = build_agent(&config, &backends)?;
            match watch {
                Some(secs) => watch_inbox(&backends, &agent, Duration::from_secs(*secs)).await,
                None => process_once(&backends, &agent).await,
            }
        }
        Command::Queue => {
            let config = load_config(&args)?;
            let backends = connect(&config)?;
            let emails = backends.mail.get_unread_emails().await?;
            let mut queue = ReviewQueue::load(&config.review_queue);
            let added = queue.enqueue(&emails);
            if added > 0 {
                queue.save()?;
            }
            println!(
                "{} {} new item(s), {} in queue ({})",
                "Queued".green(),
                added,
                queue.items().len(),
                queue.path().display()
            );
            Ok(())
        }
        Command::Review { action } => {
            let file = FileConfig::from_args(&args).context("failed to load configuration")?;
            review(&file, action).await
        }
        Command::Tools => {
            println!(
                "{}",
                serde_json::to_string_pretty(&ToolRegistry::declarations()?)?
            );
            Ok(())
        }
    }
}

async fn process_once(backends: &Backends, agent: &EmailAgent) -> Result<()> {
    let summary = run_inbox_with(backends.mail.as_ref(), agent, |report| {
        display_report(report);
        display_tool_calls(report);
    })
    .await?;
    display_run_summary(&summary);
    Ok(())
}

async fn watch_inbox(backends: &Backends, agent: &EmailAgent, every: Duration) -> Result<()> {
    tracing::info!(
        interval_secs = every.as_secs(),
        max_depth = agent.max_depth(),
        "watching inbox"
    );
    let mut ticker = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match run_inbox_with(backends.mail.as_ref(), agent, display_report).await {
                    Ok(summary) => display_run_summary(&summary),
                    Err(e) => tracing::error!(error = %e, "inbox pass failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("stopping");
                return Ok(());
            }
        }
    }
}

async fn review(file: &FileConfig, action: &ReviewAction) -> Result<()> {
    let mut queue = ReviewQueue::load(file.review_queue_path(&process_env));
    match action {
        ReviewAction::List => {
            display_review_items(queue.items());
            Ok(())
        }
        ReviewAction::Approve { id } => {
            let item = queue
                .get(id)
                .cloned()
                .with_context(|| format!("no review item with id {}", id))?;
            let (base_url, api_key) = file.crm_credentials(&process_env)?;
            let crm = TwentyClient::new(&base_url, &api_key)?;
            approve_item(&crm, &item).await?;
            queue.take(id);
            queue.save()?;
            println!("{} {}", "Pushed to CRM:".green(), item.email_subject);
            Ok(())
        }
        ReviewAction::Reject { id } => {
            if !queue.reject(id) {
                anyhow::bail!("no review item with id {}", id);
            }
            queue.save()?;
            println!("{} {}", "Item rejected:".yellow(), id);
            Ok(())
        }
    }
}
