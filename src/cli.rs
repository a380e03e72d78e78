use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mail2crm")]
#[command(about = "Turn unread mailbox messages into CRM updates with an LLM agent", long_about = None)]
pub struct Args {
    #[arg(long, global = true, help = "Path to a YAML or JSON config file")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        long = "log-format",
        global = true,
        value_enum,
        default_value_t = LogFormat::Compact,
        help = "Log output format"
    )]
    pub log_format: LogFormat,

    #[arg(
        long = "api-endpoint",
        global = true,
        help = "Custom LLM API base URL (e.g., http://localhost:11434/v1)"
    )]
    pub api_endpoint: Option<String>,

    #[arg(long, global = true, help = "LLM model name")]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Process unread emails with the agent
    Run {
        #[arg(long = "max-depth", help = "Maximum tool rounds per email")]
        max_depth: Option<usize>,

        #[arg(
            long,
            value_name = "SECS",
            value_parser = clap::value_parser!(u64).range(1..),
            help = "Keep polling the inbox every SECS seconds"
        )]
        watch: Option<u64>,
    },

    /// Fetch unread emails into the review queue
    Queue,

    /// Inspect and act on the review queue
    Review {
        #[command(subcommand)]
        action: ReviewAction,
    },

    /// Print the tool declarations sent to the model
    Tools,
}

#[derive(Subcommand, Debug)]
pub enum ReviewAction {
    /// List queued items
    List,
    /// Push an item to the CRM and remove it from the queue
    Approve { id: String },
    /// Drop an item from the queue
    Reject { id: String },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl Args {
    /// `--max-depth` when running the agent.
    pub fn max_depth(&self) -> Option<usize> {
        match &self.command {
            Command::Run { max_depth, .. } => *max_depth,
            _ => None,
        }
    }
}
