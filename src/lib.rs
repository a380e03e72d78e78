pub mod agent;
pub mod api;
pub mod cli;
pub mod config;
pub mod crm;
pub mod error;
pub mod mail;
pub mod models;
pub mod prompts;
pub mod retry;
pub mod review;
pub mod tools;
pub mod ui;

pub use agent::{run_inbox, run_inbox_with, EmailAgent, Outcome, ProcessReport, RunSummary};
pub use error::{Mail2CrmError, Result};
