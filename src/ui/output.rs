use crate::agent::{Outcome, ProcessReport, RunSummary};
use crate::models::Message;
use crate::review::ReviewItem;
use colored::*;

const PREVIEW_CHARS: usize = 80;

fn preview(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default().trim();
    if line.chars().count() > PREVIEW_CHARS {
        let cut: String = line.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        line.to_string()
    }
}

/// One line per email, plus the model's closing text when it finished.
pub fn display_report(report: &ProcessReport) {
    let header = format!(
        "[{}] {} model call(s), {} tool call(s)",
        report.email_id, report.llm_calls, report.tool_invocations
    );
    match &report.outcome {
        Outcome::Completed { text } => {
            println!("{} {}", "✓".green(), header);
            if !text.is_empty() {
                println!("  {}", preview(text).dimmed());
            }
        }
        Outcome::MaxIterationsReached => {
            println!("{} {} {}", "!".yellow(), header, "(tool limit reached)".yellow());
        }
    }
}

/// Tool calls the model made for one email, in order.
pub fn display_tool_calls(report: &ProcessReport) {
    for message in report.conversation.messages() {
        if let Message::Assistant { tool_calls, .. } = message {
            for call in tool_calls {
                println!("  {} {}({})", "→".cyan(), call.name().cyan(), call.function.arguments.dimmed());
            }
        }
    }
}

pub fn display_run_summary(summary: &RunSummary) {
    println!(
        "{} fetched: {}, completed: {}, tool limit: {}, failed: {}",
        "Inbox:".bold(),
        summary.fetched,
        summary.completed.to_string().green(),
        summary.exhausted.to_string().yellow(),
        summary.failed.to_string().red()
    );
}

pub fn display_review_items(items: &[ReviewItem]) {
    if items.is_empty() {
        println!("{}", "No items to review.".dimmed());
        return;
    }
    for item in items {
        println!(
            "{} {} from {} [{}]",
            item.id.bold(),
            item.email_subject,
            item.sender.cyan(),
            item.status
        );
        println!("  {}", preview(&item.note).dimmed());
    }
}

pub fn display_error(message: &str) {
    eprintln!("{} {}", "Error:".red(), message);
}
