//! Terminal rendering of run notifications.
//!
//! `EventPrinter` consumes an [`EventBus`](ravel_core::event::EventBus)
//! subscription on its own task and prints one line per settled event.
//! Running text updates are skipped; only closed streams are printed.

use console::style;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use ravel_core::agent::{RunOutcome, RunReport};
use ravel_types::event::AgentEvent;

/// Maximum characters of tool params/output shown per line.
const PREVIEW_CHARS: usize = 160;

pub struct EventPrinter;

impl EventPrinter {
    /// Print events until the bus closes.
    pub fn spawn(mut rx: broadcast::Receiver<AgentEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Some(line) = format_event(&event) {
                            println!("{line}");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        println!("  {}", style(format!("... {skipped} events skipped")).dim());
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

/// One display line for an event, or `None` for in-progress updates.
pub fn format_event(event: &AgentEvent) -> Option<String> {
    match event {
        AgentEvent::Text { text, done: true, .. } => {
            Some(format!("  {} {}", style("assistant").cyan().bold(), text))
        }
        AgentEvent::Thinking { text, done: true, .. } => {
            Some(format!("  {} {}", style("thinking").magenta(), style(text).dim()))
        }
        AgentEvent::ToolUse {
            tool_name, params, ..
        } => Some(format!(
            "  {} {}({})",
            style("->").yellow(),
            style(tool_name).bold(),
            preview(&params.to_string())
        )),
        AgentEvent::ToolResult {
            tool_name,
            output,
            is_error,
            ..
        } => {
            let marker = if *is_error {
                style("<-").red()
            } else {
                style("<-").green()
            };
            Some(format!(
                "  {marker} {} {}",
                style(tool_name).bold(),
                preview(&output.to_text())
            ))
        }
        AgentEvent::File { media_type, data, .. } => Some(format!(
            "  {} {media_type} ({} bytes)",
            style("file").blue(),
            data.len()
        )),
        AgentEvent::Error { error, .. } => {
            Some(format!("  {} {error}", style("error").red().bold()))
        }
        AgentEvent::Finish {
            finish_reason,
            usage,
            ..
        } => Some(format!(
            "  {}",
            style(format!(
                "step finished: {finish_reason}, {} tokens",
                usage.total_tokens
            ))
            .dim()
        )),
        AgentEvent::Text { .. } | AgentEvent::Thinking { .. } | AgentEvent::ToolStreaming { .. } => {
            None
        }
    }
}

/// Final summary printed after a run.
pub fn print_report(report: &RunReport) {
    let label = match &report.outcome {
        RunOutcome::Completed(_) => style("completed").green().bold(),
        RunOutcome::Stopped(_) => style("stopped").yellow().bold(),
        RunOutcome::Unfinished => style("unfinished").red().bold(),
    };
    println!();
    println!("  {label} {}", report.outcome.text());
    println!(
        "  {}",
        style(format!(
            "{} steps, {} tokens ({} prompt / {} completion), {} tool errors",
            report.steps,
            report.usage.total_tokens,
            report.usage.prompt_tokens,
            report.usage.completion_tokens,
            report.total_tool_errors
        ))
        .dim()
    );
}

fn preview(text: &str) -> String {
    let flat = text.replace('\n', " ");
    match flat.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}
