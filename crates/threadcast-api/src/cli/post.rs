//! Posting CLI commands: post, resume.
//!
//! Both run the orchestrator in-process with a session guardian beside it
//! and follow the event bus until the run's completion event arrives.
//! Ctrl+C requests a user stop; the command still waits for completion so
//! the summary reflects what was actually posted.

use std::path::Path;

use anyhow::{Result, bail};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use threadcast_core::posting::orchestrator::{MSG_STOPPING, ResumeOutcome};
use threadcast_infra::filesystem::load_thread_file;
use threadcast_types::error::StartError;
use threadcast_types::event::PostingEvent;
use threadcast_types::run::{RunSummary, TargetHandle};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::state::AppState;

/// Output switches shared by the posting commands.
#[derive(Debug, Clone, Copy)]
pub struct OutputMode {
    pub json: bool,
    pub quiet: bool,
}

/// Post every thread in `file` to `target`.
pub async fn post(
    state: &AppState,
    file: &Path,
    target: String,
    min_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    output: OutputMode,
) -> Result<()> {
    let items = load_thread_file(file, &state.hasher).await?;
    let window = state.delay_window(min_delay_ms, max_delay_ms);

    let events = state.orchestrator.events().subscribe();
    let accepted = match state
        .orchestrator
        .start(items, window, TargetHandle::new(target.clone()))
        .await
    {
        Ok(accepted) => accepted,
        Err(StartError::ResumePending) => {
            let progress = state
                .persisted_run()
                .await?
                .map(|run| format!(" ({} of {} resolved)", run.cursor, run.total()))
                .unwrap_or_default();
            bail!("an interrupted run{progress} is waiting; continue it with `tcast resume`");
        }
        Err(StartError::AlreadyRunning) => {
            bail!("another tcast process is already posting; check it with `tcast status`");
        }
        Err(e) => return Err(e.into()),
    };

    if !output.json && !output.quiet {
        println!();
        println!(
            "  {} Posting {} threads to {}",
            style("▶").cyan().bold(),
            style(accepted.total).bold(),
            style(&target).cyan()
        );
        if accepted.duplicates_dropped > 0 {
            println!(
                "  {} {} duplicate threads skipped",
                style("!").yellow().bold(),
                accepted.duplicates_dropped
            );
        }
        println!(
            "  {}",
            style(format!(
                "Waiting {}-{} ms between threads. Press Ctrl+C to stop.",
                window.min_ms, window.max_ms
            ))
            .dim()
        );
        println!();
    }

    let summary = supervise(state, events, accepted.run_id, accepted.total, output).await?;
    print_summary(&summary, output)
}

/// Continue the run persisted by a previous process.
pub async fn resume(state: &AppState, output: OutputMode) -> Result<()> {
    let total = state.persisted_run().await?.map(|run| run.total()).unwrap_or(0);
    let events = state.orchestrator.events().subscribe();
    let outcome = state.orchestrator.resume_if_needed().await?;

    match outcome {
        ResumeOutcome::HeldElsewhere { run_id } => {
            if output.json {
                println!(
                    "{}",
                    serde_json::json!({ "resumed": false, "run_id": run_id, "reason": "held_elsewhere" })
                );
            } else if !output.quiet {
                println!();
                println!(
                    "  {} Run {} is being posted by another tcast process.",
                    style("!").yellow().bold(),
                    style(run_id.to_string()).dim()
                );
                println!();
            }
            Ok(())
        }
        ResumeOutcome::NothingToResume | ResumeOutcome::AlreadyRunning => {
            if output.json {
                println!("{}", serde_json::json!({ "resumed": false }));
            } else if !output.quiet {
                println!();
                println!("  {}", style("Nothing to resume.").dim());
                println!();
            }
            Ok(())
        }
        ResumeOutcome::Abandoned { run_id, reason } => {
            if output.json {
                println!(
                    "{}",
                    serde_json::json!({ "resumed": false, "run_id": run_id, "reason": reason })
                );
            } else if !output.quiet {
                println!();
                println!(
                    "  {} Interrupted run {} could not continue: {}",
                    style("✗").red().bold(),
                    style(run_id.to_string()).dim(),
                    reason
                );
                println!();
            }
            Ok(())
        }
        ResumeOutcome::Resumed { run_id, cursor } => {
            if !output.json && !output.quiet {
                println!();
                println!(
                    "  {} Resuming run at thread {} of {}",
                    style("▶").cyan().bold(),
                    cursor + 1,
                    total
                );
                println!();
            }
            let summary = supervise(state, events, run_id, total, output).await?;
            print_summary(&summary, output)
        }
    }
}

/// Run the guardian beside the run and follow it to completion.
async fn supervise(
    state: &AppState,
    events: broadcast::Receiver<PostingEvent>,
    run_id: Uuid,
    total: usize,
    output: OutputMode,
) -> Result<RunSummary> {
    let shutdown = CancellationToken::new();
    let guardian = state.guardian().spawn(shutdown.clone());

    let result = follow_run(state, events, run_id, total, output).await;

    shutdown.cancel();
    if let Err(e) = guardian.await {
        tracing::warn!(error = %e, "session guardian task failed");
    }
    result
}

fn progress_bar(total: usize, output: OutputMode) -> Result<ProgressBar> {
    if output.json || output.quiet {
        return Ok(ProgressBar::hidden());
    }
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner:.cyan} [{bar:30.cyan/dim}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(std::time::Duration::from_millis(120));
    Ok(bar)
}

/// Render events for `run_id` until its completion event.
async fn follow_run(
    state: &AppState,
    mut events: broadcast::Receiver<PostingEvent>,
    run_id: Uuid,
    total: usize,
    output: OutputMode,
) -> Result<RunSummary> {
    let bar = progress_bar(total, output)?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stop_requested = false;

    loop {
        tokio::select! {
            signal = &mut ctrl_c, if !stop_requested => {
                stop_requested = true;
                if let Err(e) = signal {
                    tracing::warn!(error = %e, "failed to listen for Ctrl+C");
                    continue;
                }
                bar.set_message(MSG_STOPPING);
                if let Err(e) = state.orchestrator.stop().await {
                    tracing::debug!(error = %e, "stop after Ctrl+C had no run to stop");
                }
            }
            received = events.recv() => {
                let event = match received {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "progress display lagged behind the event bus");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        bar.abandon();
                        bail!("event bus closed before run {run_id} completed");
                    }
                };
                if event.run_id().is_some_and(|id| id != run_id) {
                    continue;
                }
                match event {
                    PostingEvent::Progress { posted, failed, next_post_in, message, .. } => {
                        bar.set_position((posted + failed) as u64);
                        if next_post_in > 0 {
                            bar.set_message(format!("{message} {next_post_in}s"));
                        } else {
                            bar.set_message(message);
                        }
                    }
                    PostingEvent::ThreadPosted { thread_id, index, attempts, .. } => {
                        let retries = if attempts > 1 {
                            format!(" after {attempts} attempts")
                        } else {
                            String::new()
                        };
                        bar.println(format!(
                            "  {} #{} {}{}",
                            style("✓").green(),
                            index + 1,
                            style(thread_id).dim(),
                            retries
                        ));
                    }
                    PostingEvent::ThreadFailed { thread_id, index, error, .. } => {
                        bar.println(format!(
                            "  {} #{} {} {}",
                            style("✗").red(),
                            index + 1,
                            style(thread_id).dim(),
                            style(error).red()
                        ));
                    }
                    PostingEvent::TargetLost { target, .. } => {
                        bar.println(format!(
                            "  {} Target {} is gone",
                            style("!").yellow().bold(),
                            style(target).cyan()
                        ));
                    }
                    PostingEvent::AuthorizationLost { reason, .. } => {
                        bar.println(format!(
                            "  {} License no longer valid: {}",
                            style("!").yellow().bold(),
                            reason
                        ));
                    }
                    PostingEvent::Completed(summary) => {
                        bar.finish_and_clear();
                        return Ok(summary);
                    }
                    PostingEvent::RunStarted { .. } => {}
                }
            }
        }
    }
}

/// Print a finished run.
pub fn print_summary(summary: &RunSummary, output: OutputMode) -> Result<()> {
    if output.json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    if output.quiet {
        return Ok(());
    }

    let headline = match summary.reason {
        None => format!("{} Run complete", style("✓").green().bold()),
        Some(reason) => format!("{} Run stopped ({reason})", style("■").yellow().bold()),
    };
    println!();
    println!("  {headline}");
    println!();
    println!("  {}  {}", style("Posted:").bold(), style(summary.posted).green());
    if summary.failed > 0 {
        println!("  {}  {}", style("Failed:").bold(), style(summary.failed).red());
    }
    let unresolved = summary.total.saturating_sub(summary.posted + summary.failed);
    if unresolved > 0 {
        println!("  {}  {}", style("Skipped:").bold(), unresolved);
    }
    println!(
        "  {}  {}",
        style("Took:").bold(),
        format_duration_ms(summary.duration_ms)
    );
    println!(
        "  {}  {}",
        style("Run:").bold(),
        style(summary.run_id.to_string()).dim()
    );
    println!();
    Ok(())
}

fn format_duration_ms(ms: u64) -> String {
    let secs = ms / 1000;
    match secs {
        0 => format!("{ms}ms"),
        1..=59 => format!("{secs}s"),
        60..=3599 => format!("{}m {}s", secs / 60, secs % 60),
        _ => format!("{}h {}m", secs / 3600, (secs % 3600) / 60),
    }
}
