//! System status dashboard command.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use threadcast_core::license::Authorizer;
use threadcast_infra::filesystem::database_path;
use threadcast_types::license::LicenseStatus;
use threadcast_types::run::PostingRun;

use crate::state::AppState;

/// Longest thread preview shown in the queue table.
const PREVIEW_CHARS: usize = 48;

/// Display the status dashboard: interrupted run, license, storage.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let live = state.orchestrator.status().await;
    let pending = state.persisted_run().await?;
    let driven_elsewhere = pending
        .as_ref()
        .is_some_and(|run| state.orchestrator.held_elsewhere(run));
    let record = state.license_service.record().await?;
    let license = state.license_service.validate().await;

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "posting": live,
            "interrupted_run": pending.as_ref().map(|run| serde_json::json!({
                "run_id": run.id,
                "status": run.status,
                "cursor": run.cursor,
                "total": run.total(),
                "posted": run.posted_count,
                "failed": run.failed_count,
                "target": run.target_handle,
                "driven_elsewhere": driven_elsewhere,
            })),
            "license": {
                "key": record.as_ref().map(|r| r.masked_key()),
                "status": license,
            },
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Threadcast v{}",
        style("⚡").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!("  {}", style("── Posting ──").dim());
    match &pending {
        Some(run) => print_pending(run, driven_elsewhere),
        None if live.is_posting => {
            println!("  {}  {}/{}", style("Progress:").bold(), live.posted + live.failed, live.total);
            println!("  {}  {}", style("State:").bold(), live.message);
        }
        None => println!("  {}", style("No run in progress").dim()),
    }
    println!();

    println!("  {}", style("── License ──").dim());
    match &record {
        Some(record) => println!("  Key:      {}", style(record.masked_key()).cyan()),
        None => println!("  Key:      {}", style("not activated").yellow()),
    }
    println!("  Status:   {}", format_license(&license));
    println!();

    println!("  {}", style("── Storage ──").dim());
    println!("  Data dir: {}", style(state.data_dir.display()).dim());
    println!(
        "  Database: {}",
        style(database_path(&state.data_dir).display()).dim()
    );
    println!("  Bridge:   {}", style(&state.config.bridge.base_url).dim());
    println!();

    Ok(())
}

fn print_pending(run: &PostingRun, driven_elsewhere: bool) {
    let label = if driven_elsewhere {
        "Run in another process"
    } else {
        "Interrupted run"
    };
    println!(
        "  {} {} {} ({})",
        style("!").yellow().bold(),
        label,
        style(run.id.to_string()).dim(),
        run.status
    );
    println!(
        "  Progress: {}/{}  ({} posted, {} failed)",
        run.cursor,
        run.total(),
        style(run.posted_count).green(),
        style(run.failed_count).red()
    );
    println!("  Target:   {}", style(&run.target_handle).cyan());
    println!();

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Thread").fg(Color::White),
        Cell::new("Preview").fg(Color::White),
    ]);
    for (index, item) in run.items.iter().enumerate().skip(run.cursor) {
        table.add_row(vec![
            Cell::new(index + 1).fg(Color::DarkGrey),
            Cell::new(&item.id).fg(Color::Cyan),
            Cell::new(item.preview(PREVIEW_CHARS)),
        ]);
    }
    println!("{table}");
    if !driven_elsewhere {
        println!(
            "  Continue with {}",
            style("tcast resume").yellow()
        );
    }
}

fn format_license(status: &LicenseStatus) -> String {
    match status {
        LicenseStatus::Valid { expires_at: Some(expiry) } => format!(
            "{} (expires {})",
            style("valid").green(),
            expiry.format("%Y-%m-%d")
        ),
        LicenseStatus::Valid { expires_at: None } => style("valid").green().to_string(),
        LicenseStatus::Grace { until } => format!(
            "{} (server unreachable, accepted until {})",
            style("grace").yellow(),
            until.format("%Y-%m-%d %H:%M UTC")
        ),
        LicenseStatus::Invalid { reason } => {
            format!("{} ({reason})", style("invalid").red())
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn test_format_license_mentions_reason_and_expiry() {
        console::set_colors_enabled(false);
        let expiry = Utc.with_ymd_and_hms(2030, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(
            format_license(&LicenseStatus::Valid { expires_at: Some(expiry) }),
            "valid (expires 2030-01-02)"
        );
        assert_eq!(
            format_license(&LicenseStatus::invalid("no license activated")),
            "invalid (no license activated)"
        );
    }
}
