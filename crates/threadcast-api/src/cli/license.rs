//! License CLI commands: activate, status, deactivate.

use anyhow::{Context, Result};
use console::style;
use secrecy::{ExposeSecret, SecretString};
use threadcast_core::license::Authorizer;
use threadcast_types::license::LicenseStatus;

use crate::state::AppState;

/// Verify `key` remotely and store it.
pub async fn activate(state: &AppState, key: SecretString, json: bool) -> Result<()> {
    let record = state
        .license_service
        .activate(key.expose_secret().trim())
        .await
        .context("license activation failed")?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "activated": true,
                "key": record.masked_key(),
                "expires_at": record.expires_at,
            })
        );
        return Ok(());
    }

    println!();
    println!(
        "  {} License {} activated",
        style("✓").green().bold(),
        style(record.masked_key()).cyan()
    );
    if let Some(expiry) = record.expires_at {
        println!("  {}  {}", style("Expires:").bold(), expiry.format("%Y-%m-%d"));
    }
    println!();
    Ok(())
}

/// Show the stored key and force a remote check.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let record = state.license_service.record().await?;
    let status = match &record {
        Some(_) => state.license_service.revalidate().await,
        None => LicenseStatus::invalid("no license activated"),
    };

    if json {
        let value = serde_json::json!({
            "key": record.as_ref().map(|r| r.masked_key()),
            "activated_at": record.as_ref().map(|r| r.activated_at),
            "last_verified_at": record.as_ref().map(|r| r.last_verified_at),
            "status": status,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    let Some(record) = record else {
        println!(
            "  {} No license activated. Add one with: {}",
            style("!").yellow().bold(),
            style("tcast license activate --key <KEY>").yellow()
        );
        println!();
        return Ok(());
    };

    println!("  {}  {}", style("Key:").bold(), style(record.masked_key()).cyan());
    println!(
        "  {}  {}",
        style("Activated:").bold(),
        record.activated_at.format("%Y-%m-%d %H:%M UTC")
    );
    match status {
        LicenseStatus::Valid { expires_at } => {
            let expiry = expires_at
                .map(|e| format!(" until {}", e.format("%Y-%m-%d")))
                .unwrap_or_default();
            println!("  {}  {}{}", style("Status:").bold(), style("valid").green(), expiry);
        }
        LicenseStatus::Grace { until } => println!(
            "  {}  {} (license server unreachable; accepted until {})",
            style("Status:").bold(),
            style("grace").yellow(),
            until.format("%Y-%m-%d %H:%M UTC")
        ),
        LicenseStatus::Invalid { reason } => println!(
            "  {}  {} ({reason})",
            style("Status:").bold(),
            style("invalid").red()
        ),
    }
    println!();
    Ok(())
}

/// Remove the stored license.
pub async fn deactivate(state: &AppState, json: bool) -> Result<()> {
    state.license_service.deactivate().await?;

    if json {
        println!("{}", serde_json::json!({ "deactivated": true }));
    } else {
        println!();
        println!("  {} License removed", style("✓").green().bold());
        println!();
    }
    Ok(())
}
