//! Threadcast CLI and REST API entry point.
//!
//! Binary name: `tcast`
//!
//! Parses CLI arguments, initializes database and services, then dispatches
//! to the appropriate command handler or starts the REST API server.

mod cli;
mod http;
mod state;

use anyhow::Context;
use clap::Parser;
use clap_complete::generate;
use secrecy::SecretString;
use threadcast_core::posting::orchestrator::ResumeOutcome;
use threadcast_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
use tokio_util::sync::CancellationToken;

use cli::post::OutputMode;
use cli::{Cli, Commands, LicenseAction};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = TracingOptions::from_verbosity(cli.verbose, cli.quiet)
        .with_json(cli.log_json)
        .with_otel(cli.otel);
    if let Err(e) = init_tracing(&options) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "tcast", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;
    let output = OutputMode {
        json: cli.json,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Post {
            file,
            target,
            min_delay_ms,
            max_delay_ms,
        } => {
            cli::post::post(&state, &file, target, min_delay_ms, max_delay_ms, output).await?;
        }

        Commands::Resume => {
            cli::post::resume(&state, output).await?;
        }

        Commands::Status => {
            cli::status::status(&state, cli.json).await?;
        }

        Commands::License { action } => match action {
            LicenseAction::Activate { key } => {
                cli::license::activate(&state, SecretString::from(key), cli.json).await?;
            }
            LicenseAction::Status => {
                cli::license::status(&state, cli.json).await?;
            }
            LicenseAction::Deactivate => {
                cli::license::deactivate(&state, cli.json).await?;
            }
        },

        Commands::Serve { port, host } => {
            serve(state, &host, port).await?;
        }

        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Run the REST API with the session guardian until Ctrl+C or SIGTERM.
async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    match state.orchestrator.resume_if_needed().await {
        Ok(ResumeOutcome::Resumed { run_id, cursor }) => {
            println!(
                "  {} Resumed interrupted run {} at thread {}",
                console::style("▶").cyan().bold(),
                console::style(run_id.to_string()).dim(),
                cursor + 1
            );
        }
        Ok(ResumeOutcome::Abandoned { run_id, reason }) => {
            tracing::warn!(%run_id, %reason, "interrupted run could not continue");
        }
        Ok(ResumeOutcome::HeldElsewhere { run_id }) => {
            tracing::warn!(%run_id, "posting run is driven by another process, not resuming");
        }
        Ok(ResumeOutcome::NothingToResume | ResumeOutcome::AlreadyRunning) => {}
        Err(e) => tracing::error!(error = %e, "failed to resume interrupted run"),
    }

    let shutdown = CancellationToken::new();
    let guardian = state.guardian().spawn(shutdown.clone());

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    println!(
        "  {} Threadcast API listening on {}",
        console::style("⚡").bold(),
        console::style(format!("http://{addr}")).cyan()
    );
    println!("  {}", console::style("Press Ctrl+C to stop").dim());

    let router = http::router::build_router(state.clone());
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    if let Err(e) = guardian.await {
        tracing::warn!(error = %e, "session guardian task failed");
    }
    // The persisted checkpoint lets the next `serve` or `resume` continue.
    if let Some((run_id, _)) = state.orchestrator.active_target().await {
        tracing::info!(%run_id, "leaving active run checkpointed for resume");
    }

    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
