//! CLI command definitions for the `tcast` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod license;
pub mod post;
pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Post thread lists to a target surface with human-like pacing.
#[derive(Parser)]
#[command(name = "tcast", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as newline-delimited JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Post every thread in a JSON file to a target, one at a time.
    Post {
        /// Thread list: a JSON array or `{"threads": [...]}`.
        file: PathBuf,

        /// Target surface handle (e.g. the bridge's tab id).
        #[arg(short, long)]
        target: String,

        /// Lower bound of the wait before each thread.
        #[arg(long)]
        min_delay_ms: Option<u64>,

        /// Upper bound of the wait before each thread.
        #[arg(long)]
        max_delay_ms: Option<u64>,
    },

    /// Continue a run interrupted by a previous process.
    Resume,

    /// Show posting, license and storage status.
    Status,

    /// Manage the license key.
    License {
        #[command(subcommand)]
        action: LicenseAction,
    },

    /// Start the REST API server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum LicenseAction {
    /// Verify a key with the license server and store it.
    Activate {
        /// License key.
        #[arg(long, env = "THREADCAST_LICENSE_KEY", hide_env_values = true)]
        key: String,
    },

    /// Show the stored license and whether it currently authorizes posting.
    Status,

    /// Forget the stored license.
    Deactivate,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_post_with_overrides() {
        let cli = Cli::parse_from([
            "tcast",
            "-vv",
            "post",
            "threads.json",
            "--target",
            "tab-7",
            "--min-delay-ms",
            "500",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Post {
                file,
                target,
                min_delay_ms,
                max_delay_ms,
            } => {
                assert_eq!(file, PathBuf::from("threads.json"));
                assert_eq!(target, "tab-7");
                assert_eq!(min_delay_ms, Some(500));
                assert_eq!(max_delay_ms, None);
            }
            _ => panic!("expected post command"),
        }
    }

    #[test]
    fn test_post_requires_target() {
        assert!(Cli::try_parse_from(["tcast", "post", "threads.json"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["tcast", "status", "--json", "--quiet"]);
        assert!(cli.json);
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn test_license_activate_takes_key() {
        let cli = Cli::parse_from(["tcast", "license", "activate", "--key", "ABCD-1234"]);
        match cli.command {
            Commands::License {
                action: LicenseAction::Activate { key },
            } => assert_eq!(key, "ABCD-1234"),
            _ => panic!("expected license activate"),
        }
    }
}
