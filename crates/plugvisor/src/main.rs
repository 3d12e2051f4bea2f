// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugvisor - a local plugin host.
//!
//! This is the binary entry point: it loads the host configuration, sets up
//! logging, and dispatches to the subcommands.

mod commands;
mod run;
mod shutdown;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// Plugvisor - discover plugins and supervise their instances.
#[derive(Parser, Debug)]
#[command(name = "plugvisor", version, about, long_about = None)]
struct Cli {
    /// Host configuration file to use instead of the standard locations.
    #[arg(long, global = true, value_name = "FILE")]
    host_config: Option<PathBuf>,

    /// Override `host.log_level` for this invocation.
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// List the plugins found in the configured scan directories.
    Discover {
        /// Print full definitions as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print one plugin definition as JSON.
    Show { plugin_id: String },
    /// Print the default configuration derived from a plugin's schema.
    Defaults { plugin_id: String },
    /// Validate a configuration document against a plugin's schema.
    Validate {
        plugin_id: String,
        config_file: PathBuf,
    },
    /// Run one plugin instance until interrupted or until it stops by itself.
    Run {
        plugin_id: String,
        /// Workspace the instance belongs to.
        #[arg(long, default_value = "default")]
        workspace: String,
        /// Configuration document for the instance. Defaults are derived
        /// from the plugin's schema when omitted.
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Reject the configuration if it does not satisfy the schema.
        #[arg(long)]
        validate: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match cli.host_config.as_deref() {
        Some(path) => plugvisor_config::load_and_validate_path(path),
        None => plugvisor_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            plugvisor_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(cli.log_level.as_deref().unwrap_or(&config.host.log_level));

    let result = match cli.command {
        Commands::Discover { json } => commands::discover(&config, json).await,
        Commands::Show { plugin_id } => commands::show(&config, &plugin_id).await,
        Commands::Defaults { plugin_id } => commands::defaults(&config, &plugin_id).await,
        Commands::Validate {
            plugin_id,
            config_file,
        } => commands::validate(&config, &plugin_id, &config_file).await,
        Commands::Run {
            plugin_id,
            workspace,
            config: config_file,
            validate,
        } => {
            run::run_instance(
                &config,
                run::RunOptions {
                    plugin_id,
                    workspace_id: workspace,
                    config_file,
                    validate,
                },
            )
            .await
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("plugvisor={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "plugvisor",
            "--host-config",
            "/etc/p.toml",
            "run",
            "calc",
            "--workspace",
            "ws1",
            "--config",
            "cfg.json",
            "--validate",
        ])
        .unwrap();
        assert_eq!(cli.host_config, Some(PathBuf::from("/etc/p.toml")));
        match cli.command {
            Commands::Run {
                plugin_id,
                workspace,
                config,
                validate,
            } => {
                assert_eq!(plugin_id, "calc");
                assert_eq!(workspace, "ws1");
                assert_eq!(config, Some(PathBuf::from("cfg.json")));
                assert!(validate);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn run_workspace_defaults() {
        let cli = Cli::try_parse_from(["plugvisor", "run", "calc"]).unwrap();
        assert!(matches!(cli.command, Commands::Run { ref workspace, .. } if workspace == "default"));
    }
}
