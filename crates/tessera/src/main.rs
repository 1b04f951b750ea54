// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tessera - operator CLI for the plugin host.
//!
//! Inspects the effective plugin type table, validates plugin manifests,
//! administers the persisted capability grant store, and dry-runs
//! capability checks against it.

mod check;
mod grants;
mod types;
mod validate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tessera_core::CapabilityKind;

/// Tessera - operator CLI for the plugin host.
#[derive(Parser, Debug)]
#[command(name = "tessera", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON instead of human-readable output.
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the effective plugin type table.
    Types,
    /// Parse a plugin manifest and check it against this host.
    Validate {
        /// Path to a plugin.toml file.
        manifest: PathBuf,
    },
    /// Administer persisted capability grants.
    Grants {
        #[command(subcommand)]
        action: GrantsAction,
    },
    /// Check whether a plugin's grant allows a privileged request.
    Check {
        plugin_id: String,
        /// One of: permission, file_read, file_write, network, exec.
        kind: CapabilityKind,
        /// Permission name, path, command, or host:port.
        detail: String,
    },
}

#[derive(Subcommand, Debug)]
enum GrantsAction {
    /// List every persisted grant.
    List,
    /// Show the grant for one plugin.
    Show { plugin_id: String },
    /// Create or replace the grant for one plugin.
    Grant {
        plugin_id: String,
        /// Generic permission name (repeatable).
        #[arg(long = "permission")]
        permissions: Vec<String>,
        /// Readable path pattern (repeatable).
        #[arg(long = "read")]
        read: Vec<String>,
        /// Writable path pattern (repeatable).
        #[arg(long = "write")]
        write: Vec<String>,
        /// Allow outbound network connections.
        #[arg(long)]
        network: bool,
        /// Allow command execution.
        #[arg(long)]
        exec: bool,
    },
    /// Remove the grant for one plugin.
    Revoke { plugin_id: String },
}

/// Output switches shared by every command.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Output {
    pub json: bool,
    pub color: bool,
}

fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => tessera_config::load_and_validate_path(path),
        None => tessera_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            tessera_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.host.log_level);

    let output = Output {
        json: cli.json,
        color: !cli.plain && std::io::IsTerminal::is_terminal(&std::io::stdout()),
    };

    let result = match cli.command {
        Some(Commands::Types) => types::run_types(&config, output),
        Some(Commands::Validate { manifest }) => validate::run_validate(&config, &manifest, output),
        Some(Commands::Grants { action }) => match action {
            GrantsAction::List => grants::run_list(&config, output),
            GrantsAction::Show { plugin_id } => grants::run_show(&config, &plugin_id, output),
            GrantsAction::Grant {
                plugin_id,
                permissions,
                read,
                write,
                network,
                exec,
            } => {
                let grant = grants::build_grant(permissions, read, write, network, exec);
                grants::run_grant(&config, &plugin_id, grant)
            }
            GrantsAction::Revoke { plugin_id } => grants::run_revoke(&config, &plugin_id),
        },
        Some(Commands::Check {
            plugin_id,
            kind,
            detail,
        }) => check::run_check(&config, &plugin_id, kind, &detail, output),
        None => {
            println!("tessera: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tessera={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
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
    fn parses_check_command() {
        let cli = Cli::try_parse_from(["tessera", "check", "ocr-demo", "file_read", "/data/a.png"]).unwrap();
        match cli.command {
            Some(Commands::Check { plugin_id, kind, detail }) => {
                assert_eq!(plugin_id, "ocr-demo");
                assert_eq!(kind, CapabilityKind::FileRead);
                assert_eq!(detail, "/data/a.png");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_repeatable_grant_flags() {
        let cli = Cli::try_parse_from([
            "tessera", "grants", "grant", "ocr-demo", "--read", "/data/**", "--read", "/tmp/*",
            "--permission", "ocr.recognize", "--network",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Grants {
                action: GrantsAction::Grant { read, permissions, network, exec, .. },
            }) => {
                assert_eq!(read, vec!["/data/**", "/tmp/*"]);
                assert_eq!(permissions, vec!["ocr.recognize"]);
                assert!(network);
                assert!(!exec);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_capability_kind() {
        assert!(Cli::try_parse_from(["tessera", "check", "x", "teleport", "y"]).is_err());
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = tessera_config::load_and_validate_str("").expect("default config should be valid");
        assert_eq!(config.host.name, "tessera");
    }
}
