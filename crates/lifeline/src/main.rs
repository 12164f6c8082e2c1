// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifeline - real-time help matching between victims, volunteers, and admins.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod shutdown;
mod users;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lifeline_config::{ConfigError, LifelineConfig};
use lifeline_core::Role;

/// Lifeline - real-time help matching between victims, volunteers, and admins.
#[derive(Parser, Debug)]
#[command(name = "lifeline", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the hub and the HTTP/WebSocket gateway.
    Serve,
    /// Manage the users table.
    User {
        #[command(subcommand)]
        action: UserCommands,
    },
    /// Manage Lifeline configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum UserCommands {
    /// Add or update a user.
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        /// victim, volunteer, or admin.
        #[arg(long)]
        role: Role,
    },
    /// List users, optionally filtered by role.
    List {
        #[arg(long)]
        role: Option<Role>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Validate configuration and report every problem found.
    Check,
}

fn load(path: Option<&PathBuf>) -> Result<LifelineConfig, Vec<ConfigError>> {
    match path {
        Some(path) => lifeline_config::load_and_validate_path(path),
        None => lifeline_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            lifeline_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::User { action }) => match action {
            UserCommands::Add { id, name, role } => {
                users::run_user_add(&config, &id, &name, role).await
            }
            UserCommands::List { role } => users::run_user_list(&config, role).await,
        },
        Some(Commands::Config {
            action: ConfigCommands::Check,
        }) => {
            println!(
                "lifeline: configuration is valid (gateway {}:{}, database {})",
                config.gateway.host, config.gateway.port, config.storage.database_path
            );
            Ok(())
        }
        None => {
            println!("lifeline: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
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
    fn user_add_parses_role() {
        let cli = Cli::try_parse_from([
            "lifeline", "user", "add", "--id", "vol1", "--name", "Olivia", "--role", "volunteer",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::User {
                action: UserCommands::Add { id, role, .. },
            }) => {
                assert_eq!(id, "vol1");
                assert_eq!(role, Role::Volunteer);
            }
            other => panic!("unexpected parse {other:?}"),
        }

        assert!(Cli::try_parse_from([
            "lifeline", "user", "add", "--id", "x", "--name", "X", "--role", "superuser",
        ])
        .is_err());
    }

    #[test]
    fn global_config_flag_is_accepted_after_subcommand() {
        let cli =
            Cli::try_parse_from(["lifeline", "config", "check", "--config", "/tmp/l.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/l.toml")));
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lifeline.toml");
        std::fs::write(&path, "[server]\nname = \"from-file\"\n").unwrap();
        let config = load(Some(&path)).unwrap();
        assert_eq!(config.server.name, "from-file");
    }
}
