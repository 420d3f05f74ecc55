//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Record users and games in `PostgreSQL` and local JSON documents.
#[derive(Debug, Parser)]
#[command(name = "capivara", version, about)]
pub struct Cli {
    /// Configuration file.
    #[arg(long, global = true, default_value = "capivara-config.yaml")]
    pub config: PathBuf,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show backend availability and record counts.
    Status,
    /// Manage users.
    #[command(subcommand)]
    User(UserCommand),
    /// Manage and simulate games.
    #[command(subcommand)]
    Game(GameCommand),
    /// Show the relational report queries.
    Report {
        /// Also run each query against the relational backend.
        #[arg(long)]
        run: bool,
    },
    /// Relational backend administration.
    #[command(subcommand)]
    Db(DbCommand),
    /// Show the audit log of relational statements.
    Log {
        /// Number of trailing characters to print.
        #[arg(long, default_value_t = 1500)]
        tail: usize,
    },
    /// Export users, games, and the audit log to a timestamped JSON file.
    Backup {
        /// Output directory (defaults to `storage.backup_dir`).
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Delete every user and game from the JSON documents.
    Reset {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

/// User commands.
#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// List users.
    List {
        /// Include inactive users.
        #[arg(long)]
        all: bool,
    },
    /// Register a user.
    Add(AddUserArgs),
    /// Find users by login, name, or email.
    Search {
        /// Case-insensitive substring.
        term: String,
    },
    /// Show user counts.
    Stats,
    /// Mark a user inactive.
    Deactivate {
        /// User identifier.
        id: u64,
    },
}

/// Fields for a new user.
#[derive(Debug, Args)]
pub struct AddUserArgs {
    /// Login name.
    #[arg(long)]
    pub username: String,
    /// Full display name.
    #[arg(long)]
    pub name: String,
    /// Email address.
    #[arg(long)]
    pub email: String,
}

/// Game commands.
#[derive(Debug, Subcommand)]
pub enum GameCommand {
    /// List games.
    List,
    /// Create a game without playing it.
    Add {
        /// Number of seats (2 to 4).
        #[arg(long, short)]
        players: u8,
        /// User to seat; repeat for each participant.
        #[arg(long = "participant")]
        participants: Vec<u64>,
    },
    /// Simulate a complete game with the first registered users.
    Simulate {
        /// Number of seats (2 to 4).
        #[arg(long, short)]
        players: u8,
        /// Seed for a reproducible game.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Show game counts.
    Stats,
}

/// Relational administration commands.
#[derive(Debug, Subcommand)]
pub enum DbCommand {
    /// Create the database, rebuild the tables, and seed sample users.
    Setup,
    /// Create any missing tables.
    Ensure,
    /// List the tables of the application database.
    Check,
    /// Run a trivial query against the maintenance database.
    Test,
    /// Probe for the client again and ask for a fresh credential.
    Reconfigure,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_simulate_with_seed() {
        let cli = Cli::try_parse_from(["capivara", "game", "simulate", "-p", "3", "--seed", "7"]);
        let Ok(cli) = cli else {
            panic!("Expected valid arguments to parse")
        };
        assert!(matches!(
            cli.command,
            Command::Game(GameCommand::Simulate { players: 3, seed: Some(7) })
        ));
        assert_eq!(cli.config, PathBuf::from("capivara-config.yaml"));
    }

    #[test]
    fn parses_repeated_participants() {
        let cli = Cli::try_parse_from([
            "capivara",
            "game",
            "add",
            "--players",
            "2",
            "--participant",
            "1",
            "--participant",
            "2",
        ]);
        let Ok(Cli {
            command: Command::Game(GameCommand::Add { participants, .. }),
            ..
        }) = cli
        else {
            panic!("Expected valid arguments to parse")
        };
        assert_eq!(participants, vec![1, 2]);
    }

    #[test]
    fn add_user_requires_all_fields() {
        assert!(Cli::try_parse_from(["capivara", "user", "add", "--username", "ana"]).is_err());
    }
}
