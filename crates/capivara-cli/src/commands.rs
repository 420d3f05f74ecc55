//! Command handlers.
//!
//! Each handler builds what it needs from the configuration, calls into
//! `capivara-core`, and renders the result.

use std::path::Path;

use capivara_core::config::CapivaraConfig;
use capivara_core::reports::{self, REPORT_QUERIES};
use capivara_core::{
    AppliedEntity, CoreError, DualWriteCoordinator, DualWriteOutcome, GameSimulationEngine,
    Operation, backup,
};
use capivara_db::{
    AuditLog, CommandExecutor, DocumentStore, RelationalSession, Statement, schema,
};
use capivara_types::{NewGame, NewUser, UserId};
use chrono::Utc;
use dialoguer::Confirm;
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::cli::{AddUserArgs, Command, DbCommand, GameCommand, UserCommand};
use crate::credential::PromptCredential;
use crate::error::CliError;
use crate::output::{self, ConsoleObserver};

/// Dispatch a parsed command.
pub async fn run(command: Command, config: &CapivaraConfig) -> Result<(), CliError> {
    let mut coordinator = open(config)?;
    match command {
        Command::Status => status(&coordinator, config),
        Command::User(command) => user(&mut coordinator, command).await,
        Command::Game(command) => game(&mut coordinator, command, config).await,
        Command::Report { run } => report(&mut coordinator, run).await,
        Command::Db(command) => db(&mut coordinator, command).await,
        Command::Log { tail } => log(coordinator.session().audit_log(), tail),
        Command::Backup { dir } => {
            let dir = dir.as_deref().unwrap_or(&config.storage.backup_dir);
            let path = backup::export(
                coordinator.store(),
                coordinator.session().audit_log(),
                dir,
                Utc::now(),
            )?;
            println!("Backup written to {}", path.display());
            Ok(())
        }
        Command::Reset { yes } => reset(&mut coordinator, yes),
    }
}

/// Build the session, load the documents, and wire them together.
fn open(config: &CapivaraConfig) -> Result<DualWriteCoordinator, CliError> {
    let endpoint = config.relational.endpoint();
    let source = PromptCredential::new(&endpoint.user, &endpoint.host, endpoint.port);
    let executor = CommandExecutor::new(endpoint, AuditLog::new(config.storage.audit_log_path()));
    let session = RelationalSession::new(
        config.relational.candidates(),
        executor,
        Box::new(source),
        &config.relational.database,
    )
    .with_maintenance_database(&config.relational.maintenance_database);
    let store = DocumentStore::load(config.storage.users_path(), config.storage.games_path())?;
    Ok(DualWriteCoordinator::new(session, store).with_target_score(config.simulation.target_score))
}

// ---------------------------------------------------------------------------
// Status and audit log
// ---------------------------------------------------------------------------

fn status(coordinator: &DualWriteCoordinator, config: &CapivaraConfig) -> Result<(), CliError> {
    let session = coordinator.session();
    let store = coordinator.store();
    match session.executable() {
        Some(path) => println!("Relational client: {}", path.display()),
        None => println!("Relational client: not found (JSON documents only)"),
    }
    let endpoint = session.executor().endpoint();
    println!(
        "Database:          {}@{}:{}/{}",
        endpoint.user,
        endpoint.host,
        endpoint.port,
        session.database()
    );
    println!("Data directory:    {}", config.storage.data_dir.display());
    println!("Users:             {}", store.users().len());
    println!("Games:             {}", store.games().len());
    match session.audit_log().summary()? {
        Some(summary) => println!("Logged statements: {}", summary.statements),
        None => println!("Logged statements: 0"),
    }
    Ok(())
}

fn log(audit: &AuditLog, tail: usize) -> Result<(), CliError> {
    let Some(summary) = audit.summary()? else {
        println!("No statements logged yet ({}).", audit.path().display());
        return Ok(());
    };
    println!("File:       {}", audit.path().display());
    println!("Size:       {} bytes", summary.bytes);
    println!("Lines:      {}", summary.lines);
    println!("Statements: {}", summary.statements);
    if let Some(modified) = summary.modified {
        println!("Modified:   {}", modified.format("%Y-%m-%d %H:%M:%S"));
    }
    println!();
    println!("{}", audit.tail(tail)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

async fn user(coordinator: &mut DualWriteCoordinator, command: UserCommand) -> Result<(), CliError> {
    match command {
        UserCommand::List { all } => {
            let users = coordinator.store().users();
            if all {
                output::users(users);
            } else {
                output::users(reports::active_users(users));
            }
        }
        UserCommand::Add(AddUserArgs {
            username,
            name,
            email,
        }) => {
            let request = NewUser::new(username.trim(), name.trim(), email.trim());
            let outcome = coordinator.apply(Operation::CreateUser(request)).await?;
            report_write("create user", &outcome)?;
        }
        UserCommand::Search { term } => {
            output::users(reports::search_users(coordinator.store().users(), &term));
        }
        UserCommand::Stats => output::user_stats(&reports::user_stats(coordinator.store().users())),
        UserCommand::Deactivate { id } => {
            let outcome = coordinator
                .apply(Operation::DeactivateUser(UserId(id)))
                .await?;
            report_write("deactivate user", &outcome)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Games
// ---------------------------------------------------------------------------

async fn game(
    coordinator: &mut DualWriteCoordinator,
    command: GameCommand,
    config: &CapivaraConfig,
) -> Result<(), CliError> {
    match command {
        GameCommand::List => output::games(coordinator.store().games()),
        GameCommand::Add {
            players,
            participants,
        } => {
            let request = NewGame::new(players)
                .with_participants(participants.into_iter().map(UserId).collect());
            let outcome = coordinator.apply(Operation::CreateGame(request)).await?;
            report_write("create game", &outcome)?;
        }
        GameCommand::Simulate { players, seed } => {
            let rules = config.simulation.rules();
            let mut observer = ConsoleObserver::new();
            let outcome = match seed {
                Some(seed) => {
                    GameSimulationEngine::new(rules, SmallRng::seed_from_u64(seed))
                        .run(coordinator, players, &mut observer)
                        .await?
                }
                None => {
                    GameSimulationEngine::new(rules, rand::rng())
                        .run(coordinator, players, &mut observer)
                        .await?
                }
            };
            let winner = outcome
                .game
                .winner
                .and_then(|id| coordinator.store().users().get(id))
                .map(|u| u.full_name.as_str());
            output::simulation(&outcome, winner);
            if !outcome.document.is_applied() {
                return Err(CliError::NotPersisted {
                    operation: "simulated game",
                });
            }
        }
        GameCommand::Stats => output::game_stats(&reports::game_stats(coordinator.store().games())),
    }
    Ok(())
}

fn report_write(
    operation: &'static str,
    outcome: &DualWriteOutcome<AppliedEntity>,
) -> Result<(), CliError> {
    match &outcome.record {
        AppliedEntity::User(user) => println!(
            "User {} ({}) -> {}",
            user.id,
            user.username,
            if user.active { "active" } else { "inactive" }
        ),
        AppliedEntity::Game(game) => println!(
            "Game {} with {} seats -> {}",
            game.id, game.player_count, game.status
        ),
    }
    output::sink("relational", &outcome.relational);
    output::sink("document", &outcome.document);
    if outcome.succeeded() {
        Ok(())
    } else {
        Err(CliError::NotPersisted { operation })
    }
}

// ---------------------------------------------------------------------------
// Reports and administration
// ---------------------------------------------------------------------------

async fn report(coordinator: &mut DualWriteCoordinator, run: bool) -> Result<(), CliError> {
    let available = coordinator.session().is_available();
    if run && !available {
        println!("Relational client not found; showing queries only.");
    }
    for (n, query) in REPORT_QUERIES.iter().enumerate() {
        println!("{}. {}", n.saturating_add(1), query.title);
        println!("   {}", query.sql);
        if run && available {
            match coordinator.session_mut().execute(&Statement::new(query.sql)).await {
                Ok(rows) => println!("{rows}"),
                Err(e) => println!("   failed: {e}"),
            }
        }
    }
    Ok(())
}

async fn db(coordinator: &mut DualWriteCoordinator, command: DbCommand) -> Result<(), CliError> {
    let session = coordinator.session_mut();
    if let DbCommand::Reconfigure = command {
        let available = session.reprobe();
        match session.executable() {
            Some(path) => println!("Relational client: {}", path.display()),
            None => println!("Relational client: not found"),
        }
        if !available {
            return Ok(());
        }
    }
    if !session.is_available() {
        return Err(CoreError::BackendUnavailable.into());
    }
    match command {
        DbCommand::Setup => {
            let report = schema::setup_database(session).await;
            println!(
                "{} of {} statements accepted",
                report.succeeded, report.attempted
            );
        }
        DbCommand::Ensure => {
            let report = schema::ensure_tables(session).await;
            println!(
                "{} of {} tables verified",
                report.succeeded, report.attempted
            );
        }
        DbCommand::Check => {
            let tables = schema::check_structure(session).await.map_err(CoreError::from)?;
            println!("{tables}");
        }
        DbCommand::Test | DbCommand::Reconfigure => {
            let result = schema::test_connection(session).await.map_err(CoreError::from)?;
            println!("{result}");
        }
    }
    Ok(())
}

fn reset(coordinator: &mut DualWriteCoordinator, yes: bool) -> Result<(), CliError> {
    let store = coordinator.store_mut();
    let confirmed = yes
        || Confirm::new()
            .with_prompt(format!(
                "Delete {} user(s) and {} game(s) from {}?",
                store.users().len(),
                store.games().len(),
                parent_display(store.users_path())
            ))
            .default(false)
            .interact()?;
    if !confirmed {
        println!("Reset cancelled.");
        return Ok(());
    }
    store.reset()?;
    println!("JSON documents cleared.");
    Ok(())
}

fn parent_display(path: &Path) -> String {
    path.parent()
        .map_or_else(|| path.display().to_string(), |p| p.display().to_string())
}
