//! Integration tests for dual writes and simulated games.
//!
//! Most tests run with no relational client at all, the common case on a
//! student machine. The Unix-only tests install a shell script in place of
//! the client to exercise the relational path.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::indexing_slicing
)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use capivara_core::{
    CoreError, DualWriteCoordinator, GameSimulationEngine, NoOpObserver, Operation, SinkStatus,
    SimulationRules,
};
use capivara_db::{
    AuditLog, CommandExecutor, Credential, DocumentStore, RelationalEndpoint, RelationalSession,
    StaticCredential,
};
use capivara_types::{GameId, GameStatus, NewGame, NewUser, UserId};
use rand::SeedableRng;
use rand::rngs::SmallRng;

fn session(data_dir: &Path, client_paths: Vec<PathBuf>) -> RelationalSession {
    let executor = CommandExecutor::new(
        RelationalEndpoint::default().with_timeout(Duration::from_secs(10)),
        AuditLog::new(data_dir.join("sql_commands.sql")),
    );
    RelationalSession::new(
        client_paths,
        executor,
        Box::new(StaticCredential(Credential::new("pw"))),
        "capivara_game",
    )
}

fn coordinator(data_dir: &Path, client_paths: Vec<PathBuf>) -> DualWriteCoordinator {
    let store = DocumentStore::load_from_dir(data_dir).unwrap();
    DualWriteCoordinator::new(session(data_dir, client_paths), store)
}

fn offline(data_dir: &Path) -> DualWriteCoordinator {
    coordinator(data_dir, Vec::new())
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_user_offline_persists_to_document() {
    let dir = tempfile::tempdir().unwrap();
    let mut coord = offline(dir.path());
    assert_eq!(coord.store().users().len(), 2);

    let outcome = coord
        .create_user(NewUser::new("pedro", "Pedro Santos", "pedro@x.com"))
        .await
        .unwrap();

    assert!(outcome.succeeded());
    assert_eq!(outcome.relational, SinkStatus::Skipped);
    assert_eq!(outcome.document, SinkStatus::Applied);
    assert_eq!(outcome.record.id, UserId(3));
    assert!(outcome.record.active);
    assert_eq!(coord.store().users().len(), 3);

    let reloaded = DocumentStore::load_from_dir(dir.path()).unwrap();
    assert_eq!(reloaded.users().len(), 3);
    assert_eq!(reloaded.user_by_username("pedro").unwrap().full_name, "Pedro Santos");
    // Offline writes never touch the audit log.
    assert!(!dir.path().join("sql_commands.sql").exists());
}

#[tokio::test]
async fn duplicate_username_or_email_is_rejected_without_writes() {
    let dir = tempfile::tempdir().unwrap();
    let mut coord = offline(dir.path());
    let before = std::fs::read_to_string(dir.path().join("usuarios.json")).unwrap();

    let by_name = coord
        .create_user(NewUser::new("joao", "Another Joao", "other@x.com"))
        .await;
    assert!(matches!(by_name, Err(CoreError::Validation { ref field, .. }) if field == "username"));

    let by_email = coord
        .create_user(NewUser::new("joao2", "Another Joao", "JOAO@email.com"))
        .await;
    assert!(matches!(by_email, Err(CoreError::Validation { ref field, .. }) if field == "email"));

    let after = std::fs::read_to_string(dir.path().join("usuarios.json")).unwrap();
    assert_eq!(before, after);
    assert_eq!(coord.store().users().len(), 2);
}

#[tokio::test]
async fn blank_fields_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut coord = offline(dir.path());
    let result = coord
        .apply(Operation::CreateUser(NewUser::new("ana", "", "ana@x.com")))
        .await;
    assert!(matches!(result, Err(CoreError::Validation { .. })));
    let result = coord
        .apply(Operation::CreateUser(NewUser::new("ana", "   ", "ana@x.com")))
        .await;
    assert!(matches!(result, Err(CoreError::Validation { .. })));
    assert_eq!(coord.store().users().len(), 2);
}

#[tokio::test]
async fn deactivate_user_marks_inactive_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut coord = offline(dir.path());

    let outcome = coord.apply(Operation::DeactivateUser(UserId(2))).await.unwrap();
    assert!(outcome.succeeded());

    let reloaded = DocumentStore::load_from_dir(dir.path()).unwrap();
    assert!(!reloaded.users().get(UserId(2)).unwrap().active);
    assert_eq!(reloaded.users().len(), 2);

    let missing = coord.apply(Operation::DeactivateUser(UserId(42))).await;
    assert!(matches!(missing, Err(CoreError::Validation { .. })));
}

#[tokio::test]
async fn failed_save_rolls_back_memory() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let mut coord = offline(&data);

    // Replace the data directory with a plain file so saves fail.
    std::fs::remove_dir_all(&data).unwrap();
    std::fs::write(&data, b"").unwrap();

    let outcome = coord
        .create_user(NewUser::new("pedro", "Pedro Santos", "pedro@x.com"))
        .await
        .unwrap();
    assert!(!outcome.succeeded());
    assert!(matches!(outcome.document, SinkStatus::Failed(_)));
    assert_eq!(coord.store().users().len(), 2);
    assert!(coord.store().user_by_username("pedro").is_none());
}

#[tokio::test]
async fn users_document_still_writable_when_games_path_is_blocked() {
    let dir = tempfile::tempdir().unwrap();
    let users_path = dir.path().join("u").join("usuarios.json");
    let games_dir = dir.path().join("g");
    let store = DocumentStore::load(users_path.clone(), games_dir.join("jogos.json")).unwrap();
    let mut coord = DualWriteCoordinator::new(session(dir.path(), Vec::new()), store);

    // The games directory becomes a plain file; the users one stays writable.
    std::fs::remove_dir_all(&games_dir).unwrap();
    std::fs::write(&games_dir, b"").unwrap();

    let user = coord
        .create_user(NewUser::new("pedro", "Pedro Santos", "pedro@x.com"))
        .await
        .unwrap();
    assert_eq!(user.document, SinkStatus::Applied);
    assert_eq!(coord.store().users().len(), 3);
    assert_eq!(read_json(&users_path).as_array().unwrap().len(), 3);

    let game = coord.create_game(NewGame::new(2)).await.unwrap();
    assert!(matches!(game.document, SinkStatus::Failed(_)));
    assert!(coord.store().games().is_empty());
    // Memory and disk still agree on users after the games failure.
    assert_eq!(read_json(&users_path).as_array().unwrap().len(), 3);
    assert_eq!(coord.store().users().len(), 3);
}

// ---------------------------------------------------------------------------
// Games
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_game_offline_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let mut coord = offline(dir.path());

    let outcome = coord.create_game(NewGame::new(3)).await.unwrap();
    assert!(outcome.succeeded());
    assert_eq!(outcome.record.status, GameStatus::InProgress);

    let games = read_json(&dir.path().join("jogos.json"));
    let game = &games[0];
    assert_eq!(game["id_jogo"], 1);
    assert_eq!(game["numero_jogadores"], 3);
    assert_eq!(game["status"], "em_andamento");
    assert_eq!(game["pontos_meta"], 50);
    assert_eq!(game["participantes"], serde_json::json!([]));
}

#[tokio::test]
async fn create_game_validates_seats_and_participants() {
    let dir = tempfile::tempdir().unwrap();
    let mut coord = offline(dir.path());

    for bad in [
        NewGame::new(5),
        NewGame::new(1),
        NewGame::new(2).with_participants(vec![UserId(1), UserId(9)]),
        NewGame::new(2).with_participants(vec![UserId(1), UserId(1)]),
        NewGame::new(2).with_participants(vec![UserId(1), UserId(2), UserId(1)]),
    ] {
        let result = coord.create_game(bad).await;
        assert!(matches!(result, Err(CoreError::Validation { .. })));
    }
    assert!(coord.store().games().is_empty());

    let seated = coord
        .create_game(NewGame::new(2).with_participants(vec![UserId(2), UserId(1)]))
        .await
        .unwrap();
    assert_eq!(seated.record.participants, vec![UserId(2), UserId(1)]);
}

#[tokio::test]
async fn simulation_offline_commits_finished_game() {
    let dir = tempfile::tempdir().unwrap();
    let mut coord = offline(dir.path());
    coord
        .create_user(NewUser::new("maria", "Maria Silva", "maria@email.com"))
        .await
        .unwrap();

    let mut engine =
        GameSimulationEngine::new(SimulationRules::default(), SmallRng::seed_from_u64(2026));
    let outcome = engine.run(&mut coord, 3, &mut NoOpObserver).await.unwrap();

    assert!(!outcome.relational_synced());
    assert_eq!(outcome.document, SinkStatus::Applied);
    let game = &outcome.game;
    assert_eq!(game.status, GameStatus::Finished);
    assert_eq!(game.participants, vec![UserId(1), UserId(2), UserId(3)]);
    assert!(game.rounds.len() <= 10);
    assert_eq!(game.winner, game.leader().map(|(id, _)| id));

    let reloaded = DocumentStore::load_from_dir(dir.path()).unwrap();
    let stored = reloaded.games().get(game.id).unwrap();
    assert_eq!(stored, game);

    let raw = read_json(&dir.path().join("jogos.json"));
    assert_eq!(raw[0]["status"], "finalizado");
    assert!(raw[0]["vencedor"].is_u64());
    assert!(raw[0]["rodadas"].is_array());
}

#[tokio::test]
async fn simulation_without_enough_users_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut coord = offline(dir.path());
    let mut engine =
        GameSimulationEngine::new(SimulationRules::default(), SmallRng::seed_from_u64(1));

    let result = engine.run(&mut coord, 4, &mut NoOpObserver).await;
    assert!(matches!(
        result,
        Err(CoreError::InsufficientUsers { required: 4, available: 2 })
    ));
    let bad_seats = engine.run(&mut coord, 7, &mut NoOpObserver).await;
    assert!(matches!(bad_seats, Err(CoreError::Validation { .. })));
    assert!(coord.store().games().is_empty());
}

// ---------------------------------------------------------------------------
// Relational path (fake client)
// ---------------------------------------------------------------------------

/// Install a client that records its arguments in `args.txt`, swallows
/// its input, prints `stdout`, and exits with `exit_code`.
#[cfg(unix)]
fn fake_client(dir: &Path, stdout: &str, exit_code: u8) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("psql");
    let script = format!(
        "#!/bin/sh\n\
         printf '%s\\n' \"$@\" >> \"$(dirname \"$0\")/args.txt\"\n\
         cat > /dev/null\n\
         cat <<'OUT'\n{stdout}OUT\n\
         exit {exit_code}\n"
    );
    std::fs::write(&path, script).unwrap();
    let mut permissions = std::fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).unwrap();
    path
}

/// What the client prints for a single returned `id_jogo` of 41.
#[cfg(unix)]
const RETURNED_ROW: &str = " id_jogo \n---------\n      41\n(1 row)\n";

#[cfg(unix)]
#[tokio::test]
async fn relational_failure_does_not_block_document_write() {
    let dir = tempfile::tempdir().unwrap();
    let bin = tempfile::tempdir().unwrap();
    let mut coord = coordinator(dir.path(), vec![fake_client(bin.path(), "", 2)]);

    let outcome = coord
        .create_user(NewUser::new("pedro", "Pedro Santos", "pedro@x.com"))
        .await
        .unwrap();
    assert!(matches!(outcome.relational, SinkStatus::Failed(_)));
    assert_eq!(outcome.document, SinkStatus::Applied);
    assert!(outcome.succeeded());

    let log = AuditLog::new(dir.path().join("sql_commands.sql"));
    let lines = log.statement_lines().unwrap();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("INSERT INTO usuarios"));
    // Values are bound, never written into the statement text.
    assert!(!lines.join("\n").contains("Pedro Santos"));
}

#[cfg(unix)]
#[tokio::test]
async fn simulation_updates_the_row_the_insert_returned() {
    let dir = tempfile::tempdir().unwrap();
    let bin = tempfile::tempdir().unwrap();
    let mut coord = coordinator(dir.path(), vec![fake_client(bin.path(), RETURNED_ROW, 0)]);

    let mut engine =
        GameSimulationEngine::new(SimulationRules::default(), SmallRng::seed_from_u64(5));
    let outcome = engine.run(&mut coord, 2, &mut NoOpObserver).await.unwrap();
    assert!(outcome.relational_synced());
    assert_eq!(outcome.game.id, GameId(1));
    assert_eq!(outcome.relational_id, Some(41));

    let log = AuditLog::new(dir.path().join("sql_commands.sql"));
    let text = log.read().unwrap();
    assert!(text.contains("INSERT INTO jogos"));
    assert!(text.contains("CREATE TABLE IF NOT EXISTS usuarios"));
    assert!(text.trim_end().ends_with(
        "UPDATE jogos SET status = :'status' WHERE id_jogo = :'id_jogo' RETURNING id_jogo;"
    ));

    // The update is bound to the engine's id, not the document id.
    let args = std::fs::read_to_string(bin.path().join("args.txt")).unwrap();
    assert!(args.lines().any(|line| line == "id_jogo=41"));
    assert!(!args.lines().any(|line| line == "id_jogo=1"));
}

#[cfg(unix)]
#[tokio::test]
async fn simulation_without_returned_row_skips_the_status_update() {
    let dir = tempfile::tempdir().unwrap();
    let bin = tempfile::tempdir().unwrap();
    let mut coord = coordinator(dir.path(), vec![fake_client(bin.path(), "", 0)]);

    let mut engine =
        GameSimulationEngine::new(SimulationRules::default(), SmallRng::seed_from_u64(5));
    let outcome = engine.run(&mut coord, 2, &mut NoOpObserver).await.unwrap();
    assert_eq!(outcome.relational_start, SinkStatus::Applied);
    assert_eq!(outcome.relational_id, None);
    assert!(matches!(outcome.relational_finish, SinkStatus::Failed(_)));
    assert_eq!(outcome.document, SinkStatus::Applied);
    assert!(!outcome.relational_synced());

    let text = AuditLog::new(dir.path().join("sql_commands.sql")).read().unwrap();
    assert!(!text.contains("UPDATE jogos"));
}
