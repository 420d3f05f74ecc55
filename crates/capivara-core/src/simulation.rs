//! Round-based scoring simulation.
//!
//! A simulated game moves through three states:
//!
//! ```text
//! not started --(seat players)--> simulation --(round loop)--> finished
//! ```
//!
//! - **Start**: the first N active users in registration order take the
//!   seats, every score starts at zero, and one best-effort relational
//!   insert records the game with status `simulacao`.
//! - **Rounds**: each round a uniformly random participant wins a uniformly
//!   random award. The loop stops as soon as any score reaches the target,
//!   or after the round cap.
//! - **Finish**: the highest score wins (ties go to the lowest user id),
//!   the game is appended to the document store, and the relational row
//!   is marked `finalizado`. The row is matched by the id the start insert
//!   returned, never by the document id. A relational failure never undoes
//!   the document commit.
//!
//! The round loop only touches the in-memory record. The random source is
//! injected so runs can be reproduced.

use std::collections::BTreeMap;
use std::time::Duration;

use capivara_db::{Collection, Statement, schema};
use capivara_types::{
    DEFAULT_TARGET_SCORE, Game, GameId, GameStatus, MAX_PLAYERS, MIN_PLAYERS, RoundRecord, User,
    UserId,
};
use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::info;

use crate::dual_write::{DualWriteCoordinator, SinkStatus, insert_game_statement};
use crate::error::CoreError;

/// Highest pip value on a domino half, used for the cosmetic move text.
const MAX_PIPS: u8 = 6;

/// Parameters of a simulated game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationRules {
    /// Score that ends the game.
    pub target_score: u32,
    /// Round cap.
    pub max_rounds: u32,
    /// Smallest award per round.
    pub min_points: u32,
    /// Largest award per round.
    pub max_points: u32,
    /// Pause between rounds.
    pub round_delay: Duration,
}

impl Default for SimulationRules {
    fn default() -> Self {
        Self {
            target_score: DEFAULT_TARGET_SCORE,
            max_rounds: 10,
            min_points: 5,
            max_points: 15,
            round_delay: Duration::ZERO,
        }
    }
}

/// Why a simulation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationEndReason {
    /// A participant reached the target score.
    TargetReached,
    /// The round cap was hit first.
    RoundLimit,
}

/// Result of a finished simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationOutcome {
    /// The finished, immutable game record.
    pub game: Game,
    /// Why the round loop stopped.
    pub end_reason: SimulationEndReason,
    /// Relational insert at start.
    pub relational_start: SinkStatus,
    /// Serial id the relational engine gave the game row, if the insert
    /// returned one. It is independent of `game.id`.
    pub relational_id: Option<u64>,
    /// Document commit at finish.
    pub document: SinkStatus,
    /// Relational status update at finish.
    pub relational_finish: SinkStatus,
}

impl SimulationOutcome {
    /// Whether both relational steps were accepted.
    pub const fn relational_synced(&self) -> bool {
        self.relational_start.is_applied() && self.relational_finish.is_applied()
    }
}

/// Callback invoked as the simulation progresses.
pub trait RoundObserver: Send {
    /// Called once the players are seated.
    fn on_start(&mut self, _game: &Game, _players: &[User]) {}

    /// Called after each round with the updated game.
    fn on_round(&mut self, round: &RoundRecord, game: &Game);
}

/// A no-op observer for tests and non-interactive runs.
pub struct NoOpObserver;

impl RoundObserver for NoOpObserver {
    fn on_round(&mut self, _round: &RoundRecord, _game: &Game) {}
}

/// Runs simulated games with a given random source.
#[derive(Debug)]
pub struct GameSimulationEngine<R> {
    rules: SimulationRules,
    rng: R,
}

impl<R: Rng> GameSimulationEngine<R> {
    /// Create an engine with `rules`, drawing randomness from `rng`.
    pub const fn new(rules: SimulationRules, rng: R) -> Self {
        Self { rules, rng }
    }

    /// The rules this engine plays by.
    pub const fn rules(&self) -> &SimulationRules {
        &self.rules
    }

    /// Simulate a game with `player_count` seats to completion.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for a seat count outside 2 to 4 or
    /// an inverted point range, [`CoreError::InsufficientUsers`] when too
    /// few active users exist, and [`CoreError::Io`] if no game identifier
    /// can be assigned. Nothing is written in those cases.
    pub async fn run(
        &mut self,
        coordinator: &mut DualWriteCoordinator,
        player_count: u8,
        observer: &mut dyn RoundObserver,
    ) -> Result<SimulationOutcome, CoreError> {
        if self.rules.min_points > self.rules.max_points {
            return Err(CoreError::validation(
                "min_points",
                "greater than max_points",
            ));
        }
        let players = seat_players(coordinator.store().users(), player_count)?;
        let id = coordinator.store().next_game_id()?;

        // --- not started -> simulation ---
        let mut game = start_game(id, &players, &self.rules, Utc::now());
        observer.on_start(&game, &players);
        info!(
            game_id = %game.id,
            players = player_count,
            target_score = game.target_score,
            "Simulation starting"
        );
        let (relational_start, relational_id) = coordinator
            .relational_returning(&insert_game_statement(&game))
            .await;

        // --- round loop ---
        let names: BTreeMap<UserId, String> = players
            .iter()
            .map(|user| (user.id, user.full_name.clone()))
            .collect();
        let max_rounds = usize::try_from(self.rules.max_rounds).unwrap_or(usize::MAX);
        while !game.target_reached() && game.rounds.len() < max_rounds {
            let Some(round) = play_round(&mut game, &names, &self.rules, &mut self.rng) else {
                break;
            };
            observer.on_round(&round, &game);
            if !self.rules.round_delay.is_zero() {
                tokio::time::sleep(self.rules.round_delay).await;
            }
        }
        let end_reason = if game.target_reached() {
            SimulationEndReason::TargetReached
        } else {
            SimulationEndReason::RoundLimit
        };

        // --- simulation -> finished ---
        finish_game(&mut game, Utc::now());
        info!(
            game_id = %game.id,
            reason = ?end_reason,
            rounds = game.rounds.len(),
            winner = ?game.winner,
            top_score = game.max_score(),
            "Simulation finished"
        );
        let document = coordinator.append_game(&game);
        let relational_finish = mark_finished(coordinator, &game, relational_id).await;

        Ok(SimulationOutcome {
            game,
            end_reason,
            relational_start,
            relational_id,
            document,
            relational_finish,
        })
    }
}

/// Pick the first `player_count` active users in registration order.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] for a seat count outside 2 to 4, or
/// [`CoreError::InsufficientUsers`] when too few active users exist.
pub fn seat_players(users: &Collection<User>, player_count: u8) -> Result<Vec<User>, CoreError> {
    if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&player_count) {
        return Err(CoreError::validation(
            "player_count",
            format!("must be between {MIN_PLAYERS} and {MAX_PLAYERS}"),
        ));
    }
    let required = usize::from(player_count);
    let active: Vec<User> = users.iter().filter(|u| u.active).take(required).cloned().collect();
    if active.len() < required {
        return Err(CoreError::InsufficientUsers {
            required,
            available: active.len(),
        });
    }
    Ok(active)
}

/// Build the in-memory record for a game entering the simulation state.
pub fn start_game(
    id: GameId,
    players: &[User],
    rules: &SimulationRules,
    now: DateTime<Utc>,
) -> Game {
    Game {
        id,
        player_count: u8::try_from(players.len()).unwrap_or(u8::MAX),
        started_at: now,
        status: GameStatus::Simulation,
        target_score: rules.target_score,
        participants: players.iter().map(|u| u.id).collect(),
        scores: players.iter().map(|u| (u.id, 0)).collect(),
        rounds: Vec::new(),
        winner: None,
        finished_at: None,
    }
}

/// Play one round: pick a winner, award points, record the round.
///
/// Returns `None` for a game without participants or an inverted point
/// range.
pub fn play_round<R: Rng>(
    game: &mut Game,
    names: &BTreeMap<UserId, String>,
    rules: &SimulationRules,
    rng: &mut R,
) -> Option<RoundRecord> {
    if game.participants.is_empty() || rules.min_points > rules.max_points {
        return None;
    }
    let pick = rng.random_range(0..game.participants.len());
    let winner = *game.participants.get(pick)?;
    let points = rng.random_range(rules.min_points..=rules.max_points);

    let score = game.scores.entry(winner).or_insert(0);
    *score = score.saturating_add(points);

    let moves = game
        .participants
        .iter()
        .map(|id| {
            let name = names.get(id).map_or_else(|| id.to_string(), Clone::clone);
            let left = rng.random_range(0..=MAX_PIPS);
            let right = rng.random_range(0..=MAX_PIPS);
            format!("{name}: [{left}-{right}]")
        })
        .collect();

    let record = RoundRecord {
        round: u32::try_from(game.rounds.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1),
        winner,
        points,
        moves,
    };
    game.rounds.push(record.clone());
    Some(record)
}

/// Move the game to its terminal state and pick the winner.
pub fn finish_game(game: &mut Game, now: DateTime<Utc>) {
    game.winner = game.leader().map(|(id, _)| id);
    game.status = GameStatus::Finished;
    game.finished_at = Some(now);
}

/// Update the status of the row the start insert created, matched by the
/// engine's own id.
async fn mark_finished(
    coordinator: &mut DualWriteCoordinator,
    game: &Game,
    relational_id: Option<u64>,
) -> SinkStatus {
    if !coordinator.session().is_available() {
        return SinkStatus::Skipped;
    }
    let Some(relational_id) = relational_id else {
        return SinkStatus::Failed("game has no relational row".to_owned());
    };
    schema::ensure_tables(coordinator.session_mut()).await;
    let statement = Statement::new(
        "UPDATE jogos SET status = :'status' WHERE id_jogo = :'id_jogo' RETURNING id_jogo",
    )
    .bind("status", game.status.label())
    .bind("id_jogo", relational_id);
    match coordinator.relational_returning(&statement).await {
        (SinkStatus::Applied, None) => {
            SinkStatus::Failed(format!("no relational row with id {relational_id}"))
        }
        (status, _) => status,
    }
}
