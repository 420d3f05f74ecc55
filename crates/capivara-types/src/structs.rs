//! Core entity structs: users, games, and the requests that create them.
//!
//! Serde renames map each field onto the legacy column name so a record
//! read from `usuarios.json` / `jogos.json` has the same keys as the
//! matching relational row.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::enums::GameStatus;
use crate::ids::{GameId, UserId};

/// Score a participant must reach to end a game early.
pub const DEFAULT_TARGET_SCORE: u32 = 50;

/// Smallest number of seats at a table.
pub const MIN_PLAYERS: u8 = 2;

/// Largest number of seats at a table.
pub const MAX_PLAYERS: u8 = 4;

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique, monotonically assigned identifier.
    #[serde(rename = "id_usuario")]
    pub id: UserId,
    /// Login name, unique across the collection.
    #[serde(rename = "nome_usuario")]
    pub username: String,
    /// Display name.
    #[serde(rename = "nome_completo")]
    pub full_name: String,
    /// Contact address, unique across the collection.
    pub email: String,
    /// Opaque credential hash.
    #[serde(rename = "senha_hash")]
    pub credential_hash: String,
    /// When the account was registered.
    #[serde(rename = "data_cadastro")]
    pub created_at: DateTime<Utc>,
    /// Inactive users are kept but excluded from play.
    #[serde(rename = "ativo")]
    pub active: bool,
}

/// Request to register a new user.
///
/// Length limits mirror the relational column widths.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct NewUser {
    /// Requested login name.
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    /// Display name.
    #[validate(length(min = 1, max = 100))]
    pub full_name: String,
    /// Contact address.
    #[validate(email, length(min = 1, max = 100))]
    pub email: String,
}

impl NewUser {
    /// Build a request from its three fields.
    pub fn new(
        username: impl Into<String>,
        full_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            full_name: full_name.into(),
            email: email.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Games
// ---------------------------------------------------------------------------

/// One completed round of a simulated game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// 1-based round number.
    #[serde(rename = "rodada")]
    pub round: u32,
    /// Participant who took the round.
    #[serde(rename = "ganhador")]
    pub winner: UserId,
    /// Points awarded to the round winner.
    #[serde(rename = "pontos")]
    pub points: u32,
    /// Cosmetic per-participant move summaries.
    #[serde(rename = "jogadas")]
    pub moves: Vec<String>,
}

/// A game session, either created directly or produced by a simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    /// Unique, monotonically assigned identifier.
    #[serde(rename = "id_jogo")]
    pub id: GameId,
    /// Number of seats (2 to 4).
    #[serde(rename = "numero_jogadores")]
    pub player_count: u8,
    /// When the game was created or the simulation started.
    #[serde(rename = "data_inicio")]
    pub started_at: DateTime<Utc>,
    /// Lifecycle status.
    pub status: GameStatus,
    /// Score that ends the game.
    #[serde(rename = "pontos_meta")]
    pub target_score: u32,
    /// Seated users in seat order.
    #[serde(rename = "participantes", default)]
    pub participants: Vec<UserId>,
    /// Accumulated score per participant, iterated in ascending id order.
    #[serde(
        rename = "pontuacao",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub scores: BTreeMap<UserId, u32>,
    /// Rounds played so far.
    #[serde(rename = "rodadas", default, skip_serializing_if = "Vec::is_empty")]
    pub rounds: Vec<RoundRecord>,
    /// Participant with the highest final score.
    #[serde(rename = "vencedor", default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<UserId>,
    /// When the game finished.
    #[serde(rename = "data_fim", default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Game {
    /// Highest accumulated score, or 0 when nobody has scored.
    pub fn max_score(&self) -> u32 {
        self.scores.values().copied().max().unwrap_or(0)
    }

    /// Whether any participant has reached the target score.
    pub fn target_reached(&self) -> bool {
        self.max_score() >= self.target_score
    }

    /// The participant holding the maximum score.
    ///
    /// On a tie the first participant with the maximum in the score map's
    /// iteration order (ascending [`UserId`]) wins.
    pub fn leader(&self) -> Option<(UserId, u32)> {
        let mut best: Option<(UserId, u32)> = None;
        for (&id, &score) in &self.scores {
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((id, score)),
            }
        }
        best
    }
}

/// Request to create a game session directly (not simulated).
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct NewGame {
    /// Number of seats.
    #[validate(range(min = 2, max = 4))]
    pub player_count: u8,
    /// Users to seat, possibly empty.
    pub participants: Vec<UserId>,
}

impl NewGame {
    /// A game with the given seat count and no participants yet.
    pub const fn new(player_count: u8) -> Self {
        Self {
            player_count,
            participants: Vec::new(),
        }
    }

    /// Seat the given users.
    #[must_use]
    pub fn with_participants(mut self, participants: Vec<UserId>) -> Self {
        self.participants = participants;
        self
    }
}
