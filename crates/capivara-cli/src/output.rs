//! Terminal rendering of records and outcomes.
//!
//! Results go to stdout; diagnostics go through `tracing` to stderr.

use capivara_core::reports::{GameStats, UserStats};
use capivara_core::{RoundObserver, SimulationOutcome, SinkStatus};
use capivara_types::{Game, RoundRecord, User, UserId};
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct UserRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Username")]
    username: String,
    #[tabled(rename = "Name")]
    full_name: String,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Registered")]
    created_at: String,
    #[tabled(rename = "Active")]
    active: &'static str,
}

#[derive(Tabled)]
struct GameRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Players")]
    players: u8,
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "Started")]
    started_at: String,
    #[tabled(rename = "Rounds")]
    rounds: usize,
    #[tabled(rename = "Winner")]
    winner: String,
}

/// Print users as a table.
pub fn users<'a>(users: impl IntoIterator<Item = &'a User>) {
    let rows: Vec<UserRow> = users
        .into_iter()
        .map(|u| UserRow {
            id: u.id.into_inner(),
            username: u.username.clone(),
            full_name: u.full_name.clone(),
            email: u.email.clone(),
            created_at: u.created_at.format("%Y-%m-%d %H:%M").to_string(),
            active: if u.active { "yes" } else { "no" },
        })
        .collect();
    if rows.is_empty() {
        println!("No users found.");
        return;
    }
    println!("{}", Table::new(rows).with(Style::rounded()));
}

/// Print games as a table.
pub fn games<'a>(games: impl IntoIterator<Item = &'a Game>) {
    let rows: Vec<GameRow> = games
        .into_iter()
        .map(|g| GameRow {
            id: g.id.into_inner(),
            players: g.player_count,
            status: g.status.label(),
            started_at: g.started_at.format("%Y-%m-%d %H:%M").to_string(),
            rounds: g.rounds.len(),
            winner: g.winner.map_or_else(|| "-".to_owned(), |id| id.to_string()),
        })
        .collect();
    if rows.is_empty() {
        println!("No games found.");
        return;
    }
    println!("{}", Table::new(rows).with(Style::rounded()));
}

/// Print user counts.
pub fn user_stats(stats: &UserStats) {
    println!("Users:    {}", stats.total);
    println!("Active:   {}", stats.active);
    println!("Inactive: {}", stats.inactive);
}

/// Print game counts.
pub fn game_stats(stats: &GameStats) {
    println!("Games:    {}", stats.total);
    println!("Finished: {}", stats.finished);
    for (players, count) in &stats.by_player_count {
        println!("  {players} players: {count}");
    }
    for (user, wins) in &stats.wins {
        println!("  user {user}: {wins} win(s)");
    }
}

/// One-line description of a sink result.
pub fn sink(label: &str, status: &SinkStatus) {
    match status {
        SinkStatus::Applied => println!("  {label}: saved"),
        SinkStatus::Skipped => println!("  {label}: skipped (client not found)"),
        SinkStatus::Failed(reason) => println!("  {label}: failed ({reason})"),
    }
}

/// Print a finished simulation.
pub fn simulation(outcome: &SimulationOutcome, winner_name: Option<&str>) {
    let game = &outcome.game;
    println!();
    println!(
        "Game {} finished after {} round(s) ({:?})",
        game.id,
        game.rounds.len(),
        outcome.end_reason
    );
    for (id, score) in &game.scores {
        let marker = if Some(*id) == game.winner { " *" } else { "" };
        println!("  user {id}: {score} point(s){marker}");
    }
    if let Some(name) = winner_name {
        println!("Winner: {name}");
    }
    sink("relational start", &outcome.relational_start);
    if let Some(row) = outcome.relational_id {
        println!("  relational row: {row}");
    }
    sink("document", &outcome.document);
    sink("relational finish", &outcome.relational_finish);
}

/// Prints each round as it is played.
pub struct ConsoleObserver {
    names: Vec<(UserId, String)>,
}

impl ConsoleObserver {
    /// Create an observer with no names yet.
    pub const fn new() -> Self {
        Self { names: Vec::new() }
    }

    fn name(&self, id: UserId) -> String {
        self.names
            .iter()
            .find(|(known, _)| *known == id)
            .map_or_else(|| id.to_string(), |(_, name)| name.clone())
    }
}

impl RoundObserver for ConsoleObserver {
    fn on_start(&mut self, game: &Game, players: &[User]) {
        self.names = players.iter().map(|u| (u.id, u.full_name.clone())).collect();
        let seated: Vec<&str> = players.iter().map(|u| u.full_name.as_str()).collect();
        println!(
            "Game {}: {} (first to {} points)",
            game.id,
            seated.join(", "),
            game.target_score
        );
    }

    fn on_round(&mut self, round: &RoundRecord, game: &Game) {
        println!(
            "Round {}: {} scores {} (leader at {})",
            round.round,
            self.name(round.winner),
            round.points,
            game.max_score()
        );
        for line in &round.moves {
            println!("    {line}");
        }
    }
}
