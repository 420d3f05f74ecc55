//! Read-only statistics and search over the document store.
//!
//! Everything here works on the in-memory collections. The relational
//! report queries are listed for display and for optional best-effort
//! execution through the session.

use std::collections::BTreeMap;

use capivara_db::Collection;
use capivara_types::{Game, GameStatus, User, UserId};

/// A named relational report query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportQuery {
    /// What the query shows.
    pub title: &'static str,
    /// Statement text.
    pub sql: &'static str,
}

/// Report queries offered against the relational backend.
pub const REPORT_QUERIES: [ReportQuery; 4] = [
    ReportQuery {
        title: "Active users",
        sql: "SELECT COUNT(*) FROM usuarios WHERE ativo = TRUE",
    },
    ReportQuery {
        title: "Games created",
        sql: "SELECT COUNT(*) FROM jogos",
    },
    ReportQuery {
        title: "Games by player count",
        sql: "SELECT numero_jogadores, COUNT(*) FROM jogos GROUP BY numero_jogadores ORDER BY numero_jogadores",
    },
    ReportQuery {
        title: "Most recent users",
        sql: "SELECT nome_usuario, data_cadastro FROM usuarios ORDER BY data_cadastro DESC LIMIT 5",
    },
];

/// User counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    /// All registered users.
    pub total: usize,
    /// Users allowed to play.
    pub active: usize,
    /// Deactivated users.
    pub inactive: usize,
}

/// Game counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameStats {
    /// All games.
    pub total: usize,
    /// Games in the terminal state.
    pub finished: usize,
    /// Games per seat count.
    pub by_player_count: BTreeMap<u8, usize>,
    /// Finished games won per user.
    pub wins: BTreeMap<UserId, usize>,
}

/// Count users by activity.
pub fn user_stats(users: &Collection<User>) -> UserStats {
    let active = users.iter().filter(|u| u.active).count();
    UserStats {
        total: users.len(),
        active,
        inactive: users.len().saturating_sub(active),
    }
}

/// Count games by seat count, status, and winner.
pub fn game_stats(games: &Collection<Game>) -> GameStats {
    let mut stats = GameStats {
        total: games.len(),
        ..GameStats::default()
    };
    for game in games {
        let seats = stats.by_player_count.entry(game.player_count).or_insert(0);
        *seats = seats.saturating_add(1);
        if game.status == GameStatus::Finished {
            stats.finished = stats.finished.saturating_add(1);
        }
        if let Some(winner) = game.winner {
            let wins = stats.wins.entry(winner).or_insert(0);
            *wins = wins.saturating_add(1);
        }
    }
    stats
}

/// Active users in registration order.
pub fn active_users(users: &Collection<User>) -> Vec<&User> {
    users.iter().filter(|u| u.active).collect()
}

/// Users whose login, full name, or email contains `term`, ignoring case.
///
/// A blank term matches nobody.
pub fn search_users<'a>(users: &'a Collection<User>, term: &str) -> Vec<&'a User> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    users
        .iter()
        .filter(|u| {
            [&u.username, &u.full_name, &u.email]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use capivara_types::GameId;
    use chrono::Utc;

    use super::*;

    fn user(id: u64, username: &str, full_name: &str, active: bool) -> User {
        User {
            id: UserId(id),
            username: username.to_owned(),
            full_name: full_name.to_owned(),
            email: format!("{username}@email.com"),
            credential_hash: String::new(),
            created_at: Utc::now(),
            active,
        }
    }

    fn game(id: u64, players: u8, winner: Option<u64>) -> Game {
        Game {
            id: GameId(id),
            player_count: players,
            started_at: Utc::now(),
            status: if winner.is_some() {
                GameStatus::Finished
            } else {
                GameStatus::InProgress
            },
            target_score: 50,
            participants: Vec::new(),
            scores: BTreeMap::new(),
            rounds: Vec::new(),
            winner: winner.map(UserId),
            finished_at: None,
        }
    }

    fn sample_users() -> Collection<User> {
        Collection::from_vec(vec![
            user(1, "admin", "Administrator", true),
            user(2, "joao", "João Estudante", true),
            user(3, "maria", "Maria Silva", false),
        ])
        .unwrap()
    }

    #[test]
    fn user_stats_split_by_activity() {
        let stats = user_stats(&sample_users());
        assert_eq!(stats, UserStats { total: 3, active: 2, inactive: 1 });
        assert_eq!(active_users(&sample_users()).len(), 2);
    }

    #[test]
    fn game_stats_group_by_seats_and_winner() {
        let games = Collection::from_vec(vec![
            game(1, 2, Some(1)),
            game(2, 3, None),
            game(3, 2, Some(1)),
            game(4, 4, Some(2)),
        ])
        .unwrap();
        let stats = game_stats(&games);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.finished, 3);
        assert_eq!(stats.by_player_count.get(&2), Some(&2));
        assert_eq!(stats.by_player_count.get(&3), Some(&1));
        assert_eq!(stats.wins.get(&UserId(1)), Some(&2));
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let users = sample_users();
        let ids = |term: &str| -> Vec<u64> {
            search_users(&users, term).iter().map(|u| u.id.0).collect()
        };
        assert_eq!(ids("ADMIN"), vec![1]);
        assert_eq!(ids("joão"), vec![2]);
        assert_eq!(ids("email.com"), vec![1, 2, 3]);
        assert_eq!(ids("silva"), vec![3]);
        assert!(ids("   ").is_empty());
        assert!(ids("nobody").is_empty());
    }
}
