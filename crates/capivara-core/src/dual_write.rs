//! Best-effort writes to both persistence backends.
//!
//! [`DualWriteCoordinator::apply`] validates an [`Operation`], then:
//!
//! 1. Attempts the relational statement if the session found a client.
//! 2. Applies the same change to the document store and saves it.
//!
//! The operation succeeds if either sink accepted it. There is no
//! reconciliation: a write accepted by one sink and rejected by the other
//! leaves the two backends diverged, and identifiers assigned by the
//! relational engine are independent of the document identifiers. Code
//! that later updates a relational row uses the id the engine returned.

use capivara_db::{Document, DocumentStore, RelationalSession, Statement, StoreError};
use capivara_types::{
    DEFAULT_TARGET_SCORE, Game, GameStatus, NewGame, NewUser, User, UserId,
};
use chrono::Utc;
use sha2::{Digest, Sha256};
use validator::Validate;

use crate::error::CoreError;

/// A logical mutation applied to both backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Register a user.
    CreateUser(NewUser),
    /// Create a game session that is not simulated.
    CreateGame(NewGame),
    /// Mark a user inactive.
    DeactivateUser(UserId),
}

impl Operation {
    /// Short name for logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CreateUser(_) => "create_user",
            Self::CreateGame(_) => "create_game",
            Self::DeactivateUser(_) => "deactivate_user",
        }
    }
}

/// What one sink did with a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkStatus {
    /// The sink accepted the write.
    Applied,
    /// The sink was not attempted (relational client not found).
    Skipped,
    /// The sink rejected the write; the message is advisory.
    Failed(String),
}

impl SinkStatus {
    /// Whether the sink accepted the write.
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// The entity an operation produced or changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppliedEntity {
    /// A created or updated user.
    User(User),
    /// A created game.
    Game(Box<Game>),
}

/// Combined result of a dual write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DualWriteOutcome<T> {
    /// Relational sink result.
    pub relational: SinkStatus,
    /// Document sink result.
    pub document: SinkStatus,
    /// The record as written (or as it would have been).
    pub record: T,
}

impl<T> DualWriteOutcome<T> {
    /// True when at least one sink accepted the write.
    pub const fn succeeded(&self) -> bool {
        self.relational.is_applied() || self.document.is_applied()
    }

    fn map<U>(self, f: impl FnOnce(T) -> U) -> DualWriteOutcome<U> {
        DualWriteOutcome {
            relational: self.relational,
            document: self.document,
            record: f(self.record),
        }
    }
}

/// Owns both backends and applies operations to them.
#[derive(Debug)]
pub struct DualWriteCoordinator {
    session: RelationalSession,
    store: DocumentStore,
    target_score: u32,
}

impl DualWriteCoordinator {
    /// Coordinate `session` and `store`. New games target 50 points.
    pub const fn new(session: RelationalSession, store: DocumentStore) -> Self {
        Self {
            session,
            store,
            target_score: DEFAULT_TARGET_SCORE,
        }
    }

    /// Override the target score given to created games.
    #[must_use]
    pub const fn with_target_score(mut self, target_score: u32) -> Self {
        self.target_score = target_score;
        self
    }

    /// The relational session.
    pub const fn session(&self) -> &RelationalSession {
        &self.session
    }

    /// Mutable access to the relational session.
    pub const fn session_mut(&mut self) -> &mut RelationalSession {
        &mut self.session
    }

    /// The document store.
    pub const fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Mutable access to the document store.
    pub const fn store_mut(&mut self) -> &mut DocumentStore {
        &mut self.store
    }

    /// Apply `operation` to both backends.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] before any write if the request
    /// is invalid, or [`CoreError::Io`] if no identifier can be assigned.
    /// Sink failures are reported in the outcome, not as errors.
    pub async fn apply(
        &mut self,
        operation: Operation,
    ) -> Result<DualWriteOutcome<AppliedEntity>, CoreError> {
        let kind = operation.kind();
        let outcome = match operation {
            Operation::CreateUser(request) => {
                self.create_user(request).await?.map(AppliedEntity::User)
            }
            Operation::CreateGame(request) => self
                .create_game(request)
                .await?
                .map(|game| AppliedEntity::Game(Box::new(game))),
            Operation::DeactivateUser(id) => {
                self.deactivate_user(id).await?.map(AppliedEntity::User)
            }
        };
        tracing::info!(
            operation = kind,
            relational = ?outcome.relational,
            document = ?outcome.document,
            succeeded = outcome.succeeded(),
            "Dual write applied"
        );
        Ok(outcome)
    }

    /// Register a user in both backends.
    ///
    /// # Errors
    ///
    /// See [`DualWriteCoordinator::apply`].
    pub async fn create_user(
        &mut self,
        request: NewUser,
    ) -> Result<DualWriteOutcome<User>, CoreError> {
        request.validate()?;
        for (field, value) in [
            ("username", &request.username),
            ("full_name", &request.full_name),
            ("email", &request.email),
        ] {
            if value.trim().is_empty() {
                return Err(CoreError::validation(field, "must not be blank"));
            }
        }
        if self.store.user_by_username(&request.username).is_some() {
            return Err(CoreError::validation("username", "already registered"));
        }
        if self.store.user_by_email(&request.email).is_some() {
            return Err(CoreError::validation("email", "already registered"));
        }

        let user = User {
            id: self.store.next_user_id()?,
            credential_hash: credential_hash(&request.username),
            username: request.username,
            full_name: request.full_name,
            email: request.email,
            created_at: Utc::now(),
            active: true,
        };

        let statement = Statement::new(
            "INSERT INTO usuarios (nome_usuario, nome_completo, email, senha_hash) \
             VALUES (:'nome_usuario', :'nome_completo', :'email', :'senha_hash')",
        )
        .bind("nome_usuario", &user.username)
        .bind("nome_completo", &user.full_name)
        .bind("email", &user.email)
        .bind("senha_hash", &user.credential_hash);
        let relational = self.relational(&statement).await;

        let document = self.commit(
            Document::Users,
            |store| store.users_mut().push(user.clone()),
            |store| {
                store.users_mut().pop();
            },
        );

        Ok(DualWriteOutcome {
            relational,
            document,
            record: user,
        })
    }

    /// Create a game session in both backends.
    ///
    /// # Errors
    ///
    /// See [`DualWriteCoordinator::apply`].
    pub async fn create_game(
        &mut self,
        request: NewGame,
    ) -> Result<DualWriteOutcome<Game>, CoreError> {
        request.validate()?;
        if request.participants.len() > usize::from(request.player_count) {
            return Err(CoreError::validation(
                "participants",
                format!("more than {} participants", request.player_count),
            ));
        }
        for (pos, id) in request.participants.iter().enumerate() {
            if !self.store.users().contains(*id) {
                return Err(CoreError::validation("participants", format!("unknown user {id}")));
            }
            if request.participants.iter().take(pos).any(|other| other == id) {
                return Err(CoreError::validation("participants", format!("user {id} seated twice")));
            }
        }

        let game = Game {
            id: self.store.next_game_id()?,
            player_count: request.player_count,
            started_at: Utc::now(),
            status: GameStatus::InProgress,
            target_score: self.target_score,
            participants: request.participants,
            scores: std::collections::BTreeMap::new(),
            rounds: Vec::new(),
            winner: None,
            finished_at: None,
        };

        let statement = insert_game_statement(&game);
        let relational = self.relational(&statement).await;
        let document = self.append_game(&game);

        Ok(DualWriteOutcome {
            relational,
            document,
            record: game,
        })
    }

    /// Mark a user inactive in both backends.
    ///
    /// The relational row is matched by login name, which is unique in
    /// both backends while identifiers may differ.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the user does not exist.
    pub async fn deactivate_user(
        &mut self,
        id: UserId,
    ) -> Result<DualWriteOutcome<User>, CoreError> {
        let Some(existing) = self.store.users().get(id) else {
            return Err(CoreError::validation("id", format!("unknown user {id}")));
        };
        let previous = existing.active;
        let mut user = existing.clone();
        user.active = false;

        let statement =
            Statement::new("UPDATE usuarios SET ativo = FALSE WHERE nome_usuario = :'nome_usuario'")
                .bind("nome_usuario", &user.username);
        let relational = self.relational(&statement).await;

        let document = self.commit(
            Document::Users,
            |store| {
                if let Some(stored) = store.users_mut().get_mut(id) {
                    stored.active = false;
                }
                Ok(())
            },
            |store| {
                if let Some(stored) = store.users_mut().get_mut(id) {
                    stored.active = previous;
                }
            },
        );

        Ok(DualWriteOutcome {
            relational,
            document,
            record: user,
        })
    }

    /// Run `statement` on the application database if a client was found.
    pub async fn relational(&mut self, statement: &Statement) -> SinkStatus {
        self.relational_returning(statement).await.0
    }

    /// Run a statement ending in `RETURNING <id column>` and report the
    /// identifier the engine returned, if any row matched.
    pub async fn relational_returning(
        &mut self,
        statement: &Statement,
    ) -> (SinkStatus, Option<u64>) {
        if !self.session.is_available() {
            return (SinkStatus::Skipped, None);
        }
        match self.session.execute(statement).await {
            Ok(output) => (SinkStatus::Applied, returned_id(&output)),
            Err(e) => {
                tracing::warn!(error = %e, "Relational write failed, continuing");
                (SinkStatus::Failed(e.to_string()), None)
            }
        }
    }

    /// Append `game` to the document store and save.
    pub fn append_game(&mut self, game: &Game) -> SinkStatus {
        self.commit(
            Document::Games,
            |store| store.games_mut().push(game.clone()),
            |store| {
                store.games_mut().pop();
            },
        )
    }

    /// Mutate the store and save the changed `document`; undo the mutation
    /// if the save fails so memory matches disk.
    fn commit(
        &mut self,
        document: Document,
        mutate: impl FnOnce(&mut DocumentStore) -> Result<(), StoreError>,
        undo: impl FnOnce(&mut DocumentStore),
    ) -> SinkStatus {
        if let Err(e) = mutate(&mut self.store) {
            tracing::warn!(error = %e, "Document mutation rejected");
            return SinkStatus::Failed(e.to_string());
        }
        match self.store.save_document(document) {
            Ok(()) => SinkStatus::Applied,
            Err(e) => {
                undo(&mut self.store);
                tracing::warn!(error = %e, ?document, "Document save failed, change rolled back");
                SinkStatus::Failed(e.to_string())
            }
        }
    }
}

/// Insert statement for a new `jogos` row, returning its serial id.
pub fn insert_game_statement(game: &Game) -> Statement {
    Statement::new(
        "INSERT INTO jogos (numero_jogadores, status, pontos_meta) \
         VALUES (:'numero_jogadores', :'status', :'pontos_meta') RETURNING id_jogo",
    )
    .bind("numero_jogadores", game.player_count)
    .bind("status", game.status.label())
    .bind("pontos_meta", game.target_score)
}

/// First value in the client's output that is a plain unsigned integer.
///
/// The client prints a single `RETURNING` column as an aligned table:
/// a header, a dashed rule, one row per match, then `(N rows)`.
pub fn returned_id(output: &str) -> Option<u64> {
    output.lines().find_map(|line| line.trim().parse().ok())
}

/// Placeholder credential hash derived from the login name.
pub fn credential_hash(username: &str) -> String {
    let encoded = hex::encode(Sha256::digest(username.as_bytes()));
    format!("hash_{}", encoded.get(..16).unwrap_or(encoded.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_hash_is_stable_and_prefixed() {
        let a = credential_hash("pedro");
        assert_eq!(a, credential_hash("pedro"));
        assert_ne!(a, credential_hash("maria"));
        assert!(a.starts_with("hash_"));
        assert_eq!(a.len(), 21);
    }

    #[test]
    fn outcome_succeeds_if_either_sink_applied() {
        let outcome = |relational, document| DualWriteOutcome {
            relational,
            document,
            record: (),
        };
        assert!(outcome(SinkStatus::Skipped, SinkStatus::Applied).succeeded());
        assert!(outcome(SinkStatus::Applied, SinkStatus::Failed("disk".into())).succeeded());
        assert!(!outcome(SinkStatus::Failed("x".into()), SinkStatus::Failed("y".into())).succeeded());
        assert!(!outcome(SinkStatus::Skipped, SinkStatus::Failed("y".into())).succeeded());
    }

    #[test]
    fn game_insert_binds_all_values() {
        let game = Game {
            id: capivara_types::GameId(4),
            player_count: 3,
            started_at: Utc::now(),
            status: GameStatus::Simulation,
            target_score: 50,
            participants: Vec::new(),
            scores: std::collections::BTreeMap::new(),
            rounds: Vec::new(),
            winner: None,
            finished_at: None,
        };
        let statement = insert_game_statement(&game);
        let params: Vec<_> = statement.params().collect();
        assert_eq!(
            params,
            vec![("numero_jogadores", "3"), ("status", "simulacao"), ("pontos_meta", "50")]
        );
        assert!(statement.text().ends_with("RETURNING id_jogo"));
    }

    #[test]
    fn returned_id_reads_single_column_table() {
        assert_eq!(returned_id(" id_jogo \n---------\n      17\n(1 row)\n"), Some(17));
        assert_eq!(returned_id(" id_jogo \n---------\n(0 rows)\n"), None);
        assert_eq!(returned_id(""), None);
    }
}
