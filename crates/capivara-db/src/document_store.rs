//! Durable JSON documents for users and games.
//!
//! The store owns the canonical in-memory collections. Loading is done
//! once at startup; every mutation is followed by a full [`save`].
//!
//! Each document is replaced atomically: the new contents go to a uniquely
//! named temporary file next to the target, are flushed to disk, and are
//! then renamed over it. A crash leaves either the old or the new file,
//! never a partial one. A full save stages both documents before renaming
//! either, so a document that cannot be written leaves both files as they
//! were. Callers that changed a single collection save only that document
//! with [`save_document`].
//!
//! [`save`]: DocumentStore::save
//! [`save_document`]: DocumentStore::save_document

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use capivara_types::{Game, GameId, User, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::collection::{Collection, Record};
use crate::error::StoreError;

/// File name of the users document.
pub const USERS_FILE: &str = "usuarios.json";

/// File name of the games document.
pub const GAMES_FILE: &str = "jogos.json";

/// One of the two documents backing the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Document {
    /// The users document.
    Users,
    /// The games document.
    Games,
}

/// Canonical users and games, backed by two JSON files.
#[derive(Debug)]
pub struct DocumentStore {
    users_path: PathBuf,
    games_path: PathBuf,
    users: Collection<User>,
    games: Collection<Game>,
}

impl DocumentStore {
    /// Load both documents from `data_dir` using the standard file names.
    ///
    /// # Errors
    ///
    /// See [`DocumentStore::load`].
    pub fn load_from_dir(data_dir: &Path) -> Result<Self, StoreError> {
        Self::load(data_dir.join(USERS_FILE), data_dir.join(GAMES_FILE))
    }

    /// Load both documents, seeding and writing any that are missing.
    ///
    /// A missing users document is seeded with the administrator and one
    /// sample account; a missing games document starts empty.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if an existing document cannot be read or
    /// parsed, or a seeded one cannot be written.
    pub fn load(users_path: PathBuf, games_path: PathBuf) -> Result<Self, StoreError> {
        let users = match read_document::<User>(&users_path)? {
            Some(users) => users,
            None => {
                let users = Collection::from_vec(seed_users(Utc::now()))?;
                write_document(&users_path, users.as_slice())?;
                tracing::info!(path = %users_path.display(), "Seeded users document");
                users
            }
        };
        let games = match read_document::<Game>(&games_path)? {
            Some(games) => games,
            None => {
                let games = Collection::default();
                write_document(&games_path, games.as_slice())?;
                tracing::info!(path = %games_path.display(), "Created empty games document");
                games
            }
        };

        tracing::info!(users = users.len(), games = games.len(), "Document store loaded");
        Ok(Self {
            users_path,
            games_path,
            users,
            games,
        })
    }

    /// Rewrite both documents from the in-memory collections.
    ///
    /// Both documents are staged before either is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if either document cannot be written. When
    /// staging fails neither file on disk has changed.
    pub fn save(&self) -> Result<(), StoreError> {
        let users = stage_document(&self.users_path, self.users.as_slice())?;
        let games = match stage_document(&self.games_path, self.games.as_slice()) {
            Ok(games) => games,
            Err(e) => {
                users.discard();
                return Err(e);
            }
        };
        if let Err(e) = users.promote() {
            games.discard();
            return Err(e);
        }
        games.promote()?;
        tracing::debug!(
            users = self.users.len(),
            games = self.games.len(),
            "Document store saved"
        );
        Ok(())
    }

    /// Rewrite a single document from its in-memory collection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the document cannot be written; the file
    /// on disk is left as it was.
    pub fn save_document(&self, document: Document) -> Result<(), StoreError> {
        match document {
            Document::Users => write_document(&self.users_path, self.users.as_slice())?,
            Document::Games => write_document(&self.games_path, self.games.as_slice())?,
        }
        tracing::debug!(?document, "Document saved");
        Ok(())
    }

    /// Empty both collections and save.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the save fails; memory is cleared anyway.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        self.users.clear();
        self.games.clear();
        tracing::warn!("Document store reset");
        self.save()
    }

    /// Registered users in registration order.
    pub const fn users(&self) -> &Collection<User> {
        &self.users
    }

    /// Mutable access to the users collection.
    pub const fn users_mut(&mut self) -> &mut Collection<User> {
        &mut self.users
    }

    /// Games in creation order.
    pub const fn games(&self) -> &Collection<Game> {
        &self.games
    }

    /// Mutable access to the games collection.
    pub const fn games_mut(&mut self) -> &mut Collection<Game> {
        &mut self.games
    }

    /// Location of the users document.
    pub fn users_path(&self) -> &Path {
        &self.users_path
    }

    /// Location of the games document.
    pub fn games_path(&self) -> &Path {
        &self.games_path
    }

    /// Identifier for the next user: largest existing plus one, or 1.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IdExhausted`] on overflow.
    pub fn next_user_id(&self) -> Result<UserId, StoreError> {
        next_id(self.users.max_id(), UserId::FIRST, UserId::next, User::COLLECTION)
    }

    /// Identifier for the next game: largest existing plus one, or 1.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IdExhausted`] on overflow.
    pub fn next_game_id(&self) -> Result<GameId, StoreError> {
        next_id(self.games.max_id(), GameId::FIRST, GameId::next, Game::COLLECTION)
    }

    /// Find a user by login name (exact match).
    pub fn user_by_username(&self, username: &str) -> Option<&User> {
        self.users.iter().find(|u| u.username == username)
    }

    /// Find a user by email (case-insensitive).
    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
    }
}

// ---------------------------------------------------------------------------
// Seed data
// ---------------------------------------------------------------------------

/// Accounts written into a fresh users document.
pub fn seed_users(now: DateTime<Utc>) -> Vec<User> {
    vec![
        User {
            id: UserId(1),
            username: "admin".to_owned(),
            full_name: "Administrator".to_owned(),
            email: "admin@capivara.com".to_owned(),
            credential_hash: "hash123".to_owned(),
            created_at: now,
            active: true,
        },
        User {
            id: UserId(2),
            username: "joao".to_owned(),
            full_name: "João Estudante".to_owned(),
            email: "joao@email.com".to_owned(),
            credential_hash: "hash456".to_owned(),
            created_at: now,
            active: true,
        },
    ]
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

fn next_id<I: Copy>(
    max: Option<I>,
    first: I,
    next: fn(I) -> Option<I>,
    collection: &'static str,
) -> Result<I, StoreError> {
    match max {
        None => Ok(first),
        Some(max) => next(max).ok_or(StoreError::IdExhausted { collection }),
    }
}

fn read_document<T>(path: &Path) -> Result<Option<Collection<T>>, StoreError>
where
    T: Record + DeserializeOwned,
{
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let items: Vec<T> =
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Serialization {
            path: path.to_path_buf(),
            source,
        })?;
    Collection::from_vec(items).map(Some)
}

fn write_document<T: Serialize>(path: &Path, items: &[T]) -> Result<(), StoreError> {
    stage_document(path, items)?.promote()
}

fn stage_document<T: Serialize>(path: &Path, items: &[T]) -> Result<Staged, StoreError> {
    let mut contents =
        serde_json::to_vec_pretty(items).map_err(|source| StoreError::Serialization {
            path: path.to_path_buf(),
            source,
        })?;
    contents.push(b'\n');
    Staged::write(path, &contents).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// New contents flushed to a temporary file next to their target.
struct Staged {
    tmp: PathBuf,
    target: PathBuf,
}

impl Staged {
    fn write(path: &Path, contents: &[u8]) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!(
            ".{file_name}.{}.tmp",
            uuid::Uuid::new_v4().simple()
        ));

        let written = File::create(&tmp).and_then(|mut file| {
            file.write_all(contents)?;
            file.sync_all()
        });
        match written {
            Ok(()) => Ok(Self {
                tmp,
                target: path.to_path_buf(),
            }),
            Err(e) => {
                let _ = std::fs::remove_file(&tmp);
                Err(e)
            }
        }
    }

    /// Rename over the target.
    fn promote(self) -> Result<(), StoreError> {
        if let Err(source) = std::fs::rename(&self.tmp, &self.target) {
            let _ = std::fs::remove_file(&self.tmp);
            return Err(StoreError::Io {
                path: self.target,
                source,
            });
        }
        Ok(())
    }

    fn discard(self) {
        let _ = std::fs::remove_file(&self.tmp);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use capivara_types::GameStatus;

    use super::*;

    #[test]
    fn missing_files_are_seeded_and_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::load_from_dir(dir.path()).unwrap();

        assert_eq!(store.users().len(), 2);
        assert!(store.games().is_empty());
        assert_eq!(store.user_by_username("admin").unwrap().id, UserId(1));
        assert_eq!(store.user_by_username("joao").unwrap().full_name, "João Estudante");
        assert!(dir.path().join(USERS_FILE).exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join(GAMES_FILE)).unwrap(),
            "[]\n"
        );
    }

    #[test]
    fn non_ascii_is_written_verbatim_with_two_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        DocumentStore::load_from_dir(dir.path()).unwrap();
        let raw = std::fs::read_to_string(dir.path().join(USERS_FILE)).unwrap();
        assert!(raw.contains("\"nome_completo\": \"João Estudante\""));
        assert!(!raw.contains("\\u00e3"));
        assert!(raw.contains("\n  {\n    \"id_usuario\": 1,"));
    }

    #[test]
    fn save_then_reload_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DocumentStore::load_from_dir(dir.path()).unwrap();
        let id = store.next_game_id().unwrap();
        store
            .games_mut()
            .push(Game {
                id,
                player_count: 2,
                started_at: Utc::now(),
                status: GameStatus::InProgress,
                target_score: 50,
                participants: vec![UserId(1), UserId(2)],
                scores: std::collections::BTreeMap::new(),
                rounds: Vec::new(),
                winner: None,
                finished_at: None,
            })
            .unwrap();
        store.save().unwrap();

        let reloaded = DocumentStore::load_from_dir(dir.path()).unwrap();
        assert_eq!(reloaded.users(), store.users());
        assert_eq!(reloaded.games(), store.games());
    }

    #[test]
    fn save_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::load_from_dir(dir.path()).unwrap();
        store.save().unwrap();
        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec![GAMES_FILE, USERS_FILE]);
    }

    fn entries(path: &Path) -> usize {
        let raw = std::fs::read(path).unwrap();
        serde_json::from_slice::<Vec<serde_json::Value>>(&raw)
            .unwrap()
            .len()
    }

    #[test]
    fn blocked_games_path_leaves_users_document_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let users_path = dir.path().join("u").join(USERS_FILE);
        let games_dir = dir.path().join("g");
        let mut store =
            DocumentStore::load(users_path.clone(), games_dir.join(GAMES_FILE)).unwrap();
        std::fs::remove_dir_all(&games_dir).unwrap();
        std::fs::write(&games_dir, b"not a directory").unwrap();

        store.users_mut().clear();
        assert!(matches!(store.save(), Err(StoreError::Io { .. })));
        assert_eq!(entries(&users_path), 2);
        let names: Vec<String> = std::fs::read_dir(dir.path().join("u"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![USERS_FILE]);

        store.save_document(Document::Users).unwrap();
        assert_eq!(entries(&users_path), 0);
        assert!(store.save_document(Document::Games).is_err());
    }

    #[test]
    fn corrupt_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(USERS_FILE), b"{not json").unwrap();
        let result = DocumentStore::load_from_dir(dir.path());
        assert!(matches!(result, Err(StoreError::Serialization { .. })));
    }

    #[test]
    fn next_ids_follow_maximum() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DocumentStore::load_from_dir(dir.path()).unwrap();
        assert_eq!(store.next_user_id().unwrap(), UserId(3));
        assert_eq!(store.next_game_id().unwrap(), GameId(1));

        store.users_mut().clear();
        assert_eq!(store.next_user_id().unwrap(), UserId(1));
    }

    #[test]
    fn reset_clears_both_documents() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DocumentStore::load_from_dir(dir.path()).unwrap();
        store.reset().unwrap();
        let reloaded = DocumentStore::load_from_dir(dir.path()).unwrap();
        assert!(reloaded.users().is_empty());
        assert!(reloaded.games().is_empty());
    }

    #[test]
    fn email_lookup_ignores_case() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::load_from_dir(dir.path()).unwrap();
        assert!(store.user_by_email("ADMIN@capivara.com").is_some());
        assert!(store.user_by_email("nobody@x.com").is_none());
    }
}
