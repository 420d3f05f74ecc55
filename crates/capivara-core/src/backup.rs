//! Full JSON export of both collections and the audit log.

use std::path::{Path, PathBuf};

use capivara_db::{AuditLog, DocumentStore, StoreError};
use capivara_types::{Game, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// System name written into every backup.
pub const SYSTEM_NAME: &str = "Capivara Game";

/// Contents of a backup file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupDocument {
    /// Producing system.
    #[serde(rename = "sistema")]
    pub system: String,
    /// When the backup was taken.
    #[serde(rename = "data_backup")]
    pub created_at: DateTime<Utc>,
    /// Every user.
    #[serde(rename = "usuarios")]
    pub users: Vec<User>,
    /// Every game.
    #[serde(rename = "jogos")]
    pub games: Vec<Game>,
    /// Statement lines from the audit log.
    pub sql_commands: Vec<String>,
}

/// `backup_capivara_YYYYMMDD_HHMMSS.json` for `now`.
pub fn backup_file_name(now: DateTime<Utc>) -> String {
    format!("backup_capivara_{}.json", now.format("%Y%m%d_%H%M%S"))
}

/// Write a backup into `dir` and return its path.
///
/// # Errors
///
/// Returns [`StoreError`] if the audit log cannot be read or the backup
/// cannot be written.
pub fn export(
    store: &DocumentStore,
    audit: &AuditLog,
    dir: &Path,
    now: DateTime<Utc>,
) -> Result<PathBuf, StoreError> {
    let sql_commands = audit.statement_lines().map_err(|source| StoreError::Io {
        path: audit.path().to_path_buf(),
        source,
    })?;
    let document = BackupDocument {
        system: SYSTEM_NAME.to_owned(),
        created_at: now,
        users: store.users().as_slice().to_vec(),
        games: store.games().as_slice().to_vec(),
        sql_commands,
    };

    let path = dir.join(backup_file_name(now));
    let json = serde_json::to_vec_pretty(&document).map_err(|source| StoreError::Serialization {
        path: path.clone(),
        source,
    })?;
    std::fs::create_dir_all(dir)
        .and_then(|()| std::fs::write(&path, json))
        .map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

    tracing::info!(
        path = %path.display(),
        users = document.users.len(),
        games = document.games.len(),
        statements = document.sql_commands.len(),
        "Backup written"
    );
    Ok(path)
}
