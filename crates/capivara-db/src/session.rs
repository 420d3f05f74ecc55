//! Relational session state for one process.
//!
//! A [`RelationalSession`] owns the probe result, the cached credential,
//! and the executor. It is an ordinary value passed to whoever needs the
//! relational backend; there is no global state.
//!
//! The credential is requested from a [`CredentialSource`] on first use and
//! cached until [`RelationalSession::clear_credential`] or
//! [`RelationalSession::reprobe`]. It is never written to disk.

use std::path::{Path, PathBuf};

use crate::audit::AuditLog;
use crate::executor::{CommandExecutor, Credential, ExecutionError};
use crate::probe;
use crate::statement::Statement;

/// Default database for administrative statements.
pub const DEFAULT_MAINTENANCE_DATABASE: &str = "postgres";

/// A credential could not be obtained.
#[derive(Debug, thiserror::Error)]
#[error("credential unavailable: {message}")]
pub struct CredentialError {
    /// Why the source could not produce a credential.
    pub message: String,
}

impl CredentialError {
    /// Create an error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Supplies the relational credential on demand.
///
/// The interactive binary prompts for it; tests and non-interactive runs
/// use [`StaticCredential`].
pub trait CredentialSource: Send {
    /// Produce a credential.
    fn obtain(&mut self) -> Result<Credential, CredentialError>;
}

/// A credential known up front.
#[derive(Debug, Clone)]
pub struct StaticCredential(pub Credential);

impl CredentialSource for StaticCredential {
    fn obtain(&mut self) -> Result<Credential, CredentialError> {
        Ok(self.0.clone())
    }
}

/// Probe result, credential cache, and executor for the relational backend.
pub struct RelationalSession {
    candidates: Vec<PathBuf>,
    executable: Option<PathBuf>,
    credential: Option<Credential>,
    source: Box<dyn CredentialSource>,
    executor: CommandExecutor,
    database: String,
    maintenance_database: String,
}

impl RelationalSession {
    /// Probe `candidates` and build a session targeting `database`.
    pub fn new(
        candidates: Vec<PathBuf>,
        executor: CommandExecutor,
        source: Box<dyn CredentialSource>,
        database: &str,
    ) -> Self {
        let executable = probe::probe(&candidates);
        Self {
            candidates,
            executable,
            credential: None,
            source,
            executor,
            database: database.to_owned(),
            maintenance_database: DEFAULT_MAINTENANCE_DATABASE.to_owned(),
        }
    }

    /// Use `database` for administrative statements instead of the default.
    #[must_use]
    pub fn with_maintenance_database(mut self, database: &str) -> Self {
        database.clone_into(&mut self.maintenance_database);
        self
    }

    /// Whether the probe found a client executable.
    pub const fn is_available(&self) -> bool {
        self.executable.is_some()
    }

    /// The client executable found by the probe.
    pub fn executable(&self) -> Option<&Path> {
        self.executable.as_deref()
    }

    /// Application database name.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Administrative database name.
    pub fn maintenance_database(&self) -> &str {
        &self.maintenance_database
    }

    /// Whether a credential is currently cached.
    pub const fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// The audit log every attempt is appended to.
    pub const fn audit_log(&self) -> &AuditLog {
        self.executor.audit_log()
    }

    /// The underlying executor.
    pub const fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    /// Forget the cached credential; the next statement asks again.
    pub fn clear_credential(&mut self) {
        if self.credential.take().is_some() {
            tracing::info!("Cached relational credential cleared");
        }
    }

    /// Re-run the probe and clear the credential. Returns availability.
    pub fn reprobe(&mut self) -> bool {
        self.clear_credential();
        self.executable = probe::probe(&self.candidates);
        self.is_available()
    }

    /// Execute against the application database.
    ///
    /// # Errors
    ///
    /// See [`RelationalSession::execute_on`].
    pub async fn execute(&mut self, statement: &Statement) -> Result<String, ExecutionError> {
        let database = self.database.clone();
        self.execute_on(statement, &database).await
    }

    /// Execute against the administrative database.
    ///
    /// # Errors
    ///
    /// See [`RelationalSession::execute_on`].
    pub async fn execute_maintenance(
        &mut self,
        statement: &Statement,
    ) -> Result<String, ExecutionError> {
        let database = self.maintenance_database.clone();
        self.execute_on(statement, &database).await
    }

    /// Execute `statement` against `database`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::BackendUnavailable`] without logging when
    /// no client was found. Otherwise the attempt is logged first, then
    /// [`ExecutionError::Credential`] is returned when the source fails, or
    /// any executor error.
    pub async fn execute_on(
        &mut self,
        statement: &Statement,
        database: &str,
    ) -> Result<String, ExecutionError> {
        let Some(executable) = self.executable.clone() else {
            return Err(ExecutionError::BackendUnavailable);
        };
        self.executor.record(statement)?;
        let credential = self.credential()?;
        self.executor
            .run(&executable, statement, database, &credential)
            .await
    }

    fn credential(&mut self) -> Result<Credential, CredentialError> {
        if let Some(credential) = &self.credential {
            return Ok(credential.clone());
        }
        let credential = self.source.obtain()?;
        self.credential = Some(credential.clone());
        Ok(credential)
    }
}

impl core::fmt::Debug for RelationalSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RelationalSession")
            .field("executable", &self.executable)
            .field("has_credential", &self.credential.is_some())
            .field("database", &self.database)
            .field("maintenance_database", &self.maintenance_database)
            .finish_non_exhaustive()
    }
}
