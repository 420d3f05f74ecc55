//! Bounded execution of a single statement through the relational client.
//!
//! Each call is one scoped child process:
//!
//! 1. Append the statement to the [`AuditLog`].
//! 2. Reject binding names that are not plain identifiers.
//! 3. Spawn the client against the configured host, port, principal, and
//!    target database, with one `-v name=value` per binding.
//! 4. Feed the statement on standard input.
//! 5. Wait up to the configured timeout; an abandoned child is killed.
//!
//! The credential and client encoding travel through the child's
//! environment (`PGPASSWORD`, `PGCLIENTENCODING`), never its arguments.

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::audit::AuditLog;
use crate::session::CredentialError;
use crate::statement::Statement;

/// Default relational host.
const DEFAULT_HOST: &str = "localhost";

/// Default relational port.
const DEFAULT_PORT: u16 = 5433;

/// Default administrative principal.
const DEFAULT_USER: &str = "postgres";

/// Default client text encoding.
const DEFAULT_CLIENT_ENCODING: &str = "UTF8";

/// Default per-statement timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors from a single execution attempt.
///
/// Callers on the dual-write path treat every variant the same way; the
/// distinction exists for logs and for the administrative commands.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// No client executable was found by the probe.
    #[error("relational backend unavailable: client executable not found")]
    BackendUnavailable,

    /// No credential could be obtained.
    #[error("{source}")]
    Credential {
        /// The underlying credential error.
        #[from]
        source: CredentialError,
    },

    /// A binding name is not a plain identifier.
    #[error("invalid statement parameter name: {name:?}")]
    InvalidParameter {
        /// The rejected name.
        name: String,
    },

    /// The audit entry could not be written, so the statement was not run.
    #[error("audit log append failed: {source}")]
    AuditLog {
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The client process could not be started.
    #[error("failed to spawn relational client: {source}")]
    Spawn {
        /// The underlying I/O error.
        source: io::Error,
    },

    /// Communicating with the running client failed.
    #[error("relational client I/O failed: {source}")]
    Io {
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The client did not finish within the timeout and was killed.
    #[error("relational client timed out after {}s", timeout.as_secs())]
    Timeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The client exited unsuccessfully.
    #[error("relational client exited with {status}: {stderr}")]
    Failed {
        /// Exit status as reported by the platform.
        status: String,
        /// Trimmed standard error output.
        stderr: String,
    },
}

/// Where and how to reach the relational engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationalEndpoint {
    /// Host name passed to the client.
    pub host: String,
    /// TCP port passed to the client.
    pub port: u16,
    /// Administrative principal.
    pub user: String,
    /// Value for `PGCLIENTENCODING`.
    pub client_encoding: String,
    /// Upper bound on one invocation.
    pub timeout: Duration,
}

impl RelationalEndpoint {
    /// Create an endpoint for `host:port` with default principal, encoding,
    /// and timeout.
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_owned(),
            port,
            user: DEFAULT_USER.to_owned(),
            client_encoding: DEFAULT_CLIENT_ENCODING.to_owned(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Set the administrative principal.
    #[must_use]
    pub fn with_user(mut self, user: &str) -> Self {
        user.clone_into(&mut self.user);
        self
    }

    /// Set the client text encoding.
    #[must_use]
    pub fn with_client_encoding(mut self, encoding: &str) -> Self {
        encoding.clone_into(&mut self.client_encoding);
        self
    }

    /// Set the per-invocation timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for RelationalEndpoint {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

/// A relational credential. Held in memory only; `Debug` redacts it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a credential string.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The secret, for handing to the child environment.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for Credential {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Runs statements through an external client executable.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    endpoint: RelationalEndpoint,
    audit: AuditLog,
}

impl CommandExecutor {
    /// Create an executor logging every attempt to `audit`.
    pub const fn new(endpoint: RelationalEndpoint, audit: AuditLog) -> Self {
        Self { endpoint, audit }
    }

    /// The endpoint this executor targets.
    pub const fn endpoint(&self) -> &RelationalEndpoint {
        &self.endpoint
    }

    /// The audit log this executor appends to.
    pub const fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    /// Append `statement` to the audit log, then run it.
    ///
    /// Returns the client's standard output on success.
    ///
    /// # Errors
    ///
    /// Every failure, from a bad binding name through a timeout or a
    /// non-zero exit, is returned as an [`ExecutionError`]. Nothing panics.
    pub async fn execute(
        &self,
        executable: &Path,
        statement: &Statement,
        database: &str,
        credential: &Credential,
    ) -> Result<String, ExecutionError> {
        self.record(statement)?;
        self.run(executable, statement, database, credential).await
    }

    /// Append the audit entry for one attempt of `statement`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::AuditLog`] if the log cannot be written;
    /// the statement must not be run in that case.
    pub fn record(&self, statement: &Statement) -> Result<(), ExecutionError> {
        self.audit
            .append(statement.text(), Utc::now())
            .map_err(|source| ExecutionError::AuditLog { source })
    }

    /// Run `statement` without logging it. Callers pair this with
    /// [`CommandExecutor::record`].
    ///
    /// # Errors
    ///
    /// See [`CommandExecutor::execute`].
    pub async fn run(
        &self,
        executable: &Path,
        statement: &Statement,
        database: &str,
        credential: &Credential,
    ) -> Result<String, ExecutionError> {
        if let Some(name) = statement.invalid_parameter() {
            return Err(ExecutionError::InvalidParameter {
                name: name.to_owned(),
            });
        }

        let mut command = Command::new(executable);
        command
            .arg("-h")
            .arg(&self.endpoint.host)
            .arg("-p")
            .arg(self.endpoint.port.to_string())
            .arg("-U")
            .arg(&self.endpoint.user)
            .arg("-d")
            .arg(database)
            .args(["-X", "-q", "-v", "ON_ERROR_STOP=1"]);
        for (name, value) in statement.params() {
            command.arg("-v").arg(format!("{name}={value}"));
        }
        command
            .args(["-f", "-"])
            .env("PGPASSWORD", credential.expose())
            .env("PGCLIENTENCODING", &self.endpoint.client_encoding)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|source| ExecutionError::Spawn { source })?;

        let script = statement.script();
        let run = async move {
            if let Some(mut stdin) = child.stdin.take() {
                match stdin.write_all(script.as_bytes()).await {
                    // The client may exit before reading all of its input.
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
                    other => other?,
                }
            }
            child.wait_with_output().await
        };

        match tokio::time::timeout(self.endpoint.timeout, run).await {
            Ok(Ok(output)) if output.status.success() => {
                tracing::debug!(database, "Statement executed");
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
                tracing::warn!(
                    database,
                    status = %output.status,
                    stderr = %stderr,
                    "Relational client reported failure"
                );
                Err(ExecutionError::Failed {
                    status: output.status.to_string(),
                    stderr,
                })
            }
            Ok(Err(source)) => {
                tracing::warn!(database, error = %source, "Relational client I/O failed");
                Err(ExecutionError::Io { source })
            }
            Err(_) => {
                tracing::warn!(
                    database,
                    timeout_secs = self.endpoint.timeout.as_secs(),
                    "Relational client timed out, killing it"
                );
                Err(ExecutionError::Timeout {
                    timeout: self.endpoint.timeout,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_defaults() {
        let endpoint = RelationalEndpoint::default();
        assert_eq!(endpoint.host, "localhost");
        assert_eq!(endpoint.port, 5433);
        assert_eq!(endpoint.user, "postgres");
        assert_eq!(endpoint.client_encoding, "UTF8");
        assert_eq!(endpoint.timeout, Duration::from_secs(30));
    }

    #[test]
    fn endpoint_builder() {
        let endpoint = RelationalEndpoint::new("db.local", 5432)
            .with_user("admin")
            .with_client_encoding("LATIN1")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(endpoint.host, "db.local");
        assert_eq!(endpoint.user, "admin");
        assert_eq!(endpoint.client_encoding, "LATIN1");
        assert_eq!(endpoint.timeout, Duration::from_secs(5));
    }

    #[test]
    fn credential_debug_is_redacted() {
        let credential = Credential::new("hunter2");
        assert_eq!(format!("{credential:?}"), "Credential(***)");
        assert_eq!(credential.expose(), "hunter2");
    }
}
