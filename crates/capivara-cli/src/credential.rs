//! Interactive credential source.

use capivara_db::{Credential, CredentialError, CredentialSource};
use dialoguer::Password;

/// Environment variable consulted before prompting.
pub const PASSWORD_ENV: &str = "CAPIVARA_DB_PASSWORD";

/// Reads the relational credential from [`PASSWORD_ENV`] or asks for it on
/// the terminal.
pub struct PromptCredential {
    prompt: String,
}

impl PromptCredential {
    /// Prompt as `user@host:port`.
    pub fn new(user: &str, host: &str, port: u16) -> Self {
        Self {
            prompt: format!("Password for {user}@{host}:{port}"),
        }
    }
}

impl CredentialSource for PromptCredential {
    fn obtain(&mut self) -> Result<Credential, CredentialError> {
        if let Ok(secret) = std::env::var(PASSWORD_ENV) {
            tracing::debug!(source = PASSWORD_ENV, "Using credential from environment");
            return Ok(Credential::new(secret));
        }
        Password::new()
            .with_prompt(&self.prompt)
            .allow_empty_password(true)
            .interact()
            .map(Credential::new)
            .map_err(|e| CredentialError::new(e.to_string()))
    }
}
