//! Error kinds surfaced by the core operations.
//!
//! Only [`CoreError::Validation`] and [`CoreError::InsufficientUsers`]
//! abort an operation before anything is written. Relational failures are
//! normally folded into outcome flags; the `Execution*` and
//! `BackendUnavailable` kinds exist for callers that run a statement
//! directly and want to surface the failure.

use capivara_db::{ExecutionError, StoreError};

/// Errors returned by core operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// No relational client was found.
    #[error("relational backend unavailable")]
    BackendUnavailable,

    /// A relational statement exceeded its timeout.
    #[error("relational statement timed out after {seconds}s")]
    ExecutionTimeout {
        /// The timeout that elapsed.
        seconds: u64,
    },

    /// A relational statement failed.
    #[error("relational statement failed: {message}")]
    ExecutionFailed {
        /// Advisory description from the executor.
        message: String,
    },

    /// The document store could not be read or written.
    #[error("document store error: {source}")]
    Io {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },

    /// A request field is missing, malformed, or conflicts with existing data.
    #[error("invalid {field}: {reason}")]
    Validation {
        /// Field that failed validation.
        field: String,
        /// Why it failed.
        reason: String,
    },

    /// Not enough users are registered to seat the requested players.
    #[error("need {required} active users, only {available} registered")]
    InsufficientUsers {
        /// Seats requested.
        required: usize,
        /// Active users available.
        available: usize,
    },
}

impl CoreError {
    /// Shorthand for a [`CoreError::Validation`].
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<ExecutionError> for CoreError {
    fn from(error: ExecutionError) -> Self {
        match error {
            ExecutionError::BackendUnavailable => Self::BackendUnavailable,
            ExecutionError::Timeout { timeout } => Self::ExecutionTimeout {
                seconds: timeout.as_secs(),
            },
            other => Self::ExecutionFailed {
                message: other.to_string(),
            },
        }
    }
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .keys()
            .map(ToString::to_string)
            .collect();
        fields.sort();
        Self::Validation {
            field: fields.join(", "),
            reason: errors.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use capivara_types::NewUser;
    use validator::Validate;

    use super::*;

    #[test]
    fn execution_errors_map_to_kinds() {
        assert!(matches!(
            CoreError::from(ExecutionError::BackendUnavailable),
            CoreError::BackendUnavailable
        ));
        assert!(matches!(
            CoreError::from(ExecutionError::Timeout {
                timeout: Duration::from_secs(30)
            }),
            CoreError::ExecutionTimeout { seconds: 30 }
        ));
        assert!(matches!(
            CoreError::from(ExecutionError::Failed {
                status: "exit status: 2".to_owned(),
                stderr: "connection refused".to_owned(),
            }),
            CoreError::ExecutionFailed { .. }
        ));
    }

    #[test]
    fn validation_errors_name_the_fields() {
        let errors = NewUser::new("", "", "pedro@x.com").validate().err();
        let Some(errors) = errors else {
            panic!("Expected empty fields to fail validation")
        };
        match CoreError::from(errors) {
            CoreError::Validation { field, .. } => assert_eq!(field, "full_name, username"),
            other => panic!("Expected Validation, got {other:?}"),
        }
    }
}
