//! Error types for the command-line binary.

/// Top-level error for the `capivara` binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that command handlers can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: capivara_core::ConfigError,
    },

    /// A core operation was rejected.
    #[error("{source}")]
    Core {
        /// The underlying core error.
        #[from]
        source: capivara_core::CoreError,
    },

    /// The document store failed outside a dual write.
    #[error("document store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: capivara_db::StoreError,
    },

    /// Reading the audit log failed.
    #[error("audit log error: {source}")]
    AuditLog {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An interactive prompt failed.
    #[error("prompt error: {source}")]
    Prompt {
        /// The underlying prompt error.
        #[from]
        source: dialoguer::Error,
    },

    /// A write was rejected by both backends.
    #[error("{operation} was not persisted by either backend")]
    NotPersisted {
        /// The operation that failed.
        operation: &'static str,
    },
}
