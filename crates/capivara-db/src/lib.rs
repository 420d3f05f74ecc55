//! Persistence backends for the Capivara game records system.
//!
//! Two independent sinks receive every mutation:
//!
//! ```text
//! DualWriteCoordinator (capivara-core)
//!     |
//!     +-- RelationalSession --> CommandExecutor --> psql child process
//!     |       |                     |
//!     |       +-- probe              +-- AuditLog (sql_commands.sql)
//!     |
//!     +-- DocumentStore ----> usuarios.json, jogos.json
//! ```
//!
//! The relational engine is never linked as a library. It is reached by
//! spawning its command-line client, which may be absent, so everything in
//! the relational path degrades to an error value instead of aborting.
//!
//! # Modules
//!
//! - [`probe`] -- Locating the relational client executable
//! - [`statement`] -- Parameterized statements bound through client variables
//! - [`audit`] -- Append-only log of every attempted statement
//! - [`executor`] -- Bounded, credentialed child-process execution
//! - [`session`] -- Probe result and credential cache for one process
//! - [`schema`] -- Table creation, seeding, and connectivity checks
//! - [`collection`] -- Ordered collections with an identifier index
//! - [`document_store`] -- Durable JSON documents with atomic replacement
//! - [`error`] -- Document store errors

pub mod audit;
pub mod collection;
pub mod document_store;
pub mod error;
pub mod executor;
pub mod probe;
pub mod schema;
pub mod session;
pub mod statement;

// Re-export primary types for convenience.
pub use audit::{AuditLog, AuditSummary};
pub use collection::{Collection, Record};
pub use document_store::{Document, DocumentStore};
pub use error::StoreError;
pub use executor::{CommandExecutor, Credential, ExecutionError, RelationalEndpoint};
pub use session::{CredentialError, CredentialSource, RelationalSession, StaticCredential};
pub use schema::SchemaReport;
pub use statement::Statement;
