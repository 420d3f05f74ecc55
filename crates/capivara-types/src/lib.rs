//! Shared entity types for the Capivara game records system.
//!
//! Every crate in the workspace agrees on these shapes. Field names on
//! disk keep the legacy column names (`id_usuario`, `nome_usuario`, ...)
//! so the document files and the relational tables line up one to one.
//!
//! # Modules
//!
//! - [`ids`] -- Integer identifier newtypes for users and games
//! - [`enums`] -- Game status
//! - [`structs`] -- Users, games, rounds, and creation requests

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::GameStatus;
pub use ids::{GameId, UserId};
pub use structs::{
    Game, MAX_PLAYERS, MIN_PLAYERS, NewGame, NewUser, RoundRecord, User, DEFAULT_TARGET_SCORE,
};
