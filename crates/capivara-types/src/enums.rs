//! Enumeration types shared across the workspace.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a game session.
///
/// Serialized with the legacy lowercase Portuguese labels used by both the
/// document files and the `jogos.status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameStatus {
    /// Created through the coordinator and not yet played.
    #[serde(rename = "em_andamento")]
    InProgress,
    /// Being played by the simulation engine.
    #[serde(rename = "simulacao")]
    Simulation,
    /// Completed; the record is immutable from here on.
    #[serde(rename = "finalizado")]
    Finished,
}

impl GameStatus {
    /// The label stored on disk and in the relational `status` column.
    pub const fn label(self) -> &'static str {
        match self {
            Self::InProgress => "em_andamento",
            Self::Simulation => "simulacao",
            Self::Finished => "finalizado",
        }
    }

    /// Whether the game has reached its terminal state.
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Finished)
    }
}

impl core::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}
