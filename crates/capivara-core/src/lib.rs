//! Dual-write coordination, game simulation, and reports for Capivara.
//!
//! This crate ties the two persistence backends from `capivara-db`
//! together and runs the scoring simulation on top of them. It performs no
//! console I/O; callers receive outcome values and render them.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration with environment overrides
//! - [`dual_write`] -- Best-effort writes to both backends
//! - [`simulation`] -- Round-based scoring simulation
//! - [`reports`] -- Statistics, search, and report queries
//! - [`backup`] -- Full JSON export
//! - [`error`] -- Core error kinds

pub mod backup;
pub mod config;
pub mod dual_write;
pub mod error;
pub mod reports;
pub mod simulation;

pub use config::{CapivaraConfig, ConfigError};
pub use dual_write::{AppliedEntity, DualWriteCoordinator, DualWriteOutcome, Operation, SinkStatus};
pub use error::CoreError;
pub use simulation::{
    GameSimulationEngine, NoOpObserver, RoundObserver, SimulationEndReason, SimulationOutcome,
    SimulationRules,
};
