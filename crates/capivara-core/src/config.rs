//! Configuration loading and typed config structures for Capivara.
//!
//! The canonical configuration lives in `capivara-config.yaml` at the
//! project root. Every field has a default, so an empty or missing file
//! yields a working setup: documents under `data/`, the relational engine
//! on `localhost:5433`, and the standard game rules (first to 50 points,
//! at most 10 rounds, 5 to 15 points per round).

use std::path::{Path, PathBuf};
use std::time::Duration;

use capivara_db::RelationalEndpoint;
use capivara_db::document_store::{GAMES_FILE, USERS_FILE};
use serde::Deserialize;

use crate::simulation::SimulationRules;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
///
/// Mirrors the structure of `capivara-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CapivaraConfig {
    /// Document and audit log locations.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Relational client settings.
    #[serde(default)]
    pub relational: RelationalConfig,

    /// Game rules for simulations.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CapivaraConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `CAPIVARA_DATA_DIR` overrides `storage.data_dir`
    /// - `CAPIVARA_PSQL_PATH` replaces `relational.client_paths`
    /// - `CAPIVARA_DB_HOST` overrides `relational.host`
    /// - `CAPIVARA_DB_PORT` overrides `relational.port`
    /// - `CAPIVARA_DB_NAME` overrides `relational.database`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, applying env overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using `lookup` to read variables.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("CAPIVARA_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(val);
        }
        if let Some(val) = lookup("CAPIVARA_PSQL_PATH") {
            self.relational.client_paths = vec![PathBuf::from(val)];
        }
        if let Some(val) = lookup("CAPIVARA_DB_HOST") {
            self.relational.host = val;
        }
        if let Some(val) = lookup("CAPIVARA_DB_PORT") {
            match val.parse() {
                Ok(port) => self.relational.port = port,
                Err(_) => tracing::warn!(value = %val, "Ignoring invalid CAPIVARA_DB_PORT"),
            }
        }
        if let Some(val) = lookup("CAPIVARA_DB_NAME") {
            self.relational.database = val;
        }
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        if sim.min_points > sim.max_points {
            return Err(ConfigError::Invalid {
                field: "simulation.min_points",
                reason: format!(
                    "{} is greater than max_points {}",
                    sim.min_points, sim.max_points
                ),
            });
        }
        if sim.max_rounds == 0 {
            return Err(ConfigError::Invalid {
                field: "simulation.max_rounds",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.relational.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "relational.timeout_secs",
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// Document and audit log locations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the documents and the audit log.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Audit log file name inside `data_dir`.
    #[serde(default = "default_audit_log")]
    pub audit_log: String,

    /// Directory receiving backup exports.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
}

impl StorageConfig {
    /// Full path of the users document.
    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join(USERS_FILE)
    }

    /// Full path of the games document.
    pub fn games_path(&self) -> PathBuf {
        self.data_dir.join(GAMES_FILE)
    }

    /// Full path of the audit log.
    pub fn audit_log_path(&self) -> PathBuf {
        self.data_dir.join(&self.audit_log)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            audit_log: default_audit_log(),
            backup_dir: default_backup_dir(),
        }
    }
}

/// Relational client settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelationalConfig {
    /// Host passed to the client.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port passed to the client.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Administrative principal.
    #[serde(default = "default_user")]
    pub user: String,

    /// Application database.
    #[serde(default = "default_database")]
    pub database: String,

    /// Database used for creating the application database and for
    /// connectivity checks.
    #[serde(default = "default_maintenance_database")]
    pub maintenance_database: String,

    /// Client text encoding (`PGCLIENTENCODING`).
    #[serde(default = "default_client_encoding")]
    pub client_encoding: String,

    /// Seconds before a client invocation is abandoned.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Client locations to probe, in order. Empty means the built-in list.
    #[serde(default)]
    pub client_paths: Vec<PathBuf>,
}

impl RelationalConfig {
    /// The executor endpoint described by this section.
    pub fn endpoint(&self) -> RelationalEndpoint {
        RelationalEndpoint::new(&self.host, self.port)
            .with_user(&self.user)
            .with_client_encoding(&self.client_encoding)
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }

    /// Locations to probe for the client.
    pub fn candidates(&self) -> Vec<PathBuf> {
        if self.client_paths.is_empty() {
            capivara_db::probe::default_candidates()
        } else {
            self.client_paths.clone()
        }
    }
}

impl Default for RelationalConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            database: default_database(),
            maintenance_database: default_maintenance_database(),
            client_encoding: default_client_encoding(),
            timeout_secs: default_timeout_secs(),
            client_paths: Vec::new(),
        }
    }
}

/// Game rules for simulations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Score that ends a game.
    #[serde(default = "default_target_score")]
    pub target_score: u32,

    /// Round cap.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Smallest award per round.
    #[serde(default = "default_min_points")]
    pub min_points: u32,

    /// Largest award per round.
    #[serde(default = "default_max_points")]
    pub max_points: u32,

    /// Pause between rounds in milliseconds.
    #[serde(default)]
    pub round_delay_ms: u64,
}

impl SimulationConfig {
    /// The rules described by this section.
    pub const fn rules(&self) -> SimulationRules {
        SimulationRules {
            target_score: self.target_score,
            max_rounds: self.max_rounds,
            min_points: self.min_points,
            max_points: self.max_points,
            round_delay: Duration::from_millis(self.round_delay_ms),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            target_score: default_target_score(),
            max_rounds: default_max_rounds(),
            min_points: default_min_points(),
            max_points: default_max_points(),
            round_delay_ms: 0,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_audit_log() -> String {
    "sql_commands.sql".to_owned()
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_host() -> String {
    "localhost".to_owned()
}

const fn default_port() -> u16 {
    5433
}

fn default_user() -> String {
    "postgres".to_owned()
}

fn default_database() -> String {
    "capivara_game".to_owned()
}

fn default_maintenance_database() -> String {
    "postgres".to_owned()
}

fn default_client_encoding() -> String {
    "UTF8".to_owned()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_target_score() -> u32 {
    capivara_types::DEFAULT_TARGET_SCORE
}

const fn default_max_rounds() -> u32 {
    10
}

const fn default_min_points() -> u32 {
    5
}

const fn default_max_points() -> u32 {
    15
}

fn default_log_level() -> String {
    "info".to_owned()
}
