//! Engine configuration
//!
//! Read from a TOML file. A `.env` file next to it is loaded first, and the
//! following environment variables override file settings:
//!
//! - `SOS_DATABASE` - path of the SQLite database
//! - `SOS_EXECUTION_MODE` - `sequential` or `parallel`
//! - `SOS_WORKERS` - loader worker count
//! - `SOS_IN_FLIGHT` - maximum statements in flight per loader phase

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{SosError, SosResult};
use crate::provider::VariableContract;

pub const ENV_DATABASE: &str = "SOS_DATABASE";
pub const ENV_EXECUTION_MODE: &str = "SOS_EXECUTION_MODE";
pub const ENV_WORKERS: &str = "SOS_WORKERS";
pub const ENV_IN_FLIGHT: &str = "SOS_IN_FLIGHT";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// SQLite database file
    pub database: PathBuf,
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Statements returning at most one row
    #[serde(default)]
    pub single: Vec<QueryDefinition>,
    /// Statements returning any number of rows
    #[serde(default)]
    pub multiple: Vec<QueryDefinition>,
    #[serde(default)]
    pub filter: FilterConfig,
    /// Role to variable name mapping used by the provider
    #[serde(default)]
    pub contract: VariableContract,
}

/// One catalog entry: a query with positional parameters and the variables
/// it produces, in column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDefinition {
    pub query: String,
    pub variables: Vec<String>,
}

impl QueryDefinition {
    pub fn new(query: impl Into<String>, variables: &[&str]) -> Self {
        Self {
            query: query.into(),
            variables: variables.iter().map(|v| v.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Parallel,
}

impl FromStr for ExecutionMode {
    type Err = SosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(ExecutionMode::Sequential),
            "parallel" => Ok(ExecutionMode::Parallel),
            other => Err(SosError::ConfigurationError(format!(
                "unknown execution mode '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Sequential => write!(f, "sequential"),
            ExecutionMode::Parallel => write!(f, "parallel"),
        }
    }
}

/// Loader execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Worker threads in parallel mode
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Statements submitted but not yet collected, per phase
    #[serde(default = "default_in_flight")]
    pub in_flight: usize,
}

fn default_workers() -> usize {
    4
}

fn default_in_flight() -> usize {
    8
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            workers: default_workers(),
            in_flight: default_in_flight(),
        }
    }
}

/// Table and column names the observation filter runs against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub table: String,
    pub identifier: String,
    pub procedure: String,
    pub phenomenon: String,
    pub composite_phenomenon: String,
    pub feature_of_interest: String,
    pub begin_time: String,
    pub end_time: String,
    /// Procedure id translations applied by `set_procedure`
    pub procedure_aliases: HashMap<String, String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            table: "observation".to_string(),
            identifier: "id".to_string(),
            procedure: "procedure_id".to_string(),
            phenomenon: "phenomenon_id".to_string(),
            composite_phenomenon: "composite_phenomenon_id".to_string(),
            feature_of_interest: "feature_of_interest_id".to_string(),
            begin_time: "begin_time".to_string(),
            end_time: "end_time".to_string(),
            procedure_aliases: HashMap::new(),
        }
    }
}

impl FilterConfig {
    fn identifiers(&self) -> [(&'static str, &str); 8] {
        [
            ("table", self.table.as_str()),
            ("identifier", self.identifier.as_str()),
            ("procedure", self.procedure.as_str()),
            ("phenomenon", self.phenomenon.as_str()),
            ("composite_phenomenon", self.composite_phenomenon.as_str()),
            ("feature_of_interest", self.feature_of_interest.as_str()),
            ("begin_time", self.begin_time.as_str()),
            ("end_time", self.end_time.as_str()),
        ]
    }
}

/// Table and column names are spliced into SQL text, so only plain
/// identifiers are accepted.
static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").expect("identifier pattern"));

fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

fn parse_count(key: &str, raw: &str) -> SosResult<usize> {
    raw.trim().parse::<usize>().map_err(|e| {
        SosError::ConfigurationError(format!("{} must be a whole number, got '{}': {}", key, raw, e))
    })
}

impl EngineConfig {
    pub fn new(database: impl Into<PathBuf>) -> Self {
        Self {
            database: database.into(),
            execution: ExecutionConfig::default(),
            single: Vec::new(),
            multiple: Vec::new(),
            filter: FilterConfig::default(),
            contract: VariableContract::default(),
        }
    }

    /// Load configuration from a file
    ///
    /// This also loads any `.env` file in the same directory and applies
    /// environment variable overrides. A relative database path is resolved
    /// against the configuration file's directory.
    pub fn load(path: &Path) -> SosResult<Self> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));

        // Load env file if present (ignore errors)
        let env_path = dir.join(".env");
        if env_path.exists() {
            let _ = dotenvy::from_path(&env_path);
        }

        if !path.exists() {
            return Err(SosError::ConfigurationError(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides()?;

        if config.database.is_relative() {
            config.database = dir.join(&config.database);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> SosResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) -> SosResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides read through `lookup`; empty values are ignored and
    /// unparseable ones rejected.
    fn apply_overrides<F>(&mut self, lookup: F) -> SosResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(database) = value(ENV_DATABASE) {
            self.database = PathBuf::from(database);
        }

        if let Some(mode) = value(ENV_EXECUTION_MODE) {
            self.execution.mode = mode.parse()?;
        }

        if let Some(workers) = value(ENV_WORKERS) {
            self.execution.workers = parse_count(ENV_WORKERS, &workers)?;
        }

        if let Some(in_flight) = value(ENV_IN_FLIGHT) {
            self.execution.in_flight = parse_count(ENV_IN_FLIGHT, &in_flight)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> SosResult<()> {
        if self.execution.workers == 0 {
            return Err(SosError::ConfigurationError(
                "execution.workers must be at least 1".to_string(),
            ));
        }
        if self.execution.in_flight == 0 {
            return Err(SosError::ConfigurationError(
                "execution.in_flight must be at least 1".to_string(),
            ));
        }
        for (key, name) in self.filter.identifiers() {
            if !is_identifier(name) {
                return Err(SosError::ConfigurationError(format!(
                    "filter.{} is not a valid identifier: '{}'",
                    key, name
                )));
            }
        }
        Ok(())
    }

    /// Sessions the engine opens: one per worker in parallel mode, plus one
    /// for the calling thread.
    pub fn session_count(&self) -> usize {
        match self.execution.mode {
            ExecutionMode::Sequential => 1,
            ExecutionMode::Parallel => self.execution.workers + 1,
        }
    }
}
