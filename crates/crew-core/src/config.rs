//! Configuration management for crew
//!
//! Two layers:
//! - [`CrewConfig`]: repository defaults loaded from `.crew/config.toml`
//! - [`RunSettings`] -> [`RunConfig`]: raw per-run values (file defaults plus
//!   command-line overrides) validated once into an immutable run configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{CrewError, PermissionLevel, ReasoningConfig, ReasoningMode, Result};

/// Directory holding crew's per-project files
pub const CREW_DIR: &str = ".crew";

/// Repository-level crew configuration
///
/// Loaded from `.crew/config.toml` in the project root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrewConfig {
    /// Iteration loop defaults
    #[serde(default)]
    pub run: RunDefaults,

    /// Settings applied to every agent of the roster
    #[serde(default)]
    pub agents: AgentDefaults,

    /// Execution runtime selection
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// Default iteration loop parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDefaults {
    /// Seconds to wait between iterations
    #[serde(default = "default_interval_secs")]
    pub interval_secs: i64,

    /// Maximum iterations (0 = unbounded)
    #[serde(default)]
    pub max_iterations: u64,

    /// Commit after each successful iteration
    #[serde(default = "default_true")]
    pub auto_commit: bool,

    /// Push after each commit
    #[serde(default = "default_true")]
    pub auto_push: bool,
}

/// Defaults applied to each agent at construction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentDefaults {
    #[serde(default)]
    pub permission_level: PermissionLevel,

    #[serde(default)]
    pub reasoning: ReasoningConfig,
}

/// Which execution runtime backs the agents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    /// The `claude` command-line agent, streaming JSON events
    #[default]
    Cli,
    /// The Anthropic Messages HTTP API (text only)
    Api,
}

impl std::str::FromStr for RuntimeKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cli" => Ok(Self::Cli),
            "api" => Ok(Self::Api),
            _ => Err(format!("Invalid runtime: {}. Use cli or api.", s)),
        }
    }
}

/// Execution runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub kind: RuntimeKind,

    /// Model override passed to the runtime
    #[serde(default)]
    pub model: Option<String>,

    /// Path or name of the claude executable
    #[serde(default = "default_claude_binary")]
    pub claude_binary: String,

    /// Maximum response tokens (HTTP runtime)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

fn default_interval_secs() -> i64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_claude_binary() -> String {
    "claude".to_string()
}

fn default_max_tokens() -> usize {
    16000
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_iterations: 0,
            auto_commit: true,
            auto_push: true,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            kind: RuntimeKind::default(),
            model: None,
            claude_binary: default_claude_binary(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl CrewConfig {
    /// Path of the configuration file under `project_root`
    pub fn path(project_root: &Path) -> PathBuf {
        project_root.join(CREW_DIR).join("config.toml")
    }

    /// Load configuration from `.crew/config.toml` or use defaults
    pub fn load_or_default(project_root: &Path) -> Result<Self> {
        let config_path = Self::path(project_root);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content).map_err(|e| {
                CrewError::Configuration(format!(
                    "Failed to parse {}: {}",
                    config_path.display(),
                    e
                ))
            })
        } else {
            Ok(Self::default())
        }
    }

    /// Write default configuration to `.crew/config.toml`
    pub fn write_default(project_root: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(project_root.join(CREW_DIR))?;

        let config_path = Self::path(project_root);
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| CrewError::Other(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(&config_path, content)?;
        Ok(config_path)
    }
}

/// Raw run parameters before validation
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub project_path: PathBuf,
    /// Signed so that bad input survives until validation
    pub interval_secs: i64,
    pub max_iterations: u64,
    pub auto_commit: bool,
    pub auto_push: bool,
    pub permission_level: PermissionLevel,
    pub reasoning: ReasoningConfig,
}

impl RunSettings {
    /// Settings seeded from a repository configuration
    pub fn from_config(config: &CrewConfig, project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
            interval_secs: config.run.interval_secs,
            max_iterations: config.run.max_iterations,
            auto_commit: config.run.auto_commit,
            auto_push: config.run.auto_push,
            permission_level: config.agents.permission_level,
            reasoning: config.agents.reasoning,
        }
    }

    /// Validate into an immutable [`RunConfig`]
    pub fn validate(self) -> Result<RunConfig> {
        if self.interval_secs < 0 {
            return Err(CrewError::Configuration(format!(
                "iteration interval must not be negative (got {}s)",
                self.interval_secs
            )));
        }

        if !self.project_path.is_dir() {
            return Err(CrewError::Configuration(format!(
                "project path {} is not a directory",
                self.project_path.display()
            )));
        }

        if self.auto_push && !self.auto_commit {
            return Err(CrewError::Configuration(
                "auto-push requires auto-commit".to_string(),
            ));
        }

        if self.reasoning.mode == ReasoningMode::Enabled && self.reasoning.budget_tokens == Some(0)
        {
            return Err(CrewError::Configuration(
                "reasoning budget must be greater than zero".to_string(),
            ));
        }

        Ok(RunConfig {
            project_path: self.project_path,
            interval: Duration::from_secs(self.interval_secs as u64),
            max_iterations: self.max_iterations,
            auto_commit: self.auto_commit,
            auto_push: self.auto_push,
            permission_level: self.permission_level,
            reasoning: self.reasoning,
        })
    }
}

/// Validated, immutable run configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    project_path: PathBuf,
    interval: Duration,
    max_iterations: u64,
    auto_commit: bool,
    auto_push: bool,
    permission_level: PermissionLevel,
    reasoning: ReasoningConfig,
}

impl RunConfig {
    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Maximum iterations (0 = unbounded)
    pub fn max_iterations(&self) -> u64 {
        self.max_iterations
    }

    pub fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    pub fn auto_push(&self) -> bool {
        self.auto_push
    }

    pub fn permission_level(&self) -> PermissionLevel {
        self.permission_level
    }

    pub fn reasoning(&self) -> ReasoningConfig {
        self.reasoning
    }

    /// Whether `completed` iterations exhaust the configured maximum
    pub fn limit_reached(&self, completed: u64) -> bool {
        self.max_iterations > 0 && completed >= self.max_iterations
    }
}
