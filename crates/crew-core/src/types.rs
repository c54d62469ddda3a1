//! Core type definitions for crew orchestration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How much the execution runtime may do without asking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionLevel {
    /// Dangerous operations require confirmation
    Default,
    /// File edits are accepted automatically
    AcceptEdits,
    /// All permission checks are skipped
    #[default]
    BypassPermissions,
    /// Never prompt; anything not pre-approved is denied
    DontAsk,
}

impl std::fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::AcceptEdits => write!(f, "acceptEdits"),
            Self::BypassPermissions => write!(f, "bypassPermissions"),
            Self::DontAsk => write!(f, "dontAsk"),
        }
    }
}

impl std::str::FromStr for PermissionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "default" => Ok(Self::Default),
            "acceptedits" => Ok(Self::AcceptEdits),
            "bypasspermissions" | "bypass" => Ok(Self::BypassPermissions),
            "dontask" => Ok(Self::DontAsk),
            _ => Err(format!("Invalid permission level: {}", s)),
        }
    }
}

/// Extended reasoning mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningMode {
    /// The model decides when and how much to think
    #[default]
    Adaptive,
    /// Thinking on, optionally bounded by a token budget
    Enabled,
    /// No extended thinking
    Disabled,
}

impl std::fmt::Display for ReasoningMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Adaptive => write!(f, "adaptive"),
            Self::Enabled => write!(f, "enabled"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

impl std::str::FromStr for ReasoningMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "adaptive" => Ok(Self::Adaptive),
            "enabled" | "on" => Ok(Self::Enabled),
            "disabled" | "off" => Ok(Self::Disabled),
            _ => Err(format!("Invalid reasoning mode: {}", s)),
        }
    }
}

/// Reasoning-depth setting handed to the execution runtime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningConfig {
    #[serde(default)]
    pub mode: ReasoningMode,
    /// Only meaningful when `mode` is `Enabled`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_tokens: Option<u32>,
}

impl ReasoningConfig {
    pub fn adaptive() -> Self {
        Self {
            mode: ReasoningMode::Adaptive,
            budget_tokens: None,
        }
    }

    pub fn enabled(budget_tokens: Option<u32>) -> Self {
        Self {
            mode: ReasoningMode::Enabled,
            budget_tokens,
        }
    }

    pub fn disabled() -> Self {
        Self {
            mode: ReasoningMode::Disabled,
            budget_tokens: None,
        }
    }
}

/// An operation the execution runtime may perform on an agent's behalf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Operation {
    Read,
    Write,
    Edit,
    Glob,
    Grep,
    Bash,
    WebSearch,
    WebFetch,
}

impl Operation {
    /// Tool name understood by the execution runtime
    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::Read => "Read",
            Self::Write => "Write",
            Self::Edit => "Edit",
            Self::Glob => "Glob",
            Self::Grep => "Grep",
            Self::Bash => "Bash",
            Self::WebSearch => "WebSearch",
            Self::WebFetch => "WebFetch",
        }
    }

    /// Whether the operation can change the project
    pub fn is_mutating(&self) -> bool {
        matches!(self, Self::Write | Self::Edit | Self::Bash)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tool_name())
    }
}

/// Outcome of one iteration pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IterationStatus {
    Success,
    Failed,
    Skipped,
}

impl std::fmt::Display for IterationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Immutable record of one iteration pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// Ordinal, starting at 1
    pub iteration: u64,
    /// Derived task, or "unknown" when the pass failed before derivation
    pub task: String,
    pub status: IterationStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl IterationRecord {
    pub fn new(
        iteration: u64,
        task: impl Into<String>,
        status: IterationStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            iteration,
            task: task.into(),
            status,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Lifecycle of a run controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    /// Stop requested; takes effect at the next loop boundary
    Stopping,
    Stopped,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// First `max_chars` characters of `text`
///
/// Counts Unicode scalar values so multi-byte text is never split.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
